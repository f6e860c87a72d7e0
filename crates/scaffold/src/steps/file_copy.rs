//! `file.copy`.

use crate::condition::Condition;
use crate::context::RunContext;
use crate::error::Result;
use crate::step::Step;
use crate::types::StepOptions;
use anyhow::Context;
use std::fs;

/// Copies `from` to `to`, both relative to the worktree.
///
/// Only runs when the source exists (and any configured condition holds).
#[derive(Debug, Clone)]
pub struct FileCopyStep {
    from: String,
    to: String,
    priority: i32,
    condition: Condition,
}

impl FileCopyStep {
    pub fn new(from: impl Into<String>, to: impl Into<String>, priority: i32) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            priority,
            condition: Condition::always(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

impl Step for FileCopyStep {
    fn name(&self) -> &str {
        "file.copy"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        if !ctx.resolve(&self.from).is_file() {
            return Ok(false);
        }
        self.condition.evaluate(ctx)
    }

    fn run(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let source = ctx.resolve(&self.from);
        let dest = ctx.resolve(&self.to);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::copy(&source, &dest).with_context(|| {
            format!("copying {} to {}", source.display(), dest.display())
        })?;

        log::debug!("Copied {} to {}", self.from, self.to);
        Ok(())
    }

    fn preview(&self, _ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        log::info!("Would copy {} to {}", self.from, self.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gated_on_source() {
        let dir = TempDir::new().unwrap();
        let ctx = RunContext::new(dir.path(), "main");
        let step = FileCopyStep::new(".env.example", ".env", 9);

        assert!(!step.condition(&ctx).unwrap());

        fs::write(dir.path().join(".env.example"), "APP_NAME=Laravel\n").unwrap();
        assert!(step.condition(&ctx).unwrap());
    }

    #[test]
    fn test_copies_and_creates_parent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("source.txt"), "hello").unwrap();
        let ctx = RunContext::new(dir.path(), "main");

        FileCopyStep::new("source.txt", "nested/dir/dest.txt", 9)
            .run(&ctx, &StepOptions::default())
            .unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("nested/dir/dest.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_overwrites_existing_destination() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), "new").unwrap();
        fs::write(dir.path().join("b"), "old").unwrap();
        let ctx = RunContext::new(dir.path(), "main");

        FileCopyStep::new("a", "b", 9)
            .run(&ctx, &StepOptions::default())
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "new");
    }
}
