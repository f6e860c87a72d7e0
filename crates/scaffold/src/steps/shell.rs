//! `bash.run` and `command.run`.

use crate::condition::Condition;
use crate::context::RunContext;
use crate::error::Result;
use crate::runner;
use crate::step::Step;
use crate::template;
use crate::types::StepOptions;

/// Runs a templated script through `<shell> -c` in the worktree.
#[derive(Debug, Clone)]
pub struct ShellStep {
    name: String,
    shell: &'static str,
    command: String,
    priority: i32,
    condition: Condition,
}

impl ShellStep {
    pub fn bash(command: impl Into<String>, priority: i32) -> Self {
        Self::new("bash.run", "bash", command.into(), priority)
    }

    pub fn sh(command: impl Into<String>, priority: i32) -> Self {
        Self::new("command.run", "sh", command.into(), priority)
    }

    fn new(name: &str, shell: &'static str, command: String, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            shell,
            command,
            priority,
            condition: Condition::always(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

impl Step for ShellStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        self.condition.evaluate(ctx)
    }

    fn run(&self, ctx: &RunContext, opts: &StepOptions) -> anyhow::Result<()> {
        let script = template::render(&self.command, ctx)?;
        if opts.verbose {
            log::info!("Running: {} -c {script:?}", self.shell);
        }
        runner::run_in(ctx.worktree_path(), self.shell, &["-c".to_string(), script])?;
        Ok(())
    }

    fn preview(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let script = template::render(&self.command, ctx)?;
        log::info!("Would run: {} -c {script:?}", self.shell);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_command_runs_in_worktree_with_templates() {
        let dir = TempDir::new().unwrap();
        let ctx = RunContext::new(dir.path(), "feature/x");
        let step = ShellStep::sh("echo {{ .Branch }} > branch.txt", 100);

        step.run(&ctx, &StepOptions::default()).unwrap();

        let written = std::fs::read_to_string(dir.path().join("branch.txt")).unwrap();
        assert_eq!(written.trim(), "feature/x");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = RunContext::new(dir.path(), "main");
        let step = ShellStep::sh("exit 7", 100);

        let err = step.run(&ctx, &StepOptions::default()).unwrap_err();
        assert!(err.to_string().contains("status 7"));
    }

    #[test]
    fn test_names_and_priority() {
        assert_eq!(ShellStep::bash("true", 100).name(), "bash.run");
        assert_eq!(ShellStep::sh("true", 42).name(), "command.run");
        assert_eq!(ShellStep::sh("true", 42).priority(), 42);
    }

    #[test]
    fn test_unknown_placeholder_fails_before_running() {
        let dir = TempDir::new().unwrap();
        let ctx = RunContext::new(dir.path(), "main");
        let step = ShellStep::sh("touch {{ .Missing }}", 100);

        let err = step.run(&ctx, &StepOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }
}
