//! `env.read` and `env.write`.

use crate::condition::Condition;
use crate::context::RunContext;
use crate::envfile::{self, DEFAULT_ENV_FILE};
use crate::error::Result;
use crate::step::Step;
use crate::template;
use crate::types::StepOptions;
use anyhow::Context;

/// Copies one key of an env file into a run variable.
#[derive(Debug, Clone)]
pub struct EnvReadStep {
    key: String,
    store_as: String,
    file: String,
    priority: i32,
    condition: Condition,
}

impl EnvReadStep {
    /// Store `key` under the same name, reading from `.env`.
    pub fn new(key: impl Into<String>, priority: i32) -> Self {
        let key = key.into();
        Self {
            store_as: key.clone(),
            key,
            file: DEFAULT_ENV_FILE.to_string(),
            priority,
            condition: Condition::always(),
        }
    }

    pub fn store_as(mut self, name: impl Into<String>) -> Self {
        self.store_as = name.into();
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

impl Step for EnvReadStep {
    fn name(&self) -> &str {
        "env.read"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        self.condition.evaluate(ctx)
    }

    fn run(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let path = ctx.resolve(&self.file);
        let values =
            envfile::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let value = values.get(&self.key).cloned().unwrap_or_default();

        log::debug!("{} -> {} ({} bytes)", self.key, self.store_as, value.len());
        ctx.set_var(self.store_as.clone(), value);
        Ok(())
    }
}

/// Sets one key in an env file, preserving the rest of the file.
#[derive(Debug, Clone)]
pub struct EnvWriteStep {
    key: String,
    value: String,
    file: String,
    priority: i32,
    condition: Condition,
}

impl EnvWriteStep {
    /// `value` may contain placeholders; they are rendered at run time.
    pub fn new(key: impl Into<String>, value: impl Into<String>, priority: i32) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            file: DEFAULT_ENV_FILE.to_string(),
            priority,
            condition: Condition::always(),
        }
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

impl Step for EnvWriteStep {
    fn name(&self) -> &str {
        "env.write"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        self.condition.evaluate(ctx)
    }

    fn run(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let value = template::render(&self.value, ctx)?;
        let path = ctx.resolve(&self.file);
        envfile::write_key(&path, &self.key, &value)
            .with_context(|| format!("writing {} to {}", self.key, path.display()))?;
        log::debug!("Set {} in {}", self.key, self.file);
        Ok(())
    }

    fn preview(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let value = template::render(&self.value, ctx)?;
        log::info!("Would set {}={value} in {}", self.key, self.file);
        Ok(())
    }
}
