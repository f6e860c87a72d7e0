//! Step trait and step configuration
//!
//! A Step is a named, prioritized unit of work gated by a condition.

use crate::condition::Condition;
use crate::context::RunContext;
use crate::error::Result;
use crate::types::StepOptions;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Core trait for scaffold and cleanup steps
///
/// Steps hold only their own configuration. Anything shared between steps
/// goes through the [`RunContext`], which may be accessed from several
/// threads at once when steps share a priority.
///
/// # Example
///
/// ```ignore
/// use scaffold::{RunContext, Step, StepOptions};
///
/// #[derive(Debug)]
/// struct Touch { file: String }
///
/// impl Step for Touch {
///     fn name(&self) -> &str { "touch" }
///     fn priority(&self) -> i32 { 50 }
///
///     fn condition(&self, ctx: &RunContext) -> scaffold::Result<bool> {
///         Ok(!ctx.resolve(&self.file).exists())
///     }
///
///     fn run(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
///         std::fs::write(ctx.resolve(&self.file), "")?;
///         Ok(())
///     }
/// }
/// ```
pub trait Step: Send + Sync + fmt::Debug {
    /// Step type name, used in reports and error messages
    fn name(&self) -> &str;

    /// Lower priorities run first; equal priorities run together
    fn priority(&self) -> i32;

    /// Whether the step should run
    ///
    /// Must not mutate the context or the filesystem. Called on the
    /// executor's thread before the group is dispatched.
    fn condition(&self, ctx: &RunContext) -> Result<bool>;

    /// Perform the step's side effect
    fn run(&self, ctx: &RunContext, opts: &StepOptions) -> anyhow::Result<()>;

    /// Describe what [`Step::run`] would do, without doing it
    ///
    /// Called in dry-run mode for steps whose condition holds.
    fn preview(&self, _ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Type alias for shared step trait objects
pub type BoxedStep = Arc<dyn Step>;

/// One entry of a scaffold or cleanup step list, as configured
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Registered step type, e.g. `php.composer`
    pub name: String,
    /// Overrides the step type's default priority
    pub priority: Option<i32>,
    /// `Some(false)` removes the step before execution
    pub enabled: Option<bool>,
    pub args: Vec<String>,
    /// Script for `bash.run` / `command.run`
    pub command: Option<String>,
    pub condition: Condition,
    pub from: Option<String>,
    pub to: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub store_as: Option<String>,
    pub file: Option<String>,
    /// Database engine for `db.create` / `db.destroy`
    #[serde(rename = "type")]
    pub engine: Option<String>,
}

impl StepConfig {
    /// Config for step type `name` with everything else defaulted
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}
