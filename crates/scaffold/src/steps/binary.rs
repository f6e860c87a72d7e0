//! Steps that invoke an external program in the worktree.

use crate::condition::Condition;
use crate::context::RunContext;
use crate::error::Result;
use crate::runner;
use crate::step::{Step, StepConfig};
use crate::template;
use crate::types::StepOptions;

/// Runs `program [base_args] [args] [runtime args]` in the worktree.
///
/// Without an explicit condition the step only runs when `program` is on
/// `PATH`.
#[derive(Debug, Clone)]
pub struct BinaryStep {
    name: String,
    program: String,
    base_args: Vec<String>,
    args: Vec<String>,
    priority: i32,
    condition: Condition,
}

impl BinaryStep {
    /// `command` may carry leading arguments, e.g. `"php artisan"`.
    pub fn new(name: impl Into<String>, command: &str, priority: i32) -> Self {
        let mut words = command.split_whitespace().map(ToString::to_string);
        let program = words.next().unwrap_or_default();

        Self {
            name: name.into(),
            program,
            base_args: words.collect(),
            args: Vec::new(),
            priority,
            condition: Condition::always(),
        }
    }

    pub fn from_config(name: &str, command: &str, cfg: &StepConfig, priority: i32) -> Self {
        let mut step = Self::new(name, command, priority);
        step.args = cfg.args.clone();
        step.condition = cfg.condition.clone();
        step
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_args(&self, ctx: &RunContext, opts: &StepOptions) -> Result<Vec<String>> {
        let mut args = self.base_args.clone();
        args.extend(template::render_all(&self.args, ctx)?);
        args.extend(opts.args.iter().cloned());
        Ok(args)
    }
}

impl Step for BinaryStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        if !self.condition.is_empty() {
            return self.condition.evaluate(ctx);
        }
        Ok(!self.program.is_empty() && which::which(&self.program).is_ok())
    }

    fn run(&self, ctx: &RunContext, opts: &StepOptions) -> anyhow::Result<()> {
        let args = self.command_args(ctx, opts)?;
        if opts.verbose {
            log::info!("Running: {}", runner::command_line(&self.program, &args));
        }
        let output = runner::run_in(ctx.worktree_path(), &self.program, &args)?;
        if !output.is_empty() {
            log::debug!("{}: {output}", self.name);
        }
        Ok(())
    }

    fn preview(&self, ctx: &RunContext, opts: &StepOptions) -> anyhow::Result<()> {
        let args = self.command_args(ctx, opts)?;
        log::info!("Would run: {}", runner::command_line(&self.program, &args));
        Ok(())
    }
}
