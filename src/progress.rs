//! Terminal progress for step execution.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use scaffold::{ProgressCallback, SkipReason, StepResult};
use std::time::Duration;

use crate::ui;

/// One spinner per priority group, with a line per finished step
pub struct GroupProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl GroupProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn line(&self, msg: &str) {
        if self.quiet {
            return;
        }
        match &self.bar {
            Some(bar) => bar.println(msg),
            None => println!("{msg}"),
        }
    }
}

fn spinner(msg: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(msg);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

impl ProgressCallback for GroupProgress {
    fn on_group_start(&mut self, priority: i32, count: usize) {
        if self.quiet {
            return;
        }
        let noun = if count == 1 { "step" } else { "steps" };
        self.bar = Some(spinner(format!("priority {priority}: {count} {noun}")));
    }

    fn on_step_skipped(&mut self, name: &str, reason: SkipReason) {
        self.line(&format!("  {} {}", "-".dimmed(), format!("{name} ({reason})").dimmed()));
    }

    fn on_step_complete(&mut self, result: &StepResult) {
        let elapsed = ui::format_duration(result.duration).dimmed();
        match &result.error {
            None => self.line(&format!("  {} {} {elapsed}", "✓".green(), result.name())),
            Some(error) => {
                self.line(&format!("  {} {} {elapsed}", "✗".red(), result.name()));
                self.line(&format!("    {}", error.red()));
            }
        }
    }

    fn on_group_complete(&mut self, _priority: i32) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
