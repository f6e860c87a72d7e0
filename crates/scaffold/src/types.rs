//! Core types for step execution

use crate::step::BoxedStep;
use std::fmt;
use std::time::Duration;

/// Why a step did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The step's condition evaluated to false
    ConditionFalse,
    /// The run is a dry run
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConditionFalse => f.write_str("condition not met"),
            Self::DryRun => f.write_str("dry run"),
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: BoxedStep,
    pub skipped: Option<SkipReason>,
    /// Rendered error chain if the step failed
    pub error: Option<String>,
    pub duration: Duration,
}

impl StepResult {
    pub(crate) fn skipped(step: BoxedStep, reason: SkipReason) -> Self {
        Self {
            step,
            skipped: Some(reason),
            error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        self.step.name()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Build a summary from collected results
    pub fn from_results(results: &[StepResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add_result(result);
        }
        summary
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &StepResult) {
        if result.error.is_some() {
            self.failed += 1;
        } else if result.is_skipped() {
            self.skipped += 1;
        } else {
            self.ran += 1;
        }
    }

    /// Total number of steps seen
    pub fn total(&self) -> usize {
        self.ran + self.skipped + self.failed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Options shared by every step in a run
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    /// Extra arguments appended to program steps
    pub args: Vec<String>,
    /// Evaluate conditions and report, but run nothing
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}

impl StepOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}
