//! Error types for scaffold runs.

use std::io;
use thiserror::Error;

/// Result type alias for scaffold operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or executing steps.
#[derive(Debug, Error)]
pub enum Error {
    /// A step's action failed. Halts all later priority groups.
    #[error("{step} failed: {source:#}")]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// A `{{ .Name }}` placeholder referenced nothing known to the run.
    #[error("unknown template variable: {0}")]
    UnknownVariable(String),

    /// No constructor is registered for a step name.
    #[error("unknown step type: {0}")]
    UnknownStep(String),

    /// A condition tree could not be decoded.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// A step's configuration is missing a required field.
    #[error("invalid configuration for {step}: {message}")]
    InvalidStep { step: String, message: String },

    /// Worker pool for a priority group could not be started.
    #[error("failed to start worker pool: {0}")]
    Pool(String),

    /// Database client failure.
    #[error(transparent)]
    Database(#[from] dbkit::Error),

    /// Other I/O failure.
    #[error("IO error")]
    Io(#[from] io::Error),
}

impl Error {
    /// Name of the failed step, when this is a step failure.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}
