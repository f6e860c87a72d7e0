//! Error types for database provisioning.
//!
//! Errors are categorized so callers can tell a naming collision (retry with
//! a new name) from an unreachable server (soft-skip) from a real failure.

use thiserror::Error;

/// Categories of database errors for retry and skip decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The database name is already taken
    AlreadyExists,
    /// Server unreachable, refused, or timed out
    Connection,
    /// Client executable (`mysql`, `psql`) not installed
    ClientNotFound,
    /// Authentication or privilege failure
    Permission,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether retrying with a freshly generated name can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }

    /// Whether the environment simply has no usable database server.
    ///
    /// Provisioning treats these as a skip, not a failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection | Self::ClientNotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "Database already exists",
            Self::Connection => "Database server unreachable",
            Self::ClientNotFound => "Database client not installed",
            Self::Permission => "Access denied",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while talking to a database server.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested database name is taken
    #[error("database {name} already exists")]
    AlreadyExists {
        /// Name that collided
        name: String,
    },

    /// The server could not be reached
    #[error("connection failed: {message}")]
    Connection {
        /// Client output describing the failure
        message: String,
    },

    /// Client executable missing from PATH
    #[error("{program} client not found in PATH")]
    ClientNotFound {
        /// Executable that was looked up
        program: String,
    },

    /// Authentication or privilege failure
    #[error("permission denied: {message}")]
    Permission {
        /// Client output describing the failure
        message: String,
    },

    /// Engine value outside the supported set
    #[error("unsupported database engine: {0}")]
    UnsupportedEngine(String),

    /// Client command failed for another reason
    #[error("{message}: {stderr}")]
    CommandFailed {
        /// What was being attempted
        message: String,
        /// Standard error output from the client
        stderr: String,
    },

    /// Every attempt collided with an existing database
    #[error("failed to create database after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::AlreadyExists { .. } => ErrorCategory::AlreadyExists,
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::ClientNotFound { .. } => ErrorCategory::ClientNotFound,
            Error::Permission { .. } => ErrorCategory::Permission,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether a new name could get past this error.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this means "no usable server here".
    pub fn is_unavailable(&self) -> bool {
        self.category().is_unavailable()
    }

    /// Create an error from `mysql`/`psql` stderr.
    ///
    /// MySQL reports collisions as error 1007 ("database exists"), PostgreSQL
    /// as `database "x" already exists`.
    pub fn from_client_output(stderr: &str, database: Option<&str>) -> Self {
        let lower = stderr.to_lowercase();

        if lower.contains("already exists")
            || lower.contains("database exists")
            || lower.contains("1007")
        {
            return Error::AlreadyExists {
                name: database.unwrap_or("unknown").to_string(),
            };
        }

        if lower.contains("can't connect")
            || lower.contains("could not connect")
            || lower.contains("connection refused")
            || lower.contains("unknown mysql server host")
            || lower.contains("could not translate host name")
            || lower.contains("timeout expired")
            || lower.contains("timed out")
            || lower.contains("server closed the connection")
            || lower.contains("lost connection")
        {
            return Error::Connection {
                message: stderr.trim().to_string(),
            };
        }

        if lower.contains("access denied")
            || lower.contains("password authentication failed")
            || lower.contains("permission denied")
        {
            return Error::Permission {
                message: stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: format!(
                "database command failed{}",
                database.map(|n| format!(" for {n}")).unwrap_or_default()
            ),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;
