//! Backend abstraction for database servers.
//!
//! [`DatabaseClient`] is a single open connection; [`ClientFactory`] opens
//! them. Provisioning code only ever sees these traits, so tests can swap in
//! an in-memory implementation.

pub mod cli;

use crate::error::Result;
use crate::types::{ConnectionOptions, Engine};

/// An open connection to a database server.
///
/// Dropping the client releases the connection.
pub trait DatabaseClient: Send {
    /// Verify the server is reachable with the configured credentials.
    fn ping(&self) -> Result<()>;

    /// Create a database. Must fail with [`crate::Error::AlreadyExists`] if
    /// the name is taken.
    fn create_database(&self, name: &str) -> Result<()>;

    /// Drop a database if it exists.
    fn drop_database(&self, name: &str) -> Result<()>;

    /// List databases whose name matches a SQL `LIKE` pattern.
    fn list_databases(&self, pattern: &str) -> Result<Vec<String>>;
}

/// Opens [`DatabaseClient`] connections.
pub trait ClientFactory: Send + Sync {
    /// Connect to the server for `engine`.
    fn connect(&self, engine: Engine, opts: &ConnectionOptions) -> Result<Box<dyn DatabaseClient>>;
}

/// Get the default factory (real `mysql`/`psql` clients).
pub fn default_factory() -> cli::CliFactory {
    cli::CliFactory
}

/// Escape `_` so it matches literally inside a `LIKE` pattern.
///
/// `%` is left alone so callers can still use it as a wildcard.
pub fn escape_like(pattern: &str) -> String {
    pattern.replace('\\', "\\\\").replace('_', "\\_")
}
