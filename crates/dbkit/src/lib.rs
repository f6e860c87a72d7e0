//! # dbkit
//!
//! Database provisioning primitives for disposable development environments.
//!
//! This crate provides:
//! - [`Engine`] detection from configuration or `DB_CONNECTION`-style values
//! - A [`DatabaseClient`] abstraction with a CLI-backed implementation
//!   (`mysql`, `psql`)
//! - Categorized errors that separate naming collisions from unreachable
//!   servers
//! - A collision retry loop ([`retry_on_conflict`])
//!
//! ## Example
//!
//! ```no_run
//! use dbkit::{ClientFactory, ConnectionOptions, Engine, default_factory};
//!
//! let factory = default_factory();
//! let client = factory
//!     .connect(Engine::MySql, &ConnectionOptions::default())
//!     .expect("client available");
//!
//! client.ping().expect("server reachable");
//! client.create_database("myapp_brave_otter").expect("created");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use backend::{ClientFactory, DatabaseClient, default_factory, escape_like};
pub use error::{Error, ErrorCategory, Result};
pub use retry::{DEFAULT_MAX_ATTEMPTS, LogCallback, RetryCallback, retry_on_conflict};
pub use types::{ConnectionOptions, Engine};
