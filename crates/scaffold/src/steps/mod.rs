//! Built-in step implementations

pub mod binary;
pub mod database;
pub mod env;
pub mod file_copy;
pub mod shell;

pub use binary::BinaryStep;
pub use database::{DbCreateStep, DbDestroyStep};
pub use env::{EnvReadStep, EnvWriteStep};
pub use file_copy::FileCopyStep;
pub use shell::ShellStep;
