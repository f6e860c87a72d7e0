//! # Scaffold
//!
//! Orchestration engine for preparing and tearing down per-branch
//! development checkouts.
//!
//! ## Core Concepts
//!
//! - **Step**: a named, prioritized, condition-gated unit of work
//! - **RunContext**: per-run state shared by all steps (identity fields,
//!   variables, the database suffix)
//! - **Condition**: a small boolean language over files, commands, the
//!   platform and environment values
//! - **StepExecutor**: runs steps in priority groups, concurrently within a
//!   group, halting after the first failing group
//! - **StepRegistry**: maps configured step names to constructors
//!
//! ## Example
//!
//! ```ignore
//! use scaffold::{RunContext, StepConfig, StepDeps, StepExecutor, StepOptions, StepRegistry};
//!
//! let registry = StepRegistry::with_builtins(StepDeps::default());
//! let steps = registry.build(&[
//!     StepConfig::named("file.copy"),
//!     StepConfig::named("php.composer").with_args(["install"]),
//!     StepConfig::named("db.create"),
//! ])?;
//!
//! let ctx = RunContext::new("/work/myapp-feature", "feature/login").with_site_name("myapp");
//! let mut executor = StepExecutor::new(steps, StepOptions::default());
//! executor.execute(&ctx)?;
//!
//! for result in executor.results() {
//!     println!("{}: {:?}", result.name(), result.error);
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`SuffixStore`]: persists the database suffix between runs
//! - [`ProgressCallback`]: receives progress updates
//! - [`dbkit::ClientFactory`]: opens database connections

pub mod condition;
pub mod context;
pub mod envfile;
pub mod error;
pub mod executor;
pub mod registry;
pub mod runner;
pub mod step;
pub mod steps;
pub mod template;
pub mod types;
pub mod words;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use condition::{Condition, EnvFileArg, Predicate};
pub use context::{MemorySuffixStore, NoProgress, ProgressCallback, RunContext, SuffixStore};
pub use error::{Error, Result};
pub use executor::{StepExecutor, group_by_priority, sort_by_priority};
pub use registry::{StepConstructor, StepDeps, StepRegistry};
pub use step::{BoxedStep, Step, StepConfig};
pub use types::{ExecuteSummary, SkipReason, StepOptions, StepResult};
