//! Step registry - maps configured step names to constructors
//!
//! The registry is an ordinary value owned by the caller. Collaborators that
//! steps need (database clients, suffix persistence) are injected through
//! [`StepDeps`] when the registry is built.

use crate::context::{MemorySuffixStore, SuffixStore};
use crate::error::{Error, Result};
use crate::step::{BoxedStep, StepConfig};
use crate::steps::{
    BinaryStep, DbCreateStep, DbDestroyStep, EnvReadStep, EnvWriteStep, FileCopyStep, ShellStep,
};
use dbkit::ClientFactory;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Program steps: name, command, default priority
const BINARIES: &[(&str, &str, i32)] = &[
    ("php", "php", 5),
    ("php.composer", "composer", 10),
    ("php.laravel.artisan", "php artisan", 20),
    ("node.npm", "npm", 10),
    ("node.yarn", "yarn", 10),
    ("node.pnpm", "pnpm", 10),
    ("node.bun", "bun", 10),
    ("herd", "herd", 60),
];

/// Collaborators handed to step constructors
#[derive(Clone)]
pub struct StepDeps {
    pub clients: Arc<dyn ClientFactory>,
    pub suffixes: Arc<dyn SuffixStore>,
}

impl StepDeps {
    pub fn new(clients: Arc<dyn ClientFactory>, suffixes: Arc<dyn SuffixStore>) -> Self {
        Self { clients, suffixes }
    }
}

impl Default for StepDeps {
    /// Real database clients; suffixes kept in memory only
    fn default() -> Self {
        Self::new(
            Arc::new(dbkit::default_factory()),
            Arc::new(MemorySuffixStore::new()),
        )
    }
}

/// Builds a step from its config, resolved priority, and dependencies
pub type StepConstructor =
    Box<dyn Fn(&StepConfig, i32, &StepDeps) -> Result<BoxedStep> + Send + Sync>;

struct Entry {
    default_priority: i32,
    build: StepConstructor,
}

/// Named step constructors
pub struct StepRegistry {
    deps: StepDeps,
    entries: BTreeMap<String, Entry>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl StepRegistry {
    /// Empty registry
    pub fn new(deps: StepDeps) -> Self {
        Self {
            deps,
            entries: BTreeMap::new(),
        }
    }

    /// Registry with every built-in step type
    pub fn with_builtins(deps: StepDeps) -> Self {
        let mut registry = Self::new(deps);

        for &(name, command, priority) in BINARIES {
            registry.register(name, priority, move |cfg, priority, _| {
                Ok(Arc::new(BinaryStep::from_config(name, command, cfg, priority)))
            });
        }

        registry.register("file.copy", 9, |cfg, priority, _| {
            let from = required(cfg, cfg.from.as_ref(), "from")?;
            let to = required(cfg, cfg.to.as_ref(), "to")?;
            Ok(Arc::new(
                FileCopyStep::new(from, to, priority).with_condition(cfg.condition.clone()),
            ))
        });

        registry.register("env.read", 0, |cfg, priority, _| {
            let key = required(cfg, cfg.key.as_ref(), "key")?;
            let mut step = EnvReadStep::new(key, priority).with_condition(cfg.condition.clone());
            if let Some(store_as) = &cfg.store_as {
                step = step.store_as(store_as.clone());
            }
            if let Some(file) = &cfg.file {
                step = step.file(file.clone());
            }
            Ok(Arc::new(step))
        });

        registry.register("env.write", 0, |cfg, priority, _| {
            let key = required(cfg, cfg.key.as_ref(), "key")?;
            let value = cfg.value.clone().unwrap_or_default();
            let mut step =
                EnvWriteStep::new(key, value, priority).with_condition(cfg.condition.clone());
            if let Some(file) = &cfg.file {
                step = step.file(file.clone());
            }
            Ok(Arc::new(step))
        });

        registry.register("bash.run", 100, |cfg, priority, _| {
            let command = required(cfg, cfg.command.as_ref(), "command")?;
            Ok(Arc::new(
                ShellStep::bash(command, priority).with_condition(cfg.condition.clone()),
            ))
        });

        registry.register("command.run", 100, |cfg, priority, _| {
            let command = required(cfg, cfg.command.as_ref(), "command")?;
            Ok(Arc::new(
                ShellStep::sh(command, priority).with_condition(cfg.condition.clone()),
            ))
        });

        for name in ["db.create", "database.create"] {
            registry.register(name, 8, move |cfg, priority, deps| {
                Ok(Arc::new(
                    DbCreateStep::new(deps.clients.clone(), deps.suffixes.clone(), priority)
                        .named(name)
                        .with_args(cfg.args.clone())
                        .with_engine(cfg.engine.clone())
                        .with_condition(cfg.condition.clone()),
                ))
            });
        }

        registry.register("db.destroy", 0, |cfg, priority, deps| {
            Ok(Arc::new(
                DbDestroyStep::new(deps.clients.clone(), deps.suffixes.clone(), priority)
                    .with_args(cfg.args.clone())
                    .with_engine(cfg.engine.clone())
                    .with_condition(cfg.condition.clone()),
            ))
        });

        registry
    }

    /// Register (or replace) a step type
    pub fn register<F>(&mut self, name: &str, default_priority: i32, build: F)
    where
        F: Fn(&StepConfig, i32, &StepDeps) -> Result<BoxedStep> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Entry {
                default_priority,
                build: Box::new(build),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn default_priority(&self, name: &str) -> Option<i32> {
        self.entries.get(name).map(|e| e.default_priority)
    }

    /// Registered names with their default priority, sorted by name
    pub fn names(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.default_priority))
    }

    /// Build one step. A configured priority overrides the default.
    pub fn create(&self, cfg: &StepConfig) -> Result<BoxedStep> {
        let entry = self
            .entries
            .get(&cfg.name)
            .ok_or_else(|| Error::UnknownStep(cfg.name.clone()))?;
        let priority = cfg.priority.unwrap_or(entry.default_priority);
        (entry.build)(cfg, priority, &self.deps)
    }

    /// Build every enabled step, in order
    ///
    /// Unknown step names are logged and skipped; any other construction
    /// error is returned.
    pub fn build(&self, configs: &[StepConfig]) -> Result<Vec<BoxedStep>> {
        let mut steps = Vec::with_capacity(configs.len());

        for cfg in configs.iter().filter(|cfg| cfg.is_enabled()) {
            match self.create(cfg) {
                Ok(step) => steps.push(step),
                Err(Error::UnknownStep(name)) => {
                    log::warn!("Unknown step type '{name}', skipping");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(steps)
    }
}

fn required(cfg: &StepConfig, value: Option<&String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| Error::InvalidStep {
            step: cfg.name.clone(),
            message: format!("missing '{field}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::testing::{MockFactory, TestStep};
    use crate::types::StepOptions;

    fn registry() -> StepRegistry {
        StepRegistry::with_builtins(StepDeps::new(
            Arc::new(MockFactory::new()),
            Arc::new(MemorySuffixStore::new()),
        ))
    }

    #[test]
    fn test_builtin_priorities() {
        let registry = registry();
        let expected = [
            ("php", 5),
            ("php.composer", 10),
            ("php.laravel.artisan", 20),
            ("node.npm", 10),
            ("node.bun", 10),
            ("herd", 60),
            ("file.copy", 9),
            ("env.read", 0),
            ("env.write", 0),
            ("bash.run", 100),
            ("command.run", 100),
            ("db.create", 8),
            ("database.create", 8),
            ("db.destroy", 0),
        ];
        for (name, priority) in expected {
            assert_eq!(registry.default_priority(name), Some(priority), "{name}");
        }
    }

    #[test]
    fn test_configured_priority_overrides_default() {
        let registry = registry();
        let step = registry
            .create(&StepConfig::named("php.composer").with_priority(3))
            .unwrap();
        assert_eq!(step.priority(), 3);

        let step = registry
            .create(&StepConfig::named("php.composer").with_priority(0))
            .unwrap();
        assert_eq!(step.priority(), 0);

        let step = registry.create(&StepConfig::named("php.composer")).unwrap();
        assert_eq!(step.priority(), 10);
    }

    #[test]
    fn test_unknown_step() {
        let registry = registry();
        let err = registry.create(&StepConfig::named("nope")).unwrap_err();
        assert!(matches!(err, Error::UnknownStep(ref n) if n == "nope"));
    }

    #[test]
    fn test_build_skips_unknown_and_disabled() {
        let registry = registry();
        let mut disabled = StepConfig::named("node.npm");
        disabled.enabled = Some(false);

        let steps = registry
            .build(&[
                StepConfig::named("php.composer"),
                StepConfig::named("typo.step"),
                disabled,
                StepConfig::named("db.destroy"),
            ])
            .unwrap();

        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["php.composer", "db.destroy"]);
    }

    #[test]
    fn test_missing_required_field() {
        let registry = registry();
        let err = registry.build(&[StepConfig::named("bash.run")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration for bash.run: missing 'command'");
    }

    #[test]
    fn test_alias_keeps_its_name() {
        let registry = registry();
        let step = registry.create(&StepConfig::named("database.create")).unwrap();
        assert_eq!(step.name(), "database.create");
        assert_eq!(step.priority(), 8);
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = StepRegistry::new(StepDeps::default());
        registry.register("custom", 42, |cfg, priority, _| {
            Ok(TestStep::new(&cfg.name, priority).boxed())
        });

        let step = registry.create(&StepConfig::named("custom")).unwrap();
        assert_eq!(step.priority(), 42);
        assert!(step.run(&RunContext::new("/tmp", "main"), &StepOptions::default()).is_ok());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![("custom", 42)]);
    }
}
