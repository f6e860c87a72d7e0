//! Run context and provider traits
//!
//! A [`RunContext`] carries everything a scaffold or cleanup run knows about
//! its checkout. It is shared by reference across the worker threads of a
//! priority group, so all mutable state sits behind locks.

use crate::envfile::{self, DEFAULT_ENV_FILE};
use crate::types::{SkipReason, StepResult};
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

/// Persists the database suffix between runs
///
/// Scaffold writes the suffix after provisioning; a later cleanup run, with
/// a fresh context, reads it back to find the databases to drop.
pub trait SuffixStore: Send + Sync {
    /// Load the suffix recorded for a worktree, if any
    fn load_suffix(&self, worktree: &Path) -> Result<Option<String>>;

    /// Record the suffix chosen for a worktree
    fn save_suffix(&self, worktree: &Path, suffix: &str) -> Result<()>;
}

/// In-memory suffix store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySuffixStore {
    suffixes: Mutex<HashMap<PathBuf, String>>,
}

impl MemorySuffixStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Suffix saved for `worktree`
    pub fn get(&self, worktree: &Path) -> Option<String> {
        lock(&self.suffixes).get(worktree).cloned()
    }
}

impl SuffixStore for MemorySuffixStore {
    fn load_suffix(&self, worktree: &Path) -> Result<Option<String>> {
        Ok(self.get(worktree))
    }

    fn save_suffix(&self, worktree: &Path, suffix: &str) -> Result<()> {
        lock(&self.suffixes).insert(worktree.to_path_buf(), suffix.to_string());
        Ok(())
    }
}

/// Progress callback for execution
///
/// Implement this trait to receive progress updates while the executor
/// walks priority groups.
pub trait ProgressCallback: Send {
    /// Called before a priority group is evaluated
    fn on_group_start(&mut self, priority: i32, count: usize);

    /// Called when a step will not run
    fn on_step_skipped(&mut self, name: &str, reason: SkipReason);

    /// Called once per step that ran, in step order
    fn on_step_complete(&mut self, result: &StepResult);

    /// Called after every step in a group has finished
    fn on_group_complete(&mut self, priority: i32);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_group_start(&mut self, _priority: i32, _count: usize) {}
    fn on_step_skipped(&mut self, _name: &str, _reason: SkipReason) {}
    fn on_step_complete(&mut self, _result: &StepResult) {}
    fn on_group_complete(&mut self, _priority: i32) {}
}

/// State for one scaffold or cleanup invocation
///
/// Identity fields are fixed at construction. Variables and the database
/// suffix may be written by steps running concurrently:
///
/// - Variables are last-write-wins.
/// - The suffix is guarded by [`RunContext::lock_db_suffix`]. A provisioning
///   step holds that lease from "is a suffix already set?" through the end
///   of creation, so only one step ever picks a new suffix and the others
///   in the group reuse it.
#[derive(Debug)]
pub struct RunContext {
    worktree_path: PathBuf,
    branch: String,
    repo_name: String,
    site_name: String,
    preset: String,
    env_file: String,
    env_overrides: HashMap<String, String>,
    vars: RwLock<HashMap<String, String>>,
    db_suffix: RwLock<Option<String>>,
    db_lease: Mutex<()>,
}

/// Exclusive right to negotiate the run's database suffix.
///
/// Released on drop.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct SuffixLease<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl RunContext {
    /// Create a context for a checkout at `worktree_path` on `branch`
    pub fn new(worktree_path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        let worktree_path = worktree_path.into();
        let repo_name = dir_name(&worktree_path);

        Self {
            site_name: repo_name.clone(),
            repo_name,
            worktree_path,
            branch: branch.into(),
            preset: String::new(),
            env_file: DEFAULT_ENV_FILE.to_string(),
            env_overrides: HashMap::new(),
            vars: RwLock::new(HashMap::new()),
            db_suffix: RwLock::new(None),
            db_lease: Mutex::new(()),
        }
    }

    pub fn with_repo_name(mut self, name: impl Into<String>) -> Self {
        self.repo_name = name.into();
        self
    }

    pub fn with_site_name(mut self, name: impl Into<String>) -> Self {
        self.site_name = name.into();
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Environment file consulted by [`RunContext::env_value`]
    pub fn with_env_file(mut self, file: impl Into<String>) -> Self {
        self.env_file = file.into();
        self
    }

    /// Values that take precedence over the environment file
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env_overrides = env;
        self
    }

    /// Seed the suffix, e.g. from a persisted record
    pub fn with_db_suffix(self, suffix: impl Into<String>) -> Self {
        self.set_db_suffix(suffix);
        self
    }

    pub fn worktree_path(&self) -> &Path {
        &self.worktree_path
    }

    /// Final component of the worktree path
    pub fn path_name(&self) -> String {
        dir_name(&self.worktree_path)
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    /// Resolve `relative` against the worktree
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.worktree_path.join(relative)
    }

    /// Variable value, empty if unset
    pub fn get_var(&self, name: &str) -> String {
        self.lookup_var(name).unwrap_or_default()
    }

    /// Variable value, `None` if unset
    pub fn lookup_var(&self, name: &str) -> Option<String> {
        read(&self.vars).get(name).cloned()
    }

    pub fn set_var(&self, name: impl Into<String>, value: impl Into<String>) {
        write(&self.vars).insert(name.into(), value.into());
    }

    /// Copy of all variables
    pub fn vars(&self) -> HashMap<String, String> {
        read(&self.vars).clone()
    }

    /// Current suffix, empty if none has been chosen
    pub fn db_suffix(&self) -> String {
        self.current_db_suffix().unwrap_or_default()
    }

    pub fn current_db_suffix(&self) -> Option<String> {
        read(&self.db_suffix).clone()
    }

    pub fn set_db_suffix(&self, suffix: impl Into<String>) {
        *write(&self.db_suffix) = Some(suffix.into());
    }

    /// Forget a tentative suffix after a naming collision
    pub fn clear_db_suffix(&self) {
        *write(&self.db_suffix) = None;
    }

    /// Acquire the suffix negotiation lease
    ///
    /// Readers of [`RunContext::db_suffix`] are never blocked by it.
    pub fn lock_db_suffix(&self) -> SuffixLease<'_> {
        SuffixLease {
            _guard: lock(&self.db_lease),
        }
    }

    /// Value injected for this run with [`RunContext::with_env`]
    pub fn env_override(&self, key: &str) -> Option<&str> {
        self.env_overrides.get(key).map(String::as_str)
    }

    /// Look up an environment value: explicit overrides first, then the
    /// worktree's environment file. Missing or unreadable files yield `None`.
    pub fn env_value(&self, key: &str) -> Option<String> {
        if let Some(value) = self.env_overrides.get(key) {
            return Some(value.clone());
        }
        self.env_file_values(&self.env_file).remove(key)
    }

    /// Parsed contents of an environment file relative to the worktree
    pub fn env_file_values(&self, file: &str) -> HashMap<String, String> {
        let path = self.resolve(file);
        envfile::read(&path).unwrap_or_else(|e| {
            log::debug!("Ignoring unreadable env file {}: {e}", path.display());
            HashMap::new()
        })
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// A panicking step must not wedge its siblings, so poisoned locks are entered anyway
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_path() {
        let ctx = RunContext::new("/work/myapp-feature", "feature/x");
        assert_eq!(ctx.path_name(), "myapp-feature");
        assert_eq!(ctx.repo_name(), "myapp-feature");
        assert_eq!(ctx.site_name(), "myapp-feature");
        assert_eq!(ctx.branch(), "feature/x");
        assert_eq!(ctx.preset(), "");
    }

    #[test]
    fn test_builder_overrides() {
        let ctx = RunContext::new("/work/feature", "main")
            .with_repo_name("myapp")
            .with_site_name("myapp-feature")
            .with_preset("laravel");
        assert_eq!(ctx.repo_name(), "myapp");
        assert_eq!(ctx.site_name(), "myapp-feature");
        assert_eq!(ctx.preset(), "laravel");
    }

    #[test]
    fn test_vars_default_empty() {
        let ctx = RunContext::new("/tmp", "main");
        assert_eq!(ctx.get_var("missing"), "");
        assert_eq!(ctx.lookup_var("missing"), None);

        ctx.set_var("AppKey", "base64:abc");
        assert_eq!(ctx.get_var("AppKey"), "base64:abc");
    }

    #[test]
    fn test_db_suffix_lifecycle() {
        let ctx = RunContext::new("/tmp", "main");
        assert_eq!(ctx.db_suffix(), "");

        ctx.set_db_suffix("brave_otter");
        assert_eq!(ctx.current_db_suffix().as_deref(), Some("brave_otter"));

        ctx.clear_db_suffix();
        assert_eq!(ctx.current_db_suffix(), None);
    }

    #[test]
    fn test_concurrent_var_writes() {
        let ctx = Arc::new(RunContext::new("/tmp", "main"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || ctx.set_var(format!("v{i}"), i.to_string()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ctx.vars().len(), 8);
    }

    #[test]
    fn test_lease_serializes_first_writer() {
        let ctx = Arc::new(RunContext::new("/tmp", "main"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || {
                    let _lease = ctx.lock_db_suffix();
                    if ctx.current_db_suffix().is_none() {
                        ctx.set_db_suffix(format!("suffix_{i}"));
                    }
                    ctx.db_suffix()
                })
            })
            .collect();

        let seen: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(seen.iter().all(|s| *s == seen[0]));
    }

    #[test]
    fn test_env_value_prefers_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "DB_CONNECTION=mysql\nAPP_NAME=Grove\n").unwrap();

        let mut overrides = HashMap::new();
        overrides.insert("DB_CONNECTION".to_string(), "pgsql".to_string());
        let ctx = RunContext::new(dir.path(), "main").with_env(overrides);

        assert_eq!(ctx.env_value("DB_CONNECTION").as_deref(), Some("pgsql"));
        assert_eq!(ctx.env_value("APP_NAME").as_deref(), Some("Grove"));
        assert_eq!(ctx.env_value("MISSING"), None);
    }

    #[test]
    fn test_memory_suffix_store() {
        let store = MemorySuffixStore::new();
        let path = Path::new("/work/a");
        assert_eq!(store.load_suffix(path).unwrap(), None);

        store.save_suffix(path, "calm_heron").unwrap();
        assert_eq!(store.load_suffix(path).unwrap().as_deref(), Some("calm_heron"));
    }
}
