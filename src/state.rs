use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scaffold::SuffixStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory inside the worktree holding grove's own files
pub const STATE_DIR: &str = ".grove";

// ============================================================================
// State Structures
// ============================================================================

/// What grove remembers about one worktree
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorktreeState {
    /// Suffix shared by the databases created for this worktree
    pub db_suffix: Option<String>,

    /// Last time the state was updated
    pub updated_at: DateTime<Utc>,
}

impl Default for WorktreeState {
    fn default() -> Self {
        Self {
            db_suffix: None,
            updated_at: Utc::now(),
        }
    }
}

impl WorktreeState {
    /// Get the state file path
    pub fn state_file(worktree: &Path) -> PathBuf {
        worktree.join(STATE_DIR).join("state.toml")
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(worktree: &Path) -> Result<Self> {
        let path = Self::state_file(worktree);

        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, worktree: &Path) -> Result<()> {
        let path = Self::state_file(worktree);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create state directory: {}", dir.display())
            })?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(&path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the timestamp and save
    pub fn touch(&mut self, worktree: &Path) -> Result<()> {
        self.updated_at = Utc::now();
        self.save(worktree)
    }
}

// ============================================================================
// Suffix Store
// ============================================================================

/// Keeps the database suffix in each worktree's state file
#[derive(Debug, Default)]
pub struct StateFileStore;

impl SuffixStore for StateFileStore {
    fn load_suffix(&self, worktree: &Path) -> Result<Option<String>> {
        Ok(WorktreeState::load(worktree)?
            .db_suffix
            .filter(|s| !s.is_empty()))
    }

    fn save_suffix(&self, worktree: &Path, suffix: &str) -> Result<()> {
        let mut state = WorktreeState::load(worktree)?;
        state.db_suffix = Some(suffix.to_string());
        state.touch(worktree)
    }
}
