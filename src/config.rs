use anyhow::{Context, Result};
use scaffold::StepConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up at the worktree root
pub const CONFIG_FILE: &str = "grove.toml";

// ============================================================================
// Project Config
// ============================================================================

/// Per-project settings, from `grove.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Used for database names and site links
    pub site_name: Option<String>,
    /// Preset name; auto-detected when absent
    pub preset: Option<String>,
    pub scaffold: StepList,
    pub cleanup: StepList,
}

/// A configured list of steps
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StepList {
    /// Replace the preset's steps instead of appending to them
    #[serde(rename = "override")]
    pub replace: bool,
    pub steps: Vec<StepConfig>,
}

impl StepList {
    /// Preset steps followed by ours, or only ours when overriding
    pub fn merged_onto(&self, preset: Option<&Self>) -> Vec<StepConfig> {
        let mut steps = match preset {
            Some(preset) if !self.replace => preset.steps.clone(),
            _ => Vec::new(),
        };
        steps.extend(self.steps.iter().cloned());
        steps
    }
}

impl ProjectConfig {
    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load the project config
    ///
    /// An explicit path must exist. Without one, `<worktree>/grove.toml` is
    /// used when present and defaults otherwise.
    pub fn load(explicit: Option<&Path>, worktree: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::default_path(worktree);
                if !path.exists() {
                    log::debug!("No {} in {}, using defaults", CONFIG_FILE, worktree.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn default_path(worktree: &Path) -> PathBuf {
        worktree.join(CONFIG_FILE)
    }
}
