//! Built-in presets
//!
//! A preset is data: a detection rule plus default scaffold and cleanup
//! steps, written in the same TOML shape as `grove.toml`.

use crate::config::ProjectConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    detect: fn(&Path) -> bool,
    steps: &'static str,
}

impl Preset {
    /// Whether the project at `path` looks like this preset
    pub fn detect(&self, path: &Path) -> bool {
        (self.detect)(path)
    }

    /// Default steps, as a config
    pub fn config(&self) -> Result<ProjectConfig> {
        ProjectConfig::parse(self.steps)
            .with_context(|| format!("Invalid built-in preset: {}", self.name))
    }
}

/// Detection order matters: the first match wins
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "laravel",
        description: "Laravel application (composer, artisan, npm, herd)",
        detect: detect_laravel,
        steps: LARAVEL,
    },
    Preset {
        name: "php",
        description: "PHP project managed by composer",
        detect: detect_php,
        steps: PHP,
    },
    Preset {
        name: "node",
        description: "Node.js project",
        detect: detect_node,
        steps: NODE,
    },
];

/// Look up a preset by name
pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// First preset whose detection rule matches `path`
pub fn detect(path: &Path) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.detect(path))
}

fn detect_laravel(path: &Path) -> bool {
    path.join("artisan").is_file()
        || fs::read_to_string(path.join("composer.json"))
            .is_ok_and(|content| content.contains("laravel/framework"))
}

fn detect_php(path: &Path) -> bool {
    path.join("composer.json").is_file()
}

fn detect_node(path: &Path) -> bool {
    path.join("package.json").is_file()
}

// ============================================================================
// Step Lists
// ============================================================================

const LARAVEL: &str = r#"
[[scaffold.steps]]
name = "file.copy"
from = ".env.example"
to = ".env"
priority = 5

[[scaffold.steps]]
name = "database.create"
condition = { env_file_contains = { file = ".env", key = "DB_CONNECTION" } }

[[scaffold.steps]]
name = "php.composer"
args = ["install"]

[[scaffold.steps]]
name = "node.npm"
args = ["ci"]
condition = { file_exists = "package-lock.json", command_exists = "npm" }

[[scaffold.steps]]
name = "node.npm"
args = ["run", "build"]
priority = 15
condition = { file_has_script = "build", command_exists = "npm" }

[[scaffold.steps]]
name = "php.laravel.artisan"
args = ["key:generate", "--no-interaction"]
condition = { env_file_missing = "APP_KEY", command_exists = "php" }

[[scaffold.steps]]
name = "php.laravel.artisan"
args = ["migrate:fresh", "--seed", "--no-interaction"]

[[scaffold.steps]]
name = "php.laravel.artisan"
args = ["storage:link", "--no-interaction"]

[[scaffold.steps]]
name = "herd"
args = ["link", "--secure", "{{ .SiteName }}"]

[[cleanup.steps]]
name = "herd"
args = ["unlink", "{{ .SiteName }}"]

[[cleanup.steps]]
name = "db.destroy"
condition = { env_file_contains = { file = ".env", key = "DB_CONNECTION" } }
"#;

const PHP: &str = r#"
[[scaffold.steps]]
name = "php.composer"
args = ["install"]
condition = { file_exists = "composer.lock", command_exists = "composer" }

[[scaffold.steps]]
name = "php.composer"
args = ["update"]
condition = { not = { file_exists = "composer.lock" }, command_exists = "composer" }
"#;

const NODE: &str = r#"
[[scaffold.steps]]
name = "node.npm"
args = ["ci"]
condition = { file_exists = "package-lock.json", command_exists = "npm" }

[[scaffold.steps]]
name = "node.npm"
args = ["install"]
condition = { not = { file_exists = "package-lock.json" }, command_exists = "npm" }
"#;
