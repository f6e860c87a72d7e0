//! Condition trees that gate steps.
//!
//! Conditions are written as tables (every entry must hold) or lists (every
//! element must hold). The only combinator is `not`:
//!
//! ```toml
//! condition = { file_exists = "artisan", not = { env_file_contains = "APP_KEY" } }
//! ```
//!
//! Trees are decoded once, when configuration is loaded, into [`Condition`].
//! Evaluation only reads the filesystem and process environment.

use crate::context::RunContext;
use crate::envfile::DEFAULT_ENV_FILE;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;

/// A decoded condition tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Condition {
    /// Conjunction; empty is true.
    All(Vec<Condition>),
    Not(Box<Condition>),
    Predicate(Predicate),
}

/// Argument for the env-file predicates: a bare key against the default
/// file, or an explicit `{ file, key }` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFileArg {
    Key(String),
    Entry { file: String, key: String },
}

impl EnvFileArg {
    fn file(&self) -> &str {
        match self {
            Self::Key(_) => DEFAULT_ENV_FILE,
            Self::Entry { file, .. } => file,
        }
    }

    fn key(&self) -> &str {
        match self {
            Self::Key(key) | Self::Entry { key, .. } => key,
        }
    }
}

/// Leaf predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Path relative to the worktree exists.
    FileExists(String),
    /// File contains a literal substring. Empty fields never match.
    FileContains { file: String, pattern: String },
    /// `package.json` defines the named script.
    FileHasScript(String),
    /// Program is on `PATH`.
    CommandExists(String),
    /// Current platform is one of these (case-insensitive).
    Os(Vec<String>),
    /// Process environment (or run override) defines the variable.
    EnvExists(String),
    EnvNotExists(String),
    /// Env file has the key with a non-empty value.
    EnvFileContains(EnvFileArg),
    EnvFileMissing(EnvFileArg),
    /// Unrecognized name; always true.
    Unknown(String),
}

impl Default for Condition {
    fn default() -> Self {
        Self::All(Vec::new())
    }
}

impl TryFrom<Value> for Condition {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::decode(&value)
    }
}

impl Condition {
    /// A condition that always holds.
    pub fn always() -> Self {
        Self::default()
    }

    /// Whether this is the empty conjunction.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::All(items) if items.is_empty())
    }

    /// Decode a generic value (as produced by TOML or JSON) into a tree.
    pub fn decode(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::always()),
            Value::Object(map) => map
                .iter()
                .map(|(name, arg)| decode_entry(name, arg))
                .collect::<Result<Vec<_>>>()
                .map(Self::All),
            Value::Array(items) => items
                .iter()
                .map(Self::decode)
                .collect::<Result<Vec<_>>>()
                .map(Self::All),
            other => Err(Error::InvalidCondition(format!(
                "expected a table or list, found {other}"
            ))),
        }
    }

    /// Evaluate against the run, short-circuiting on the first false.
    pub fn evaluate(&self, ctx: &RunContext) -> Result<bool> {
        match self {
            Self::All(items) => {
                for item in items {
                    if !item.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Not(inner) => Ok(!inner.evaluate(ctx)?),
            Self::Predicate(predicate) => predicate.evaluate(ctx),
        }
    }
}

fn decode_entry(name: &str, arg: &Value) -> Result<Condition> {
    if name == "not" {
        return Ok(Condition::Not(Box::new(Condition::decode(arg)?)));
    }

    let predicate = match name {
        "file_exists" => Predicate::FileExists(string_arg(name, arg, "file")?),
        "file_contains" => Predicate::FileContains {
            file: field(arg, "file"),
            pattern: field(arg, "pattern"),
        },
        "file_has_script" => Predicate::FileHasScript(string_arg(name, arg, "name")?),
        "command_exists" => Predicate::CommandExists(string_arg(name, arg, "command")?),
        "os" => Predicate::Os(string_list(name, arg)?),
        "env_exists" => Predicate::EnvExists(env_name_arg(name, arg)?),
        "env_not_exists" => Predicate::EnvNotExists(env_name_arg(name, arg)?),
        "env_file_contains" => Predicate::EnvFileContains(env_file_arg(name, arg)?),
        "env_file_missing" | "env_file_not_exists" => {
            Predicate::EnvFileMissing(env_file_arg(name, arg)?)
        }
        other => {
            log::warn!("Unknown condition '{other}' is treated as true");
            Predicate::Unknown(other.to_string())
        }
    };

    Ok(Condition::Predicate(predicate))
}

/// Bare string, or a table carrying the string under `field_name`.
fn string_arg(name: &str, arg: &Value, field_name: &str) -> Result<String> {
    match arg {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get(field_name)
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                Error::InvalidCondition(format!("{name}: missing string field '{field_name}'"))
            }),
        other => Err(Error::InvalidCondition(format!(
            "{name}: expected a string, found {other}"
        ))),
    }
}

fn field(arg: &Value, field_name: &str) -> String {
    arg.as_object()
        .and_then(|map: &Map<String, Value>| map.get(field_name))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list(name: &str, arg: &Value) -> Result<Vec<String>> {
    match arg {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(ToString::to_string).ok_or_else(|| {
                    Error::InvalidCondition(format!("{name}: list entries must be strings"))
                })
            })
            .collect(),
        other => Err(Error::InvalidCondition(format!(
            "{name}: expected a string or list, found {other}"
        ))),
    }
}

/// Variable name as a bare string, `{ env = ".." }` or `{ key = ".." }`.
fn env_name_arg(name: &str, arg: &Value) -> Result<String> {
    if let Some(var) = arg.get("env").and_then(Value::as_str) {
        return Ok(var.to_string());
    }
    string_arg(name, arg, "key")
}

fn env_file_arg(name: &str, arg: &Value) -> Result<EnvFileArg> {
    match arg {
        Value::String(key) => Ok(EnvFileArg::Key(key.clone())),
        Value::Object(map) => {
            let key = string_arg(name, arg, "key")?;
            match map.get("file").and_then(Value::as_str) {
                Some(file) => Ok(EnvFileArg::Entry {
                    file: file.to_string(),
                    key,
                }),
                None => Ok(EnvFileArg::Key(key)),
            }
        }
        other => Err(Error::InvalidCondition(format!(
            "{name}: expected a key or {{ file, key }}, found {other}"
        ))),
    }
}

impl Predicate {
    /// Evaluate this predicate. Missing files and commands are false.
    pub fn evaluate(&self, ctx: &RunContext) -> Result<bool> {
        match self {
            Self::FileExists(path) => Ok(ctx.resolve(path).exists()),
            Self::FileContains { file, pattern } => {
                if file.is_empty() || pattern.is_empty() {
                    return Ok(false);
                }
                Ok(read_optional(ctx, file)
                    .is_some_and(|content| contains_bytes(&content, pattern.as_bytes())))
            }
            Self::FileHasScript(script) => Ok(read_optional(ctx, "package.json")
                .is_some_and(|content| has_script(&content, script))),
            Self::CommandExists(program) => Ok(which::which(program).is_ok()),
            Self::Os(names) => Ok(names.iter().any(|name| os_matches(name))),
            Self::EnvExists(key) => Ok(env_exists(ctx, key)),
            Self::EnvNotExists(key) => Ok(!env_exists(ctx, key)),
            Self::EnvFileContains(arg) => Ok(env_file_contains(ctx, arg)),
            Self::EnvFileMissing(arg) => Ok(!env_file_contains(ctx, arg)),
            Self::Unknown(_) => Ok(true),
        }
    }
}

/// Any read failure (missing, a directory, unreadable) counts as absent.
fn read_optional(ctx: &RunContext, file: &str) -> Option<Vec<u8>> {
    let path = ctx.resolve(file);
    fs::read(&path)
        .inspect_err(|e| log::debug!("Cannot read {}: {e}", path.display()))
        .ok()
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn has_script(package_json: &[u8], script: &str) -> bool {
    serde_json::from_slice::<Value>(package_json)
        .ok()
        .and_then(|json| json.get("scripts").and_then(|s| s.get(script)).cloned())
        .is_some()
}

fn os_matches(name: &str) -> bool {
    let current = std::env::consts::OS;
    let name = name.to_lowercase();
    name == current || (name == "darwin" && current == "macos")
}

/// Run overrides and the process environment only, never the env file.
fn env_exists(ctx: &RunContext, key: &str) -> bool {
    ctx.env_override(key).is_some() || std::env::var_os(key).is_some()
}

fn env_file_contains(ctx: &RunContext, arg: &EnvFileArg) -> bool {
    ctx.env_file_values(arg.file())
        .get(arg.key())
        .is_some_and(|value| !value.is_empty())
}
