//! Reading and editing `KEY=value` environment files.
//!
//! Reading goes through `dotenvy`, so quoting, `export` prefixes, inline
//! comments and `${VAR}` references follow the usual dotenv rules. The
//! writer edits a file in place: comments and key order survive, an existing
//! key is replaced where it stands, new keys are appended.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Default environment file name, relative to the worktree.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Parse environment file content into a key/value map.
///
/// Lines dotenvy cannot parse are logged and skipped. Later duplicates win.
pub fn parse(content: &str) -> HashMap<String, String> {
    collect(content.as_bytes())
}

/// Read and parse an environment file. A missing file is an empty map.
pub fn read(path: &Path) -> io::Result<HashMap<String, String>> {
    match File::open(path) {
        Ok(file) => Ok(collect(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e),
    }
}

fn collect<R: Read>(reader: R) -> HashMap<String, String> {
    dotenvy::from_read_iter(reader)
        .filter_map(|entry| {
            entry
                .inspect_err(|e| log::debug!("Skipping env line: {e}"))
                .ok()
        })
        .collect()
}

/// Key assigned on `line`, if it is an assignment at all.
fn line_key(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, _) = line.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

/// Set `key` to `value` in the file at `path`, creating the file if needed.
///
/// The new content is written to a `.tmp` sibling and renamed over the
/// original; the original's permissions are carried over.
pub fn write_key(path: &Path, key: &str, value: &str) -> io::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let content = upsert(existing.as_deref().unwrap_or_default(), key, value);
    let tmp = tmp_path(path);
    fs::write(&tmp, content)?;

    if existing.is_some() {
        let permissions = fs::metadata(path)?.permissions();
        fs::set_permissions(&tmp, permissions)?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Replace every assignment of `key` in `content`, or append one.
fn upsert(content: &str, key: &str, value: &str) -> String {
    let entry = format!("{key}={value}");
    let mut replaced = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if line_key(line) == Some(key) {
                replaced = true;
                entry.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(entry);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
