//! Subprocess helpers for program and shell steps.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `program` with `args` inside `dir`, capturing output.
///
/// Non-zero exit is an error carrying the tail of the combined output.
pub fn run_in(dir: &Path, program: &str, args: &[String]) -> Result<String> {
    let display = command_line(program, args);
    log::debug!("Executing `{display}` in {}", dir.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {display}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        return Ok(stdout.trim().to_string());
    }

    let detail = tail(&format!("{stdout}{stderr}"), 20);
    match output.status.code() {
        Some(code) => anyhow::bail!("`{display}` exited with status {code}\n{detail}"),
        None => anyhow::bail!("`{display}` was terminated by a signal\n{detail}"),
    }
}

/// Render a command line for messages.
pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_line() {
        assert_eq!(command_line("composer", &[]), "composer");
        assert_eq!(
            command_line("php", &["artisan".to_string(), "migrate".to_string()]),
            "php artisan migrate"
        );
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("only", 5), "only");
        assert_eq!(tail("", 5), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_in_uses_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();

        let out = run_in(dir.path(), "ls", &[]).unwrap();
        assert!(out.contains("marker"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_in_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        let args = vec!["-c".to_string(), "echo oops >&2; exit 3".to_string()];

        let err = run_in(dir.path(), "sh", &args).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exited with status 3"), "{message}");
        assert!(message.contains("oops"));
    }

    #[test]
    fn test_run_in_missing_program() {
        let dir = TempDir::new().unwrap();
        let err = run_in(dir.path(), "definitely-not-a-real-binary-xyz", &[]).unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}
