use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Run git in `dir` and capture trimmed stdout
fn run_capture(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: git {}", args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Branch checked out in `dir`, if it is a git checkout on a branch
pub fn current_branch(dir: &Path) -> Option<String> {
    run_capture(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
        .inspect_err(|e| log::debug!("No branch for {}: {e:#}", dir.display()))
        .ok()
        .filter(|b| !b.is_empty() && b != "HEAD")
}

/// Repository name: the directory holding the shared git dir
///
/// For worktrees this is the main checkout (or bare repo), not the
/// worktree directory itself.
pub fn repo_name(dir: &Path) -> Option<String> {
    let common = run_capture(
        dir,
        &["rev-parse", "--path-format=absolute", "--git-common-dir"],
    )
    .ok()?;
    repo_name_from_git_dir(&PathBuf::from(common))
}

fn repo_name_from_git_dir(git_dir: &Path) -> Option<String> {
    let name = git_dir.file_name()?.to_str()?;
    let name = if name == ".git" {
        git_dir.parent()?.file_name()?.to_str()?
    } else {
        name.strip_suffix(".git").unwrap_or(name)
    };
    Some(name.to_string())
}
