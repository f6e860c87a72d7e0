//! `{{ .Name }}` placeholder substitution.
//!
//! Identifiers resolve, in order, against the run's built-in fields, its
//! variables, and finally the worktree's environment file. An identifier
//! found nowhere is a configuration error.

use crate::context::RunContext;
use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static pattern")
});

/// Built-in identifiers, always resolvable.
pub const BUILTINS: &[&str] = &[
    "Path",
    "WorktreePath",
    "Branch",
    "RepoName",
    "SiteName",
    "Preset",
    "DbSuffix",
];

/// Substitute every placeholder in `input`.
///
/// Strings without placeholders come back unchanged.
pub fn render(input: &str, ctx: &RunContext) -> Result<String> {
    if !input.contains("{{") {
        return Ok(input.to_string());
    }

    let mut missing = None;
    let out = PLACEHOLDER.replace_all(input, |caps: &Captures| {
        let ident = &caps[1];
        resolve(ident, ctx).unwrap_or_else(|| {
            missing.get_or_insert_with(|| ident.to_string());
            String::new()
        })
    });

    match missing {
        Some(ident) => Err(Error::UnknownVariable(ident)),
        None => Ok(out.into_owned()),
    }
}

/// Render each string in order, stopping at the first error.
pub fn render_all(inputs: &[String], ctx: &RunContext) -> Result<Vec<String>> {
    inputs.iter().map(|s| render(s, ctx)).collect()
}

/// Value of a single identifier, if known.
pub fn resolve(ident: &str, ctx: &RunContext) -> Option<String> {
    let builtin = match ident {
        "Path" => Some(ctx.path_name()),
        "WorktreePath" => Some(ctx.worktree_path().display().to_string()),
        "Branch" => Some(ctx.branch().to_string()),
        "RepoName" => Some(ctx.repo_name().to_string()),
        "SiteName" => Some(ctx.site_name().to_string()),
        "Preset" => Some(ctx.preset().to_string()),
        "DbSuffix" => Some(ctx.db_suffix()),
        _ => None,
    };

    builtin
        .or_else(|| ctx.lookup_var(ident))
        .or_else(|| ctx.env_value(ident))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx() -> RunContext {
        RunContext::new("/work/myapp-feature", "feature/login")
            .with_repo_name("myapp")
            .with_site_name("myapp-feature")
    }

    #[test]
    fn test_no_placeholders_unchanged() {
        let ctx = ctx();
        for input in ["", "composer install", "{ not a placeholder }", "{{ broken"] {
            assert_eq!(render(input, &ctx).unwrap(), input);
        }
    }

    #[test]
    fn test_builtins() {
        let ctx = ctx();
        ctx.set_db_suffix("brave_otter");

        assert_eq!(
            render("{{ .SiteName }}.test", &ctx).unwrap(),
            "myapp-feature.test"
        );
        assert_eq!(render("{{.Branch}}", &ctx).unwrap(), "feature/login");
        assert_eq!(render("{{ .Path }}", &ctx).unwrap(), "myapp-feature");
        assert_eq!(
            render("{{ .RepoName }}_{{ .DbSuffix }}", &ctx).unwrap(),
            "myapp_brave_otter"
        );
    }

    #[test]
    fn test_whitespace_inside_delimiters() {
        let ctx = ctx();
        assert_eq!(render("{{   .RepoName\t}}", &ctx).unwrap(), "myapp");
    }

    #[test]
    fn test_variables() {
        let ctx = ctx();
        ctx.set_var("AppKey", "base64:xyz");
        assert_eq!(render("APP_KEY={{ .AppKey }}", &ctx).unwrap(), "APP_KEY=base64:xyz");
    }

    #[test]
    fn test_empty_variable_still_known() {
        let ctx = ctx();
        ctx.set_var("Empty", "");
        assert_eq!(render("[{{ .Empty }}]", &ctx).unwrap(), "[]");
    }

    #[test]
    fn test_env_file_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "APP_NAME=Grove\n").unwrap();
        let ctx = RunContext::new(dir.path(), "main");

        assert_eq!(render("{{ .APP_NAME }}", &ctx).unwrap(), "Grove");
    }

    #[test]
    fn test_unknown_identifier_fails() {
        let ctx = ctx();
        let err = render("{{ .Nope }}-{{ .AlsoNope }}", &ctx).unwrap_err();
        assert!(matches!(err, Error::UnknownVariable(ref name) if name == "Nope"));
    }

    #[test]
    fn test_idempotent() {
        let ctx = ctx();
        let once = render("{{ .SiteName }}", &ctx).unwrap();
        assert_eq!(render(&once, &ctx).unwrap(), once);
    }

    #[test]
    fn test_render_all() {
        let ctx = ctx();
        let args = vec!["--name".to_string(), "{{ .SiteName }}".to_string()];
        assert_eq!(render_all(&args, &ctx).unwrap(), vec!["--name", "myapp-feature"]);
    }
}
