//! `scaffold` and `cleanup` commands
//!
//! Both resolve the same inputs (config, preset, run context) and differ
//! only in which step list they execute.

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use scaffold::{
    ExecuteSummary, RunContext, StepConfig, StepDeps, StepExecutor, StepOptions, StepRegistry,
};
use std::path::Path;
use std::sync::Arc;

use crate::Context;
use crate::cli::RunArgs;
use crate::config::ProjectConfig;
use crate::git;
use crate::presets::{self, Preset};
use crate::progress::GroupProgress;
use crate::state::{StateFileStore, WorktreeState};
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scaffold,
    Cleanup,
}

impl Phase {
    fn title(self) -> &'static str {
        match self {
            Self::Scaffold => "Scaffolding",
            Self::Cleanup => "Cleaning up",
        }
    }
}

pub fn scaffold(ctx: &Context, args: RunArgs) -> Result<()> {
    execute(ctx, args, Phase::Scaffold)
}

pub fn cleanup(ctx: &Context, args: RunArgs) -> Result<()> {
    execute(ctx, args, Phase::Cleanup)
}

/// Registry with the real database backend and worktree state persistence
pub fn registry() -> StepRegistry {
    StepRegistry::with_builtins(StepDeps::new(
        Arc::new(dbkit::default_factory()),
        Arc::new(StateFileStore),
    ))
}

fn execute(ctx: &Context, args: RunArgs, phase: Phase) -> Result<()> {
    let worktree = args
        .path
        .canonicalize()
        .with_context(|| format!("Worktree not found: {}", args.path.display()))?;
    if !worktree.is_dir() {
        bail!("Not a directory: {}", worktree.display());
    }

    let config = ProjectConfig::load(args.config.as_deref(), &worktree)?;
    let preset = resolve_preset(
        args.preset.as_deref().or(config.preset.as_deref()),
        &worktree,
    )?;
    let configs = step_configs(&config, preset, phase)?;
    let run_ctx = run_context(&args, &config, preset, &worktree);

    let steps = registry().build(&configs)?;

    if !ctx.quiet {
        ui::header(&format!("{} {}", phase.title(), run_ctx.path_name()));
        ui::kv("Path", &worktree.display().to_string());
        if !run_ctx.branch().is_empty() {
            ui::kv("Branch", run_ctx.branch());
        }
        ui::kv("Site", run_ctx.site_name());
        ui::kv("Preset", preset.map_or("none", |p| p.name));
        println!();
        if args.dry_run {
            ui::warn("Dry run - no changes will be made");
        }
    }

    if steps.is_empty() {
        ui::info("No steps to run");
        return Ok(());
    }

    let opts = StepOptions {
        args: args.extra,
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
    };
    let mut executor = StepExecutor::new(steps, opts);
    let mut progress = GroupProgress::new(ctx.quiet);
    let outcome = executor.execute_with(&run_ctx, &mut progress);

    let summary = executor.summary();
    if let Err(e) = outcome {
        ui::error(&e.to_string());
        report(&summary, ctx.quiet);
        return Err(e.into());
    }

    report(&summary, ctx.quiet);
    if !ctx.quiet && !args.dry_run {
        ui::success(&format!("{} complete", phase.title()));
    }
    Ok(())
}

/// An explicit preset must exist; otherwise detection may find nothing
fn resolve_preset(name: Option<&str>, worktree: &Path) -> Result<Option<&'static Preset>> {
    match name {
        Some(name) => match presets::find(name) {
            Some(preset) => Ok(Some(preset)),
            None => bail!("Unknown preset '{name}'"),
        },
        None => {
            let detected = presets::detect(worktree);
            match detected {
                Some(preset) => log::info!("Detected preset: {}", preset.name),
                None => log::info!("No preset detected for {}", worktree.display()),
            }
            Ok(detected)
        }
    }
}

fn step_configs(
    config: &ProjectConfig,
    preset: Option<&Preset>,
    phase: Phase,
) -> Result<Vec<StepConfig>> {
    let defaults = preset.map(Preset::config).transpose()?;
    let steps = match phase {
        Phase::Scaffold => config
            .scaffold
            .merged_onto(defaults.as_ref().map(|d| &d.scaffold)),
        Phase::Cleanup => config
            .cleanup
            .merged_onto(defaults.as_ref().map(|d| &d.cleanup)),
    };
    Ok(steps)
}

fn run_context(
    args: &RunArgs,
    config: &ProjectConfig,
    preset: Option<&Preset>,
    worktree: &Path,
) -> RunContext {
    let branch = args
        .branch
        .clone()
        .or_else(|| git::current_branch(worktree))
        .unwrap_or_default();
    let mut run_ctx = RunContext::new(worktree, branch);

    if let Some(repo) = args.repo.clone().or_else(|| git::repo_name(worktree)) {
        run_ctx = run_ctx.with_repo_name(repo);
    }
    if let Some(site) = args.site_name.as_ref().or(config.site_name.as_ref()) {
        run_ctx = run_ctx.with_site_name(site.clone());
    }
    if let Some(preset) = preset {
        run_ctx = run_ctx.with_preset(preset.name);
    }

    match WorktreeState::load(worktree) {
        Ok(WorktreeState {
            db_suffix: Some(suffix),
            ..
        }) if !suffix.is_empty() => {
            log::debug!("Reusing recorded database suffix {suffix}");
            run_ctx = run_ctx.with_db_suffix(suffix);
        }
        Ok(_) => {}
        Err(e) => log::warn!("Ignoring unreadable worktree state: {e:#}"),
    }
    run_ctx
}

fn report(summary: &ExecuteSummary, quiet: bool) {
    if quiet {
        return;
    }
    println!();
    println!(
        "  {} ran, {} skipped, {} failed",
        summary.ran.to_string().green(),
        summary.skipped.to_string().dimmed(),
        if summary.failed > 0 {
            summary.failed.to_string().red()
        } else {
            summary.failed.to_string().normal()
        }
    );
}
