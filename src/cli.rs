use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grove")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Scaffold and clean up per-branch development worktrees", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Prepare a worktree: install dependencies, create the database, link the site
    Scaffold(RunArgs),

    /// Tear down what scaffold created for a worktree
    Cleanup(RunArgs),

    /// List registered step types and their default priorities
    Steps,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Worktree directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Branch checked out in the worktree
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Repository name (defaults to the worktree directory name)
    #[arg(long)]
    pub repo: Option<String>,

    /// Site name used for database names and links
    #[arg(long)]
    pub site_name: Option<String>,

    /// Preset to use instead of auto-detection
    #[arg(long)]
    pub preset: Option<String>,

    /// Show what would run without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Project config file (defaults to <PATH>/grove.toml)
    #[arg(long, env = "GROVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Extra arguments appended to program steps
    #[arg(last = true)]
    pub extra: Vec<String>,
}
