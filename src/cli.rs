use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::VcsKind;

/// Import vendor source drops into a version-controlled workspace.
#[derive(Parser)]
#[command(name = "vendorsync", version, about, long_about = None)]
pub struct Cli {
    /// Log per-path detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also append the log to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print JSON Schema for the plan report.
    Schema,
    /// Apply a diff between two source drops to the workspace.
    Import(ImportArgs),
    /// Show the jobs an import would run, without changing anything.
    Plan(PlanArgs),
    /// Report whether a directory is case-sensitive.
    Probe(ProbeArgs),
}

#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Root of the new source drop.
    #[arg(long, required = true)]
    pub source: PathBuf,

    /// Root of the destination workspace.
    #[arg(long, required = true)]
    pub workspace: PathBuf,

    /// File with one `<mode>\t<path>[\t<target>]` line per change.
    #[arg(long, conflicts_with = "git_repo", required_unless_present = "git_repo")]
    pub diff_file: Option<PathBuf>,

    /// Git clone to diff the two drops in.
    #[arg(long, requires_all = ["from", "to"])]
    pub git_repo: Option<PathBuf>,

    /// Git revision of the previous drop.
    #[arg(long)]
    pub from: Option<String>,

    /// Git revision of the new drop.
    #[arg(long)]
    pub to: Option<String>,

    /// Reuse `git diff` output stored in this directory.
    #[arg(long)]
    pub command_cache: Option<PathBuf>,

    /// Version control of the workspace.
    #[arg(long, value_enum, default_value_t = VcsKind::Plastic)]
    pub vcs: VcsKind,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Log what would be done without changing anything.
    #[arg(long)]
    pub pretend: bool,

    /// Skip failing operations without asking.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Only validate operations, do not execute.
    #[arg(long)]
    pub validate_only: bool,

    /// Operations per version-control command.
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Process at most this many operations.
    #[arg(long)]
    pub max_ops: Option<usize>,
}

#[derive(Args, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Clone)]
pub struct ProbeArgs {
    /// Directory to probe.
    #[arg(long, required = true)]
    pub dir: PathBuf,
}
