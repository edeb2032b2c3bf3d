mod analyze;
mod config;
mod context;
mod generate;
mod init;
mod list;
mod render;
mod show;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gitsummary::{StoreError, VcsError};
use std::path::PathBuf;

pub const EXIT_SUCCESS: i32 = 0;
/// A commit failed extraction, or nothing matched
pub const EXIT_FAILURE: i32 = 1;
/// Invalid revision, repository or prefix
pub const EXIT_INPUT: i32 = 2;

#[derive(Parser)]
#[command(name = "gitsummary")]
#[command(
    about = "Semantic commit artifacts stored in git notes",
    long_about = "Analyze commits into structured artifacts (intent, category, impact, \
                  breaking changes), store them under refs/notes/intent and build \
                  changelogs, release notes and impact reports from them."
)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (info logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path inside the git repository to operate on
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default .gitsummary/config.toml
    Init(init::InitArgs),

    /// Analyze a commit or range and store artifacts
    Analyze(analyze::AnalyzeArgs),

    /// List commits in a range with their analysis status
    List(list::ListArgs),

    /// Show stored artifacts by commit, prefix or range
    Show(show::ShowArgs),

    /// Build a report from stored artifacts
    Generate(generate::GenerateArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

/// Execute the CLI command, returning the process exit code
pub async fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Init(args) => init::execute(&cli.repo, args),
        Commands::Analyze(args) => analyze::execute(&cli.repo, args).await,
        Commands::List(args) => list::execute(&cli.repo, args),
        Commands::Show(args) => show::execute(&cli.repo, args),
        Commands::Generate(args) => generate::execute(&cli.repo, args),
        Commands::Config(args) => config::execute(&cli.repo, args),
    }
}

/// Map an error to an exit code. Bad user input gets its own code so scripts
/// can tell it apart from extraction failures.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<VcsError>() {
            return match e {
                VcsError::Git { .. } => EXIT_FAILURE,
                _ => EXIT_INPUT,
            };
        }
        if let Some(e) = cause.downcast_ref::<StoreError>() {
            return match e {
                StoreError::InvalidPrefix { .. }
                | StoreError::NotFound { .. }
                | StoreError::AmbiguousPrefix { .. } => EXIT_INPUT,
                _ => EXIT_FAILURE,
            };
        }
    }
    EXIT_FAILURE
}
