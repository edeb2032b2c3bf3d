use super::EXIT_SUCCESS;
use anyhow::Result;
use clap::{Args, Subcommand};
use gitsummary::services::ConfigService;
use gitsummary::vcs::GitRepository;
use std::path::Path;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Dotted key, e.g. storage.notes_ref
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Dotted key, e.g. analysis.extractors
        key: String,
        /// New value; lists are comma-separated
        value: String,
    },
}

pub fn execute(repo: &Path, args: ConfigArgs) -> Result<i32> {
    let root = GitRepository::discover(repo)?.root().to_path_buf();
    let config_service = ConfigService::new(&root);

    match args.command {
        ConfigCommands::Get { key } => {
            let value = config_service.get(&key)?;
            println!("{}", value);
        },

        ConfigCommands::Set { key, value } => {
            config_service.set(&key, &value)?;
            println!("Set {} = {}", key, value);
        },
    }

    Ok(EXIT_SUCCESS)
}
