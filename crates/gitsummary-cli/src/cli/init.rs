use super::EXIT_SUCCESS;
use anyhow::Result;
use clap::Args;
use gitsummary::services::ConfigService;
use gitsummary::vcs::GitRepository;
use std::path::Path;

#[derive(Args)]
pub struct InitArgs {
    /// Extractor order, highest priority first (e.g. openai,heuristic)
    #[arg(long, value_delimiter = ',')]
    extractors: Option<Vec<String>>,

    /// Overwrite an existing config file
    #[arg(long)]
    force: bool,
}

pub fn execute(repo: &Path, args: InitArgs) -> Result<i32> {
    let root = GitRepository::discover(repo)?.root().to_path_buf();
    let config_service = ConfigService::new(&root);

    if config_service.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "{} already exists. Use --force to overwrite.",
            config_service.path().display()
        ));
    }

    let config = config_service.init(args.extractors)?;

    println!("Initialized gitsummary at {}", root.display());
    println!("  Config: {}", config_service.path().display());
    println!("  Notes ref: {}", config.storage.notes_ref);
    println!("  Extractors: {}", config.analysis.extractors.join(", "));

    Ok(EXIT_SUCCESS)
}
