use super::context::{short, RepoContext};
use super::{EXIT_FAILURE, EXIT_SUCCESS};
use anyhow::{Context, Result};
use clap::Args;
use gitsummary::services::{AnalyzeOptions, AnalyzerService, ExtractionPipeline};
use std::path::Path;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Commit or range, e.g. HEAD, v1.0..HEAD
    range: String,

    /// Overwrite existing artifacts
    #[arg(long)]
    force: bool,

    /// Re-run extraction for commits that already have an artifact
    #[arg(long)]
    reanalyze_existing: bool,

    /// Extract without writing notes
    #[arg(long)]
    dry_run: bool,

    /// Print extracted artifacts as JSON (implies --dry-run)
    #[arg(long)]
    json: bool,

    /// Ignore configured LLM providers and use the heuristic extractor only
    #[arg(long)]
    heuristic_only: bool,
}

pub async fn execute(repo: &Path, args: AnalyzeArgs) -> Result<i32> {
    let mut ctx = RepoContext::open(repo)?;
    if args.heuristic_only {
        ctx.config.analysis.extractors = vec!["heuristic".to_string()];
    }

    let pipeline = ExtractionPipeline::from_config(&ctx.config)
        .context("Failed to set up extractors")?;
    let analyzer = AnalyzerService::new(ctx.vcs.clone(), ctx.store.clone(), pipeline);

    let options = AnalyzeOptions {
        force: args.force,
        reanalyze_existing: args.reanalyze_existing,
        dry_run: args.dry_run || args.json,
    };
    let result = analyzer.analyze_range(&args.range, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.previews)?);
    } else {
        for artifact in &result.previews {
            println!(
                "would store  {}  [{}] {}",
                artifact.short_id(),
                artifact.category(),
                artifact.intent_summary()
            );
        }
        for commit_id in &result.analyzed {
            println!("analyzed  {}", short(commit_id));
        }
        for skipped in &result.skipped {
            println!("skipped   {}  ({})", short(&skipped.commit_id), skipped.reason);
        }
        for failed in &result.failed {
            println!(
                "failed    {}  {}: {}",
                short(&failed.commit_id),
                failed.kind,
                failed.message
            );
        }

        if result.total() == 0 {
            println!("No commits in {}", args.range);
        } else {
            println!(
                "\n{} analyzed, {} previewed, {} skipped, {} failed",
                result.analyzed.len(),
                result.previews.len(),
                result.skipped.len(),
                result.failed.len()
            );
        }
    }

    Ok(if result.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}
