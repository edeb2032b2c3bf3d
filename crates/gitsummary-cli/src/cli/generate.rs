use super::context::RepoContext;
use super::render;
use super::EXIT_SUCCESS;
use anyhow::Result;
use clap::{Args, Subcommand};
use gitsummary::services::{build_changelog, build_impact, build_release_notes};
use gitsummary::store::ArtifactStore;
use std::path::Path;
use tracing::info;

#[derive(Args)]
pub struct GenerateArgs {
    #[command(subcommand)]
    report: ReportKind,
}

#[derive(Args)]
struct ReportArgs {
    /// Commit range, e.g. v1.0..v1.1
    range: String,

    /// List commits that have no artifact
    #[arg(long)]
    include_unanalyzed: bool,

    /// Output report data as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ReportKind {
    /// Changes grouped by category
    Changelog(ReportArgs),

    /// User-facing vs internal changes
    ReleaseNotes(ReportArgs),

    /// Impact scope distribution, breaking changes and highlights
    Impact(ReportArgs),
}

pub fn execute(repo: &Path, args: GenerateArgs) -> Result<i32> {
    let ctx = RepoContext::open(repo)?;

    let (kind, report_args) = match &args.report {
        ReportKind::Changelog(a) => ("changelog", a),
        ReportKind::ReleaseNotes(a) => ("release-notes", a),
        ReportKind::Impact(a) => ("impact", a),
    };
    let commit_ids = ctx.resolve(&report_args.range)?;
    let artifacts = ctx.store.load_batch(&commit_ids)?;
    info!(
        report = kind,
        commits = commit_ids.len(),
        analyzed = artifacts.len(),
        "Building report"
    );
    let include = report_args.include_unanalyzed;

    let output = match &args.report {
        ReportKind::Changelog(a) => {
            let report = build_changelog(&commit_ids, &artifacts, include);
            if a.json {
                serde_json::to_string_pretty(&report)?
            } else {
                render::changelog(&report)
            }
        },
        ReportKind::ReleaseNotes(a) => {
            let report = build_release_notes(&commit_ids, &artifacts, include);
            if a.json {
                serde_json::to_string_pretty(&report)?
            } else {
                render::release_notes(&report)
            }
        },
        ReportKind::Impact(a) => {
            let report = build_impact(&commit_ids, &artifacts, include);
            if a.json {
                serde_json::to_string_pretty(&report)?
            } else {
                render::impact(&report)
            }
        },
    };
    println!("{}", output.trim_end());

    Ok(EXIT_SUCCESS)
}
