use super::context::{short, RepoContext};
use super::{EXIT_FAILURE, EXIT_SUCCESS};
use anyhow::Result;
use clap::Args;
use gitsummary::store::ArtifactStore;
use gitsummary::vcs::VcsReader;
use serde::Serialize;
use std::path::Path;

#[derive(Args)]
pub struct ListArgs {
    /// Commit or range, e.g. v1.0..HEAD
    range: String,

    /// Only commits that have an artifact
    #[arg(long, conflicts_with = "missing")]
    analyzed: bool,

    /// Only commits without an artifact
    #[arg(long)]
    missing: bool,

    /// Print only the number of matching commits
    #[arg(long)]
    count: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ListEntry {
    commit_id: String,
    analyzed: bool,
    summary: String,
}

pub fn execute(repo: &Path, args: ListArgs) -> Result<i32> {
    let ctx = RepoContext::open(repo)?;
    let commit_ids = ctx.resolve(&args.range)?;

    let status: Vec<(String, bool)> = ctx
        .store
        .list_analyzed(&commit_ids)?
        .into_iter()
        .filter(|(_, analyzed)| {
            if args.analyzed {
                *analyzed
            } else if args.missing {
                !*analyzed
            } else {
                true
            }
        })
        .collect();

    if args.count {
        println!("{}", status.len());
        return Ok(EXIT_SUCCESS);
    }

    let mut entries = Vec::with_capacity(status.len());
    for (commit_id, analyzed) in status {
        let summary = ctx.vcs.commit_info(&commit_id)?.summary_line;
        entries.push(ListEntry {
            commit_id,
            analyzed,
            summary,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No matching commits in {}", args.range);
    } else {
        for entry in &entries {
            let mark = if entry.analyzed { "analyzed" } else { "missing " };
            println!("{}  {}  {}", short(&entry.commit_id), mark, entry.summary);
        }
    }

    Ok(if entries.is_empty() {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    })
}
