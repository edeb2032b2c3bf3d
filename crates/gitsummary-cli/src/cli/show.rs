use super::context::{short, RepoContext};
use super::render;
use super::{EXIT_FAILURE, EXIT_SUCCESS};
use anyhow::{Context, Result};
use clap::Args;
use gitsummary::services::Artifact;
use gitsummary::store::ArtifactStore;
use gitsummary::VcsError;
use std::path::Path;

#[derive(Args)]
pub struct ShowArgs {
    /// Commit, range, or a prefix of a commit or artifact id
    target: String,

    /// Output as JSON
    #[arg(long, conflicts_with_all = ["yaml", "brief"])]
    json: bool,

    /// Output as YAML (the stored form)
    #[arg(long, conflicts_with = "brief")]
    yaml: bool,

    /// One line per artifact
    #[arg(long)]
    brief: bool,

    /// Print a single field, e.g. category or analysis_meta.mode
    #[arg(long, conflicts_with_all = ["json", "yaml", "brief"])]
    field: Option<String>,
}

pub fn execute(repo: &Path, args: ShowArgs) -> Result<i32> {
    let ctx = RepoContext::open(repo)?;
    let commit_ids = resolve_target(&ctx, &args.target)?;

    let artifacts = ctx.store.load_batch(&commit_ids)?;
    let mut found: Vec<&Artifact> = Vec::new();
    for commit_id in &commit_ids {
        match artifacts.get(commit_id) {
            Some(artifact) => found.push(artifact),
            None => eprintln!("{}: not analyzed", short(commit_id)),
        }
    }

    if found.is_empty() {
        eprintln!("No artifacts for {}", args.target);
        return Ok(EXIT_FAILURE);
    }

    if let Some(field) = &args.field {
        for artifact in &found {
            println!("{}", field_value(artifact, field)?);
        }
    } else if args.json {
        if let [single] = found.as_slice() {
            println!("{}", serde_json::to_string_pretty(single)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
    } else if args.yaml {
        for (i, artifact) in found.iter().enumerate() {
            if i > 0 {
                println!("---");
            }
            print!("{}", serde_yaml::to_string(artifact)?);
        }
    } else if args.brief {
        for artifact in &found {
            println!("{}", render::brief(artifact));
        }
    } else {
        let blocks: Vec<String> = found.iter().map(|a| render::detail(a)).collect();
        println!("{}", blocks.join("\n"));
    }

    Ok(EXIT_SUCCESS)
}

/// Resolve a revision or range through git; when that fails for a single
/// argument, fall back to prefix lookup among stored artifacts.
fn resolve_target(ctx: &RepoContext, target: &str) -> Result<Vec<String>> {
    match ctx.resolve(target) {
        Ok(ids) => Ok(ids),
        Err(err) if is_invalid_revision(&err) && !target.contains("..") => {
            let commit_id = ctx
                .store
                .resolve_prefix(target)
                .with_context(|| {
                    format!("'{}' is neither a revision nor a stored prefix", target)
                })?;
            Ok(vec![commit_id])
        },
        Err(err) => Err(err),
    }
}

fn is_invalid_revision(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<VcsError>(),
        Some(VcsError::InvalidRevision { .. })
    )
}

/// Look up a (dotted) field of the serialized artifact.
fn field_value(artifact: &Artifact, field: &str) -> Result<String> {
    let value = serde_json::to_value(artifact)?;
    let pointer = format!("/{}", field.replace('.', "/"));
    match value.pointer(&pointer) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Null) | None => Err(anyhow::anyhow!(
            "Field '{}' is not set on {}",
            field,
            artifact.short_id()
        )),
        Some(other) => Ok(other.to_string()),
    }
}
