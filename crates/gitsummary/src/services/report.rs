//! Aggregations over stored artifacts. Pure functions; rendering is left to callers.

use super::types::{Artifact, Category, ImpactScope};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub commit_id: String,
    pub artifact: Artifact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub category: Category,
    pub entries: Vec<ReportEntry>,
}

/// Commits grouped by category, plus the breaking subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangelogReport {
    pub total_commits: usize,
    pub analyzed: usize,
    /// Non-empty groups in [`Category::ALL`] order
    pub groups: Vec<CategoryGroup>,
    pub breaking: Vec<ReportEntry>,
    /// Commits without an artifact; only filled when requested
    pub unanalyzed: Vec<String>,
}

/// Changes split by audience
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseNotesReport {
    pub total_commits: usize,
    pub user_facing: Vec<ReportEntry>,
    pub internal: Vec<ReportEntry>,
    pub breaking: Vec<ReportEntry>,
    pub unanalyzed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeCount {
    pub scope: ImpactScope,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub commit_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub total_commits: usize,
    pub analyzed: usize,
    pub scopes: Vec<ScopeCount>,
    pub breaking: Vec<ReportEntry>,
    pub highlights: Vec<Highlight>,
    pub unanalyzed: Vec<String>,
}

/// Artifacts in `commit_ids` order, with the ids that have none.
fn partition(
    commit_ids: &[String],
    artifacts: &HashMap<String, Artifact>,
) -> (Vec<ReportEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut missing = Vec::new();
    for commit_id in commit_ids {
        match artifacts.get(commit_id) {
            Some(artifact) => entries.push(ReportEntry {
                commit_id: commit_id.clone(),
                artifact: artifact.clone(),
            }),
            None => missing.push(commit_id.clone()),
        }
    }
    (entries, missing)
}

fn breaking_of(entries: &[ReportEntry]) -> Vec<ReportEntry> {
    entries
        .iter()
        .filter(|e| e.artifact.is_breaking())
        .cloned()
        .collect()
}

pub fn build_changelog(
    commit_ids: &[String],
    artifacts: &HashMap<String, Artifact>,
    include_unanalyzed: bool,
) -> ChangelogReport {
    let (entries, missing) = partition(commit_ids, artifacts);

    let groups: Vec<CategoryGroup> = Category::ALL
        .iter()
        .map(|category| CategoryGroup {
            category: *category,
            entries: entries
                .iter()
                .filter(|e| e.artifact.category() == *category)
                .cloned()
                .collect(),
        })
        .filter(|g| !g.entries.is_empty())
        .collect();

    ChangelogReport {
        total_commits: commit_ids.len(),
        analyzed: entries.len(),
        groups,
        breaking: breaking_of(&entries),
        unanalyzed: if include_unanalyzed { missing } else { Vec::new() },
    }
}

/// Whether a change is worth telling end users about.
pub fn is_user_facing(artifact: &Artifact) -> bool {
    match artifact.impact_scope() {
        ImpactScope::PublicApi | ImpactScope::Config => true,
        ImpactScope::Test | ImpactScope::Docs => false,
        _ => matches!(
            artifact.category(),
            Category::Feature | Category::Fix | Category::Security | Category::Performance
        ),
    }
}

pub fn build_release_notes(
    commit_ids: &[String],
    artifacts: &HashMap<String, Artifact>,
    include_unanalyzed: bool,
) -> ReleaseNotesReport {
    let (entries, missing) = partition(commit_ids, artifacts);
    let breaking = breaking_of(&entries);
    let (user_facing, internal): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.artifact.is_breaking() || is_user_facing(&e.artifact));

    ReleaseNotesReport {
        total_commits: commit_ids.len(),
        user_facing,
        internal,
        breaking,
        unanalyzed: if include_unanalyzed { missing } else { Vec::new() },
    }
}

pub fn build_impact(
    commit_ids: &[String],
    artifacts: &HashMap<String, Artifact>,
    include_unanalyzed: bool,
) -> ImpactReport {
    let (entries, missing) = partition(commit_ids, artifacts);

    let scopes: Vec<ScopeCount> = ImpactScope::ALL
        .iter()
        .map(|scope| ScopeCount {
            scope: *scope,
            count: entries
                .iter()
                .filter(|e| e.artifact.impact_scope() == *scope)
                .count(),
        })
        .filter(|s| s.count > 0)
        .collect();

    let highlights: Vec<Highlight> = entries
        .iter()
        .flat_map(|e| {
            e.artifact
                .technical_highlights()
                .iter()
                .map(move |h| Highlight {
                    commit_id: e.commit_id.clone(),
                    text: h.clone(),
                })
        })
        .collect();

    ImpactReport {
        total_commits: commit_ids.len(),
        analyzed: entries.len(),
        scopes,
        breaking: breaking_of(&entries),
        highlights,
        unanalyzed: if include_unanalyzed { missing } else { Vec::new() },
    }
}
