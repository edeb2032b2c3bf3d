//! Plain-text and markdown rendering of artifacts and reports.

use gitsummary::services::report::{Highlight, ReportEntry};
use gitsummary::services::{Artifact, ChangelogReport, ImpactReport, ReleaseNotesReport};
use std::fmt::Write;

/// `<short> [category] intent`, with a marker for breaking changes
pub fn brief(artifact: &Artifact) -> String {
    let breaking = if artifact.is_breaking() { " (BREAKING)" } else { "" };
    format!(
        "{} [{}] {}{}",
        artifact.short_id(),
        artifact.category(),
        artifact.intent_summary(),
        breaking
    )
}

/// Multi-line human view of one artifact
pub fn detail(artifact: &Artifact) -> String {
    let mut out = String::new();
    let meta = artifact.analysis_meta();
    let _ = writeln!(out, "commit    {}", artifact.commit_id());
    let _ = writeln!(out, "intent    {}", artifact.intent_summary());
    let _ = writeln!(out, "category  {}", artifact.category());
    let _ = writeln!(out, "impact    {}", artifact.impact_scope());
    let _ = writeln!(out, "breaking  {}", if artifact.is_breaking() { "yes" } else { "no" });
    if let Some(before) = artifact.behavior_before() {
        let _ = writeln!(out, "before    {}", before);
    }
    if let Some(after) = artifact.behavior_after() {
        let _ = writeln!(out, "after     {}", after);
    }
    if let Some(risk) = artifact.risk_explanation() {
        let _ = writeln!(out, "risk      {}", risk);
    }
    if let Some(confidence) = artifact.confidence_score() {
        let _ = writeln!(out, "confidence {:.2}", confidence);
    }
    for highlight in artifact.technical_highlights() {
        let _ = writeln!(out, "  - {}", highlight);
    }
    let mut source = meta.mode.to_string();
    if let Some(model) = &meta.model {
        let _ = write!(source, " ({})", model);
    }
    let _ = writeln!(out, "analysis  {} at {}", source, meta.analyzed_at.to_rfc3339());
    if let Some(reason) = &meta.fallback_reason {
        let _ = writeln!(out, "fallback  {}", reason);
    }
    out
}

fn entry_line(out: &mut String, entry: &ReportEntry) {
    let _ = writeln!(out, "- {}", brief(&entry.artifact));
}

fn unanalyzed_section(out: &mut String, unanalyzed: &[String]) {
    if unanalyzed.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n## Not analyzed\n");
    for commit_id in unanalyzed {
        let _ = writeln!(out, "- {}", super::context::short(commit_id));
    }
}

pub fn changelog(report: &ChangelogReport) -> String {
    let mut out = String::from("# Changelog\n");
    if !report.breaking.is_empty() {
        let _ = writeln!(out, "\n## Breaking changes\n");
        for entry in &report.breaking {
            entry_line(&mut out, entry);
        }
    }
    for group in &report.groups {
        let _ = writeln!(out, "\n## {}\n", group.category.title());
        for entry in &group.entries {
            entry_line(&mut out, entry);
        }
    }
    unanalyzed_section(&mut out, &report.unanalyzed);
    let _ = writeln!(
        out,
        "\n_{} of {} commits analyzed_",
        report.analyzed, report.total_commits
    );
    out
}

pub fn release_notes(report: &ReleaseNotesReport) -> String {
    let mut out = String::from("# Release notes\n");
    if !report.breaking.is_empty() {
        let _ = writeln!(out, "\n## Breaking changes\n");
        for entry in &report.breaking {
            let _ = writeln!(out, "- {}", entry.artifact.intent_summary());
            if let Some(risk) = entry.artifact.risk_explanation() {
                let _ = writeln!(out, "  {}", risk);
            }
        }
    }
    if !report.user_facing.is_empty() {
        let _ = writeln!(out, "\n## What's new\n");
        for entry in &report.user_facing {
            let after = entry.artifact.behavior_after().unwrap_or_default();
            if after.is_empty() {
                let _ = writeln!(out, "- {}", entry.artifact.intent_summary());
            } else {
                let _ = writeln!(out, "- {}: {}", entry.artifact.intent_summary(), after);
            }
        }
    }
    if !report.internal.is_empty() {
        let _ = writeln!(out, "\n## Internal\n");
        for entry in &report.internal {
            entry_line(&mut out, entry);
        }
    }
    unanalyzed_section(&mut out, &report.unanalyzed);
    out
}

fn highlight_line(out: &mut String, highlight: &Highlight) {
    let _ = writeln!(
        out,
        "- {}: {}",
        super::context::short(&highlight.commit_id),
        highlight.text
    );
}

pub fn impact(report: &ImpactReport) -> String {
    let mut out = String::from("# Impact\n");
    let _ = writeln!(out, "\n## Scopes\n");
    for scope in &report.scopes {
        let _ = writeln!(out, "- {}: {}", scope.scope, scope.count);
    }
    if !report.breaking.is_empty() {
        let _ = writeln!(out, "\n## Breaking changes\n");
        for entry in &report.breaking {
            entry_line(&mut out, entry);
        }
    }
    if !report.highlights.is_empty() {
        let _ = writeln!(out, "\n## Technical highlights\n");
        for highlight in &report.highlights {
            highlight_line(&mut out, highlight);
        }
    }
    unanalyzed_section(&mut out, &report.unanalyzed);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsummary::services::{build_changelog, ArtifactDraft, Category, ImpactScope};
    use std::collections::HashMap;

    fn artifact(id: &str, intent: &str, category: Category, breaking: bool) -> Artifact {
        let mut draft = ArtifactDraft::new(id, intent, category, ImpactScope::Internal);
        draft.is_breaking = breaking;
        Artifact::from_draft(draft).unwrap()
    }

    #[test]
    fn brief_marks_breaking() {
        let a = artifact(&"ab".repeat(20), "Drop v1 routes", Category::Feature, true);
        assert_eq!(brief(&a), "abababab [feature] Drop v1 routes (BREAKING)");
    }

    #[test]
    fn changelog_lists_groups_and_missing() {
        let ids = vec!["aa".repeat(20), "bb".repeat(20)];
        let artifacts = HashMap::from([(
            ids[0].clone(),
            artifact(&ids[0], "Guard null user", Category::Fix, false),
        )]);
        let text = changelog(&build_changelog(&ids, &artifacts, true));

        assert!(text.contains("## Fixes"));
        assert!(text.contains("Guard null user"));
        assert!(text.contains("## Not analyzed\n\n- bbbbbbbb"));
        assert!(text.contains("_1 of 2 commits analyzed_"));
        assert!(!text.contains("Breaking"));
    }
}
