use super::{ExtractionResult, Extractor, ExtractorKind};
use crate::error::ExtractionError;
use crate::services::types::{Category, ImpactScope};
use crate::vcs::{CommitDiff, CommitInfo};
use regex::Regex;
use std::sync::LazyLock;

const MAX_HIGHLIGHTS: usize = 5;

static CONVENTIONAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<kind>[A-Za-z]+)(?:\([^)]*\))?!?:")
        .expect("valid conventional commit regex")
});
static ADDED_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^\+\s*(?:pub(?:\([^)]*\))?\s+)?",
        r"(def|class|function|async function|fn|struct|enum|trait)\s+(\w+)",
    ))
    .expect("valid added symbol regex")
});
static REMOVED_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^-\s*(?:pub(?:\([^)]*\))?\s+)?",
        r"(def|class|function|fn|struct|enum|trait)\s+(\w+)",
    ))
        .expect("valid removed symbol regex")
});
static ERROR_HANDLING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\+.*\b(try|catch|except|raise|throw)\b").expect("valid error handling regex")
});
static TESTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\+.*(\btest_|\bdescribe\(|\bit\(|\bpytest\b|#\[test\]|#\[tokio::test\])")
        .expect("valid test regex")
});
static LOGGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\+.*\b(logger\.|logging\.|console\.log|tracing::|log::)")
        .expect("valid logging regex")
});

const DOC_EXTENSIONS: &[&str] = &[".md", ".rst", ".txt", ".adoc"];
const DEPENDENCY_FILES: &[&str] = &[
    "requirements.txt",
    "pyproject.toml",
    "package.json",
    "go.mod",
    "cargo.toml",
    "cargo.lock",
    "gemfile",
    "pom.xml",
];
const CONFIG_PATTERNS: &[&str] = &[
    ".env",
    "config",
    ".yaml",
    ".yml",
    ".json",
    ".toml",
    "dockerfile",
    "docker-compose",
];
const PUBLIC_API_KEYWORDS: &[&str] = &["public api", "breaking", "endpoint", "interface", "export"];

/// Rule-based extractor driven by commit message conventions and file paths.
///
/// Never needs network access, so it is the usual last entry in the
/// extractor list. It does not produce qualitative scores or a confidence.
#[derive(Debug, Default, Clone)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    fn infer_category(&self, commit: &CommitInfo) -> Category {
        let summary = commit.summary_line.to_lowercase();

        if let Some(caps) = CONVENTIONAL_PREFIX.captures(&summary) {
            let category = match &caps["kind"] {
                "fix" | "bugfix" | "hotfix" => Some(Category::Fix),
                "feat" | "feature" => Some(Category::Feature),
                "perf" => Some(Category::Performance),
                "refactor" => Some(Category::Refactor),
                "security" | "sec" => Some(Category::Security),
                "chore" | "build" | "ci" | "docs" | "style" | "test" | "tests" => {
                    Some(Category::Chore)
                },
                _ => None,
            };
            if let Some(category) = category {
                return category;
            }
        }

        // Plain summaries that still lead with a type word
        for (prefix, category) in [
            ("fix", Category::Fix),
            ("feat", Category::Feature),
            ("perf", Category::Performance),
            ("refactor", Category::Refactor),
        ] {
            if summary.starts_with(prefix) {
                return category;
            }
        }

        let text = format!("{} {}", summary, commit.body().to_lowercase());
        let keyword_rules: [(&[&str], Category); 5] = [
            (&["security", "vulnerability", "cve", "exploit"], Category::Security),
            (&["performance", "optimize", "speed", "faster"], Category::Performance),
            (&["fix", "bug", "issue", "error", "crash"], Category::Fix),
            (&["refactor", "cleanup", "restructure"], Category::Refactor),
            (&["add", "feature", "implement", "new"], Category::Feature),
        ];
        keyword_rules
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|kw| text.contains(kw)))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Chore)
    }

    fn infer_impact_scope(&self, commit: &CommitInfo, diff: &CommitDiff) -> ImpactScope {
        let paths: Vec<String> = diff.files.iter().map(|f| f.path.to_lowercase()).collect();

        if all_paths(&paths, |p| {
            DOC_EXTENSIONS.iter().any(|ext| p.ends_with(ext))
                || p.contains("doc")
                || p.contains("readme")
        }) {
            return ImpactScope::Docs;
        }

        if all_paths(&paths, |p| p.contains("test")) {
            return ImpactScope::Test;
        }

        if paths
            .iter()
            .any(|p| DEPENDENCY_FILES.iter().any(|dep| p.ends_with(dep)))
        {
            return ImpactScope::Dependency;
        }

        if all_paths(&paths, |p| CONFIG_PATTERNS.iter().any(|pat| p.contains(pat))) {
            return ImpactScope::Config;
        }

        let text = format!(
            "{} {} {}",
            commit.summary_line,
            commit.body(),
            diff.patch
        )
        .to_lowercase();
        if PUBLIC_API_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return ImpactScope::PublicApi;
        }

        ImpactScope::Internal
    }

    fn detect_breaking(&self, commit: &CommitInfo) -> bool {
        let text = format!("{} {}", commit.summary_line, commit.body()).to_lowercase();

        if text.contains("breaking") {
            return true;
        }

        if let Some((prefix, _)) = commit.summary_line.split_once(':') {
            if prefix.contains('!') {
                return true;
            }
        }

        let removal = ["removed", "deprecated"].iter().any(|kw| text.contains(kw));
        let api = ["api", "export", "interface", "endpoint"]
            .iter()
            .any(|kw| text.contains(kw));
        removal && api
    }

    fn technical_highlights(&self, patch: &str) -> Vec<String> {
        let mut highlights = Vec::new();
        if patch.is_empty() {
            return highlights;
        }

        highlights.extend(
            ADDED_SYMBOL
                .captures_iter(patch)
                .take(3)
                .map(|caps| format!("Added {} `{}`", &caps[1], &caps[2])),
        );
        highlights.extend(
            REMOVED_SYMBOL
                .captures_iter(patch)
                .take(2)
                .map(|caps| format!("Removed {} `{}`", &caps[1], &caps[2])),
        );

        if ERROR_HANDLING.is_match(patch) {
            highlights.push("Added error handling".to_string());
        }
        if TESTS.is_match(patch) {
            highlights.push("Added tests".to_string());
        }
        if LOGGING.is_match(patch) {
            highlights.push("Added logging".to_string());
        }

        highlights.truncate(MAX_HIGHLIGHTS);
        highlights
    }
}

/// True when there is at least one path and every path matches.
fn all_paths(paths: &[String], pred: impl Fn(&str) -> bool) -> bool {
    !paths.is_empty() && paths.iter().all(|p| pred(p))
}

#[async_trait::async_trait]
impl Extractor for HeuristicExtractor {
    async fn extract(
        &self,
        commit: &CommitInfo,
        diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError> {
        let is_breaking = self.detect_breaking(commit);
        let highlights = self.technical_highlights(&diff.patch);
        let summary = commit.summary_line.trim();

        Ok(ExtractionResult {
            intent_summary: (!summary.is_empty()).then(|| summary.to_string()),
            category: Some(self.infer_category(commit)),
            impact_scope: Some(self.infer_impact_scope(commit, diff)),
            is_breaking: Some(is_breaking),
            risk_explanation: is_breaking
                .then(|| "Commit message marks this change as breaking".to_string()),
            technical_highlights: (!highlights.is_empty()).then_some(highlights),
            provider: Some("heuristic".to_string()),
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Heuristic
    }
}
