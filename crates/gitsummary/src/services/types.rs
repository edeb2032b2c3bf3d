use crate::error::SchemaValidationError;
use crate::vcs::{CommitDiff, CommitInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the artifact structure written to notes.
pub const SCHEMA_VERSION: &str = "0.2.0";

/// Inclusive upper bound for qualitative scores.
pub const MAX_QUALITATIVE_SCORE: u8 = 10;

/// Semantic category of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Feature,
    Fix,
    Security,
    Performance,
    Refactor,
    Chore,
}

impl Category {
    /// All categories, in report order.
    pub const ALL: [Category; 6] = [
        Category::Feature,
        Category::Fix,
        Category::Security,
        Category::Performance,
        Category::Refactor,
        Category::Chore,
    ];

    /// Heading used by rendered reports
    pub fn title(&self) -> &'static str {
        match self {
            Category::Feature => "Features",
            Category::Fix => "Fixes",
            Category::Security => "Security",
            Category::Performance => "Performance",
            Category::Refactor => "Refactoring",
            Category::Chore => "Chores",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Feature => "feature",
            Category::Fix => "fix",
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Refactor => "refactor",
            Category::Chore => "chore",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Category {
    type Err = SchemaValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feature" => Ok(Category::Feature),
            "fix" => Ok(Category::Fix),
            "security" => Ok(Category::Security),
            "performance" => Ok(Category::Performance),
            "refactor" => Ok(Category::Refactor),
            "chore" => Ok(Category::Chore),
            _ => Err(SchemaValidationError::UnknownCategory(s.to_string())),
        }
    }
}

/// Which part of the system a commit affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactScope {
    PublicApi,
    Internal,
    Dependency,
    Config,
    Docs,
    Test,
    Unknown,
}

impl ImpactScope {
    pub const ALL: [ImpactScope; 7] = [
        ImpactScope::PublicApi,
        ImpactScope::Internal,
        ImpactScope::Dependency,
        ImpactScope::Config,
        ImpactScope::Docs,
        ImpactScope::Test,
        ImpactScope::Unknown,
    ];

    /// Scopes that may legitimately carry a breaking change.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            ImpactScope::PublicApi | ImpactScope::Dependency | ImpactScope::Config
        )
    }
}

impl std::fmt::Display for ImpactScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImpactScope::PublicApi => "public_api",
            ImpactScope::Internal => "internal",
            ImpactScope::Dependency => "dependency",
            ImpactScope::Config => "config",
            ImpactScope::Docs => "docs",
            ImpactScope::Test => "test",
            ImpactScope::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ImpactScope {
    type Err = SchemaValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "public_api" => Ok(ImpactScope::PublicApi),
            "internal" => Ok(ImpactScope::Internal),
            "dependency" => Ok(ImpactScope::Dependency),
            "config" => Ok(ImpactScope::Config),
            "docs" => Ok(ImpactScope::Docs),
            "test" => Ok(ImpactScope::Test),
            "unknown" => Ok(ImpactScope::Unknown),
            _ => Err(SchemaValidationError::UnknownImpactScope(s.to_string())),
        }
    }
}

/// How the fields of an artifact were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    Heuristic,
    Llm,
    Hybrid,
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtractionMode::Heuristic => "heuristic",
            ExtractionMode::Llm => "llm",
            ExtractionMode::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ExtractionMode {
    type Err = SchemaValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(ExtractionMode::Heuristic),
            "llm" => Ok(ExtractionMode::Llm),
            "hybrid" => Ok(ExtractionMode::Hybrid),
            _ => Err(SchemaValidationError::UnknownExtractionMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Size of the extractor input, recorded for cost analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMetrics {
    pub message_chars: usize,
    pub message_lines: usize,
    pub message_tokens: usize,
    pub diff_files: usize,
    pub diff_insertions: usize,
    pub diff_deletions: usize,
    pub diff_total: usize,
    pub diff_chars: usize,
    pub diff_lines: usize,
    pub diff_tokens: usize,
}

impl InputMetrics {
    pub fn compute(commit: &CommitInfo, diff: &CommitDiff) -> Self {
        let insertions = diff.insertions();
        let deletions = diff.deletions();
        Self {
            message_chars: commit.full_message.chars().count(),
            message_lines: count_lines(&commit.full_message),
            message_tokens: estimate_tokens(&commit.full_message),
            diff_files: diff.files.len(),
            diff_insertions: insertions,
            diff_deletions: deletions,
            diff_total: insertions + deletions,
            diff_chars: diff.patch.chars().count(),
            diff_lines: count_lines(&diff.patch),
            diff_tokens: estimate_tokens(&diff.patch),
        }
    }
}

fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.lines().count()
    }
}

/// Rough token estimate: three tokens per whitespace-separated word.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count() * 3
}

/// A single 0-10 qualitative score with an optional one-line explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeSignal {
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QualitativeSignal {
    pub fn new(score: u8, explanation: impl Into<String>) -> Self {
        Self {
            score,
            explanation: Some(explanation.into()),
        }
    }
}

/// Qualitative scores. Only extractors that declare support may fill these in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_difficulty: Option<QualitativeSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creativity: Option<QualitativeSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mental_load: Option<QualitativeSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_effort: Option<QualitativeSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<QualitativeSignal>,
}

impl QualitativeScores {
    fn entries(&self) -> [(&'static str, Option<&QualitativeSignal>); 5] {
        [
            ("technical_difficulty", self.technical_difficulty.as_ref()),
            ("creativity", self.creativity.as_ref()),
            ("mental_load", self.mental_load.as_ref()),
            ("review_effort", self.review_effort.as_ref()),
            ("ambiguity", self.ambiguity.as_ref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, signal)| signal.is_none())
    }

    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        for (name, signal) in self.entries() {
            if let Some(signal) = signal {
                if signal.score > MAX_QUALITATIVE_SCORE {
                    return Err(SchemaValidationError::QualitativeScoreOutOfRange {
                        name,
                        score: signal.score,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Provenance of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub mode: ExtractionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_metrics: Option<InputMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualitative: Option<QualitativeScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl AnalysisMeta {
    pub fn new(mode: ExtractionMode) -> Self {
        Self {
            mode,
            provider: None,
            model: None,
            prompt_version: None,
            analyzed_at: Utc::now(),
            duration_ms: None,
            token_usage: None,
            input_metrics: None,
            qualitative: None,
            fallback_reason: None,
        }
    }
}

/// Unvalidated artifact fields. Turned into an [`Artifact`] by [`Artifact::from_draft`].
#[derive(Debug, Clone)]
pub struct ArtifactDraft {
    pub commit_id: String,
    pub intent_summary: String,
    pub category: Category,
    pub behavior_before: Option<String>,
    pub behavior_after: Option<String>,
    pub impact_scope: ImpactScope,
    pub is_breaking: bool,
    pub risk_explanation: Option<String>,
    pub technical_highlights: Vec<String>,
    pub confidence_score: Option<f32>,
    pub analysis_meta: AnalysisMeta,
}

impl ArtifactDraft {
    pub fn new(
        commit_id: impl Into<String>,
        intent_summary: impl Into<String>,
        category: Category,
        impact_scope: ImpactScope,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            intent_summary: intent_summary.into(),
            category,
            behavior_before: None,
            behavior_after: None,
            impact_scope,
            is_breaking: false,
            risk_explanation: None,
            technical_highlights: Vec::new(),
            confidence_score: None,
            analysis_meta: AnalysisMeta::new(ExtractionMode::Heuristic),
        }
    }
}

/// The semantic record for exactly one commit.
///
/// Fields are private so every value in circulation has passed validation;
/// values read back from storage are re-checked with [`Artifact::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    commit_id: String,
    schema_version: String,
    tool_version: String,
    intent_summary: String,
    category: Category,
    behavior_before: Option<String>,
    behavior_after: Option<String>,
    impact_scope: ImpactScope,
    is_breaking: bool,
    risk_explanation: Option<String>,
    #[serde(default)]
    technical_highlights: Vec<String>,
    confidence_score: Option<f32>,
    analysis_meta: AnalysisMeta,
}

impl Artifact {
    pub fn from_draft(draft: ArtifactDraft) -> Result<Self, SchemaValidationError> {
        let artifact = Self {
            commit_id: draft.commit_id.trim().to_lowercase(),
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: crate::TOOL_VERSION.to_string(),
            intent_summary: draft.intent_summary.trim().to_string(),
            category: draft.category,
            behavior_before: non_blank(draft.behavior_before),
            behavior_after: non_blank(draft.behavior_after),
            impact_scope: draft.impact_scope,
            is_breaking: draft.is_breaking,
            risk_explanation: non_blank(draft.risk_explanation),
            technical_highlights: draft
                .technical_highlights
                .into_iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            confidence_score: draft.confidence_score,
            analysis_meta: draft.analysis_meta,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check the hard schema rules.
    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        if !is_full_object_id(&self.commit_id) {
            return Err(SchemaValidationError::InvalidCommitId(self.commit_id.clone()));
        }
        if self.intent_summary.trim().is_empty() {
            return Err(SchemaValidationError::EmptyIntentSummary);
        }
        if let Some(score) = self.confidence_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(SchemaValidationError::ConfidenceOutOfRange(score));
            }
        }
        if let Some(qualitative) = &self.analysis_meta.qualitative {
            qualitative.validate()?;
        }
        Ok(())
    }

    /// Soft rules that well-formed output should follow but that are not enforced.
    pub fn soft_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if matches!(self.category, Category::Refactor | Category::Chore)
            && (self.behavior_before.is_some() || self.behavior_after.is_some())
        {
            warnings.push("refactor/chore artifact describes a behavior change");
        }
        if self.is_breaking && !self.impact_scope.is_external() {
            warnings.push("breaking change outside public_api, dependency or config scope");
        }
        warnings
    }

    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn intent_summary(&self) -> &str {
        &self.intent_summary
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn behavior_before(&self) -> Option<&str> {
        self.behavior_before.as_deref()
    }

    pub fn behavior_after(&self) -> Option<&str> {
        self.behavior_after.as_deref()
    }

    pub fn impact_scope(&self) -> ImpactScope {
        self.impact_scope
    }

    pub fn is_breaking(&self) -> bool {
        self.is_breaking
    }

    pub fn risk_explanation(&self) -> Option<&str> {
        self.risk_explanation.as_deref()
    }

    pub fn technical_highlights(&self) -> &[String] {
        &self.technical_highlights
    }

    pub fn confidence_score(&self) -> Option<f32> {
        self.confidence_score
    }

    pub fn analysis_meta(&self) -> &AnalysisMeta {
        &self.analysis_meta
    }

    /// Abbreviated commit id for display
    pub fn short_id(&self) -> &str {
        let end = self.commit_id.len().min(8);
        &self.commit_id[..end]
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// SHA-1 (40) or SHA-256 (64) object id in hexadecimal.
pub fn is_full_object_id(id: &str) -> bool {
    matches!(id.len(), 40 | 64) && id.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

    fn draft() -> ArtifactDraft {
        ArtifactDraft::new(
            COMMIT,
            "Guard login against missing user",
            Category::Fix,
            ImpactScope::Internal,
        )
    }

    mod category {
        use super::*;

        #[test]
        fn serializes_snake_case() {
            let json = serde_json::to_string(&Category::Performance).unwrap();
            assert_eq!(json, "\"performance\"");
        }

        #[test]
        fn from_str_round_trips_display() {
            for category in Category::ALL {
                assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
            }
        }

        #[test]
        fn from_str_is_case_insensitive() {
            assert_eq!("FIX".parse::<Category>().unwrap(), Category::Fix);
        }

        #[test]
        fn unknown_value_is_schema_error() {
            let err = "docs".parse::<Category>().unwrap_err();
            assert_eq!(err, SchemaValidationError::UnknownCategory("docs".to_string()));
        }

        #[test]
        fn unknown_value_rejected_by_serde() {
            let result: Result<Category, _> = serde_json::from_str("\"bugfix\"");
            assert!(result.is_err());
        }
    }

    mod impact_scope {
        use super::*;

        #[test]
        fn serializes_snake_case() {
            let json = serde_json::to_string(&ImpactScope::PublicApi).unwrap();
            assert_eq!(json, "\"public_api\"");
        }

        #[test]
        fn from_str_accepts_dashes() {
            assert_eq!(
                "public-api".parse::<ImpactScope>().unwrap(),
                ImpactScope::PublicApi
            );
        }

        #[test]
        fn from_str_round_trips_display() {
            for scope in ImpactScope::ALL {
                assert_eq!(scope.to_string().parse::<ImpactScope>().unwrap(), scope);
            }
        }

        #[test]
        fn external_scopes() {
            assert!(ImpactScope::PublicApi.is_external());
            assert!(ImpactScope::Dependency.is_external());
            assert!(ImpactScope::Config.is_external());
            assert!(!ImpactScope::Internal.is_external());
            assert!(!ImpactScope::Docs.is_external());
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn valid_draft_builds() {
            let artifact = Artifact::from_draft(draft()).unwrap();
            assert_eq!(artifact.commit_id(), COMMIT);
            assert_eq!(artifact.schema_version(), SCHEMA_VERSION);
            assert_eq!(artifact.tool_version(), crate::TOOL_VERSION);
            assert_eq!(artifact.short_id(), "01234567");
        }

        #[test]
        fn empty_intent_rejected() {
            let mut d = draft();
            d.intent_summary = "   ".to_string();
            assert_eq!(
                Artifact::from_draft(d).unwrap_err(),
                SchemaValidationError::EmptyIntentSummary
            );
        }

        #[test]
        fn confidence_bounds() {
            for ok in [0.0_f32, 0.5, 1.0] {
                let mut d = draft();
                d.confidence_score = Some(ok);
                assert!(Artifact::from_draft(d).is_ok());
            }
            for bad in [-0.1_f32, 1.01, f32::NAN] {
                let mut d = draft();
                d.confidence_score = Some(bad);
                assert!(matches!(
                    Artifact::from_draft(d),
                    Err(SchemaValidationError::ConfidenceOutOfRange(_))
                ));
            }
        }

        #[test]
        fn qualitative_score_above_ten_rejected() {
            let mut d = draft();
            d.analysis_meta.qualitative = Some(QualitativeScores {
                creativity: Some(QualitativeSignal::new(11, "too high")),
                ..Default::default()
            });
            assert_eq!(
                Artifact::from_draft(d).unwrap_err(),
                SchemaValidationError::QualitativeScoreOutOfRange {
                    name: "creativity",
                    score: 11
                }
            );
        }

        #[test]
        fn abbreviated_commit_id_rejected() {
            let mut d = draft();
            d.commit_id = "0123456".to_string();
            assert!(matches!(
                Artifact::from_draft(d),
                Err(SchemaValidationError::InvalidCommitId(_))
            ));
        }

        #[test]
        fn blank_optionals_and_highlights_are_dropped() {
            let mut d = draft();
            d.behavior_before = Some("  ".to_string());
            d.technical_highlights = vec!["".to_string(), " Added guard ".to_string()];
            let artifact = Artifact::from_draft(d).unwrap();
            assert!(artifact.behavior_before().is_none());
            assert_eq!(artifact.technical_highlights(), ["Added guard".to_string()]);
        }
    }

    mod soft_rules {
        use super::*;

        #[test]
        fn refactor_with_behavior_warns() {
            let mut d = draft();
            d.category = Category::Refactor;
            d.behavior_after = Some("does something else".to_string());
            let artifact = Artifact::from_draft(d).unwrap();
            assert_eq!(artifact.soft_warnings().len(), 1);
        }

        #[test]
        fn internal_breaking_change_warns_but_builds() {
            let mut d = draft();
            d.is_breaking = true;
            let artifact = Artifact::from_draft(d).unwrap();
            assert!(artifact.is_breaking());
            assert_eq!(artifact.soft_warnings().len(), 1);
        }

        #[test]
        fn well_formed_artifact_has_no_warnings() {
            let artifact = Artifact::from_draft(draft()).unwrap();
            assert!(artifact.soft_warnings().is_empty());
        }
    }

    mod metrics {
        use super::*;
        use crate::vcs::{FileChange, FileStatus};

        #[test]
        fn token_estimate_is_three_per_word() {
            assert_eq!(estimate_tokens("fix the login bug"), 12);
            assert_eq!(estimate_tokens(""), 0);
        }

        #[test]
        fn input_metrics_cover_message_and_diff() {
            let commit = CommitInfo {
                commit_id: COMMIT.to_string(),
                short_id: "0123456".to_string(),
                author_name: "Test".to_string(),
                author_email: "t@example.com".to_string(),
                timestamp: Utc::now(),
                summary_line: "fix: null check".to_string(),
                full_message: "fix: null check\n\nbody".to_string(),
                parent_ids: vec![],
            };
            let diff = CommitDiff {
                files: vec![FileChange {
                    path: "auth.py".to_string(),
                    old_path: None,
                    status: FileStatus::Modified,
                    insertions: 2,
                    deletions: 1,
                }],
                patch: "+a\n+b\n-c\n".to_string(),
            };

            let metrics = InputMetrics::compute(&commit, &diff);
            assert_eq!(metrics.message_lines, 3);
            assert_eq!(metrics.message_tokens, 12);
            assert_eq!(metrics.diff_files, 1);
            assert_eq!(metrics.diff_total, 3);
            assert_eq!(metrics.diff_lines, 3);
        }

        #[test]
        fn token_usage_total_saturates() {
            let usage = TokenUsage {
                input_tokens: u32::MAX,
                output_tokens: 1,
            };
            assert_eq!(usage.total(), u32::MAX);
        }
    }

    mod serialization {
        use super::*;

        #[test]
        fn yaml_round_trip_is_field_for_field() {
            let mut d = draft();
            d.behavior_before = Some("crash on null user".to_string());
            d.behavior_after = Some("returns early".to_string());
            d.technical_highlights = vec!["Added null guard".to_string()];
            d.confidence_score = Some(0.85);
            d.analysis_meta.qualitative = Some(QualitativeScores {
                review_effort: Some(QualitativeSignal::new(2, "small change")),
                ..Default::default()
            });
            d.analysis_meta.token_usage = Some(TokenUsage {
                input_tokens: 120,
                output_tokens: 40,
            });
            let artifact = Artifact::from_draft(d).unwrap();

            let yaml = serde_yaml::to_string(&artifact).unwrap();
            let back: Artifact = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(back, artifact);
        }

        #[test]
        fn optional_meta_fields_are_omitted() {
            let artifact = Artifact::from_draft(draft()).unwrap();
            let yaml = serde_yaml::to_string(&artifact).unwrap();
            assert!(!yaml.contains("fallback_reason"));
            assert!(yaml.contains("behavior_before: null"));
        }
    }
}
