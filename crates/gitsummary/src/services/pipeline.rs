use super::config::ProjectConfig;
use super::types::{
    AnalysisMeta, Artifact, ArtifactDraft, Category, ExtractionMode, ImpactScope, InputMetrics,
};
use crate::error::ExtractionError;
use crate::extract::{create_extractors, ExtractionResult, Extractor, ExtractorKind};
use crate::vcs::{CommitDiff, CommitInfo};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Intent recorded when neither an extractor nor the subject line supplies one
pub const EMPTY_MESSAGE_INTENT: &str = "(no commit message)";

/// Turns a commit and its diff into a validated [`Artifact`].
///
/// Extractors run in priority order. A lower-priority result only fills
/// fields that are still unset; priority is purely positional. A failing or
/// timed-out extractor is skipped and its error is kept as the fallback
/// reason. Only when every extractor fails does the commit fail.
pub struct ExtractionPipeline {
    extractors: Vec<Arc<dyn Extractor>>,
    timeout: Duration,
}

impl ExtractionPipeline {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>, timeout: Duration) -> Self {
        Self {
            extractors,
            timeout,
        }
    }

    /// Build the extractors named in `analysis.extractors`.
    pub fn from_config(config: &ProjectConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            create_extractors(config)?,
            Duration::from_secs(config.analysis.timeout_secs),
        ))
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub async fn run(
        &self,
        commit: &CommitInfo,
        diff: &CommitDiff,
    ) -> Result<Artifact, ExtractionError> {
        let started = Instant::now();
        let mut merged = ExtractionResult::default();
        let mut reasons = Vec::new();
        let mut used_heuristic = false;
        let mut used_llm = false;

        for extractor in &self.extractors {
            let name = extractor.name();
            let attempt = tokio::time::timeout(self.timeout, extractor.extract(commit, diff));
            let outcome = match attempt.await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExtractionError::Timeout {
                    extractor: name.to_string(),
                    secs: self.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(mut result) => {
                    if !extractor.supports_qualitative() {
                        result.qualitative = None;
                    }
                    match extractor.kind() {
                        ExtractorKind::Heuristic => used_heuristic = true,
                        ExtractorKind::Llm => used_llm = true,
                    }
                    debug!(commit = %commit.short_id, extractor = name, "Extractor succeeded");
                    merged.fill_from(result);
                },
                Err(e) => {
                    warn!(
                        commit = %commit.short_id,
                        extractor = name,
                        error = %e,
                        "Extractor failed, falling back"
                    );
                    reasons.push(e.to_string());
                },
            }
        }

        if !used_heuristic && !used_llm {
            return Err(ExtractionError::AllFailed {
                commit_id: commit.commit_id.clone(),
                reasons,
            });
        }

        let mode = match (used_llm, used_heuristic) {
            (true, true) => ExtractionMode::Hybrid,
            (true, false) => ExtractionMode::Llm,
            _ => ExtractionMode::Heuristic,
        };

        let mut meta = AnalysisMeta::new(mode);
        meta.provider = merged.provider;
        meta.model = merged.model;
        meta.prompt_version = merged.prompt_version;
        meta.token_usage = merged.token_usage;
        meta.input_metrics = Some(InputMetrics::compute(commit, diff));
        meta.qualitative = merged.qualitative.filter(|q| !q.is_empty());
        meta.fallback_reason = (!reasons.is_empty()).then(|| reasons.join("; "));
        meta.duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));

        let draft = ArtifactDraft {
            commit_id: commit.commit_id.clone(),
            intent_summary: merged
                .intent_summary
                .unwrap_or_else(|| default_intent(commit)),
            category: merged.category.unwrap_or(Category::Chore),
            behavior_before: merged.behavior_before,
            behavior_after: merged.behavior_after,
            impact_scope: merged.impact_scope.unwrap_or(ImpactScope::Unknown),
            is_breaking: merged.is_breaking.unwrap_or(false),
            risk_explanation: merged.risk_explanation,
            technical_highlights: merged.technical_highlights.unwrap_or_default(),
            confidence_score: merged.confidence_score,
            analysis_meta: meta,
        };

        let artifact = Artifact::from_draft(draft).map_err(|source| ExtractionError::Schema {
            commit_id: commit.commit_id.clone(),
            source,
        })?;

        for warning in artifact.soft_warnings() {
            debug!(commit = %commit.short_id, "{}", warning);
        }

        Ok(artifact)
    }
}

fn default_intent(commit: &CommitInfo) -> String {
    match commit.summary_line.trim() {
        "" => EMPTY_MESSAGE_INTENT.to_string(),
        subject => subject.to_string(),
    }
}
