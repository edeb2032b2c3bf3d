//! Extractors derive (partial) artifact fields from a commit and its diff.
//!
//! The [`ExtractionPipeline`](crate::services::pipeline::ExtractionPipeline)
//! runs the configured extractors in priority order and merges their results.

pub mod anthropic;
pub mod heuristic;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod prompt;

pub use anthropic::AnthropicExtractor;
pub use heuristic::HeuristicExtractor;
pub use http::RetryPolicy;
pub use ollama::OllamaExtractor;
pub use openai::OpenAiExtractor;

use crate::error::ExtractionError;
use crate::services::config::ProjectConfig;
use crate::services::types::{Category, ImpactScope, QualitativeScores, TokenUsage};
use crate::vcs::{CommitDiff, CommitInfo};
use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

/// Broad family an extractor belongs to; decides the recorded extraction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Heuristic,
    Llm,
}

/// Partial artifact produced by one extractor. Unset fields are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub intent_summary: Option<String>,
    pub category: Option<Category>,
    pub behavior_before: Option<String>,
    pub behavior_after: Option<String>,
    pub impact_scope: Option<ImpactScope>,
    pub is_breaking: Option<bool>,
    pub risk_explanation: Option<String>,
    pub technical_highlights: Option<Vec<String>>,
    pub confidence_score: Option<f32>,
    pub qualitative: Option<QualitativeScores>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt_version: Option<String>,
    pub token_usage: Option<TokenUsage>,
}

impl ExtractionResult {
    /// Fill every field still unset on `self` from a lower-priority result.
    /// Fields already set are never replaced.
    pub fn fill_from(&mut self, lower: ExtractionResult) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.intent_summary, lower.intent_summary);
        fill(&mut self.category, lower.category);
        fill(&mut self.behavior_before, lower.behavior_before);
        fill(&mut self.behavior_after, lower.behavior_after);
        fill(&mut self.impact_scope, lower.impact_scope);
        fill(&mut self.is_breaking, lower.is_breaking);
        fill(&mut self.risk_explanation, lower.risk_explanation);
        fill(&mut self.technical_highlights, lower.technical_highlights);
        fill(&mut self.confidence_score, lower.confidence_score);
        fill(&mut self.qualitative, lower.qualitative);
        fill(&mut self.provider, lower.provider);
        fill(&mut self.model, lower.model);
        fill(&mut self.prompt_version, lower.prompt_version);
        fill(&mut self.token_usage, lower.token_usage);
    }
}

/// Strategy that derives semantic fields from a commit.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Produce a partial result, or fail. Failures are recovered by the pipeline.
    async fn extract(
        &self,
        commit: &CommitInfo,
        diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError>;

    /// Name used in logs and fallback reasons
    fn name(&self) -> &str;

    fn kind(&self) -> ExtractorKind;

    /// Whether qualitative scores from this extractor may be recorded.
    fn supports_qualitative(&self) -> bool {
        false
    }
}

/// Build the configured extractors, highest priority first.
///
/// LLM extractors whose API key is missing are still built; they report
/// themselves unavailable per commit so lower-priority extractors take over.
pub fn create_extractors(config: &ProjectConfig) -> Result<Vec<Arc<dyn Extractor>>> {
    let mut extractors: Vec<Arc<dyn Extractor>> = Vec::new();
    let retry = RetryPolicy {
        max_retries: config.analysis.max_retries,
        ..RetryPolicy::default()
    };

    for name in &config.analysis.extractors {
        match name.trim().to_lowercase().as_str() {
            "heuristic" => extractors.push(Arc::new(HeuristicExtractor::new())),
            "openai" => {
                let provider = &config.providers.openai;
                let api_key_env = provider
                    .api_key_env
                    .as_deref()
                    .unwrap_or(openai::DEFAULT_API_KEY_ENV);
                let extractor = OpenAiExtractor::new(
                    &provider.model,
                    api_key_env,
                    provider.base_url.as_deref(),
                    provider.temperature,
                )
                .with_retry(retry);
                if !extractor.has_api_key() {
                    warn!(env = api_key_env, "OpenAI API key not set, extractor will fall back");
                }
                extractors.push(Arc::new(extractor));
            },
            "anthropic" | "claude" => {
                let provider = &config.providers.anthropic;
                let api_key_env = provider
                    .api_key_env
                    .as_deref()
                    .unwrap_or(anthropic::DEFAULT_API_KEY_ENV);
                let extractor = AnthropicExtractor::new(
                    &provider.model,
                    api_key_env,
                    provider.base_url.as_deref(),
                    provider.temperature,
                )
                .with_retry(retry);
                if !extractor.has_api_key() {
                    warn!(env = api_key_env, "Anthropic API key not set, extractor will fall back");
                }
                extractors.push(Arc::new(extractor));
            },
            "ollama" => {
                let provider = &config.providers.ollama;
                let base_url = provider
                    .base_url
                    .as_deref()
                    .unwrap_or(ollama::DEFAULT_BASE_URL);
                extractors.push(Arc::new(
                    OllamaExtractor::new(&provider.model, base_url, provider.temperature)
                        .with_retry(retry),
                ));
            },
            other => return Err(anyhow::anyhow!("Unknown extractor: {}", other)),
        }
    }

    if extractors.is_empty() {
        return Err(anyhow::anyhow!(
            "No extractors configured (set analysis.extractors)"
        ));
    }

    Ok(extractors)
}
