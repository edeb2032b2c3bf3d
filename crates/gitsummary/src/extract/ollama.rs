use super::http::{send_json, RetryPolicy};
use super::prompt::{build_prompt, parse_response, MAX_DIFF_LINES, SYSTEM_PROMPT};
use super::{ExtractionResult, Extractor, ExtractorKind};
use crate::error::ExtractionError;
use crate::services::types::TokenUsage;
use crate::vcs::{CommitDiff, CommitInfo};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    format: &'static str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Extractor backed by a local Ollama server
pub struct OllamaExtractor {
    model: String,
    base_url: String,
    temperature: f32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OllamaExtractor {
    pub fn new(model: &str, base_url: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl Extractor for OllamaExtractor {
    async fn extract(
        &self,
        commit: &CommitInfo,
        diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError> {
        let prompt = build_prompt(commit, diff, MAX_DIFF_LINES);
        let request = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                OllamaMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            format: "json",
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let body: OllamaChatResponse = send_json(self.name(), self.retry, || {
            self.client.post(&url).json(&request)
        })
        .await?;

        let mut result = parse_response(self.name(), &body.message.content)?;
        result.provider = Some(self.name().to_string());
        result.model = Some(self.model.clone());
        if body.prompt_eval_count.is_some() || body.eval_count.is_some() {
            result.token_usage = Some(TokenUsage {
                input_tokens: body.prompt_eval_count.unwrap_or(0),
                output_tokens: body.eval_count.unwrap_or(0),
            });
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Llm
    }

    fn supports_qualitative(&self) -> bool {
        true
    }
}
