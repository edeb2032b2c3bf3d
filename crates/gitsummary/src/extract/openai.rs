use super::http::{api_key_from_env, send_json, RetryPolicy};
use super::prompt::{build_prompt, parse_response, MAX_DIFF_LINES, SYSTEM_PROMPT};
use super::{ExtractionResult, Extractor, ExtractorKind};
use crate::error::ExtractionError;
use crate::services::types::TokenUsage;
use crate::vcs::{CommitDiff, CommitInfo};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Extractor backed by an OpenAI-compatible chat completions API.
///
/// A missing API key does not prevent construction; every extraction then
/// reports the extractor as unavailable so the pipeline falls back.
pub struct OpenAiExtractor {
    model: String,
    api_key_env: String,
    api_key: Option<String>,
    base_url: String,
    temperature: f32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAiExtractor {
    /// Create a new extractor; the API key is read from `api_key_env`.
    pub fn new(model: &str, api_key_env: &str, base_url: Option<&str>, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            api_key_env: api_key_env.to_string(),
            api_key: api_key_from_env(api_key_env),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            temperature,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn failed(&self, message: impl Into<String>) -> ExtractionError {
        ExtractionError::Failed {
            extractor: self.name().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(
        &self,
        commit: &CommitInfo,
        diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError> {
        let Some(api_key) = &self.api_key else {
            return Err(ExtractionError::Unavailable {
                extractor: self.name().to_string(),
                reason: format!("environment variable {} not set", self.api_key_env),
            });
        };

        let prompt = build_prompt(commit, diff, MAX_DIFF_LINES);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        let body: ChatResponse = send_json(self.name(), self.retry, || {
            self.client.post(&url).bearer_auth(api_key).json(&request)
        })
        .await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.failed("OpenAI returned no message content"))?;

        let mut result = parse_response(self.name(), &content)?;
        result.provider = Some(self.name().to_string());
        result.model = Some(self.model.clone());
        result.token_usage = body.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        Ok(result)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Llm
    }

    fn supports_qualitative(&self) -> bool {
        true
    }
}
