use super::http::{api_key_from_env, send_json, RetryPolicy};
use super::prompt::{build_prompt, parse_response, MAX_DIFF_LINES, SYSTEM_PROMPT};
use super::{ExtractionResult, Extractor, ExtractorKind};
use crate::error::ExtractionError;
use crate::services::types::TokenUsage;
use crate::vcs::{CommitDiff, CommitInfo};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Extractor backed by the Anthropic Messages API.
pub struct AnthropicExtractor {
    model: String,
    api_key_env: String,
    api_key: Option<String>,
    base_url: String,
    temperature: f32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl AnthropicExtractor {
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
}

#[async_trait::async_trait]
impl Extractor for AnthropicExtractor {
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
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
            temperature: self.temperature,
        };

        let url = format!("{}/messages", self.base_url);
        let body: MessagesResponse = send_json(self.name(), self.retry, || {
            self.client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", API_VERSION)
                .json(&request)
        })
        .await?;

        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(ExtractionError::Failed {
                extractor: self.name().to_string(),
                message: "Anthropic returned no text content".to_string(),
            });
        }

        let mut result = parse_response(self.name(), &text)?;
        result.provider = Some(self.name().to_string());
        result.model = Some(self.model.clone());
        result.token_usage = body.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });
        Ok(result)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Llm
    }

    fn supports_qualitative(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::types::ImpactScope;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NO_KEY_ENV: &str = "GITSUMMARY_TEST_ANTHROPIC_KEY_UNSET_9150";

    fn commit() -> CommitInfo {
        CommitInfo {
            commit_id: "b".repeat(40),
            short_id: "bbbbbbb".to_string(),
            author_name: "Test".to_string(),
            author_email: "t@example.com".to_string(),
            timestamp: chrono::Utc::now(),
            summary_line: "feat!: drop v1 endpoints".to_string(),
            full_message: "feat!: drop v1 endpoints".to_string(),
            parent_ids: vec![],
        }
    }

    fn extractor(server: &MockServer) -> AnthropicExtractor {
        AnthropicExtractor::new("claude-test", NO_KEY_ENV, Some(&server.uri()), 0.0)
            .with_api_key("sk-ant-test")
            .with_retry(RetryPolicy::new(1, Duration::ZERO))
    }

    fn message(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1200, "output_tokens": 140}
        })
    }

    const ANSWER: &str = r#"{"intent_summary": "Remove the v1 REST endpoints",
        "category": "feature", "impact_scope": "public_api", "is_breaking": true,
        "risk_explanation": "Clients still on v1 break", "confidence_score": 0.9}"#;

    #[test]
    fn request_carries_system_prompt_and_max_tokens() {
        let request = MessagesRequest {
            model: "claude-test",
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], MAX_TOKENS);
        assert_eq!(json["system"], SYSTEM_PROMPT);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn default_base_url() {
        let extractor = AnthropicExtractor::new("claude-test", NO_KEY_ENV, None, 0.0);
        assert_eq!(extractor.base_url, DEFAULT_BASE_URL);
        assert!(!extractor.has_api_key());
        assert_eq!(extractor.name(), "anthropic");
        assert!(extractor.supports_qualitative());
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let extractor = AnthropicExtractor::new("claude-test", NO_KEY_ENV, None, 0.0);
        let err = extractor
            .extract(&commit(), &CommitDiff::default())
            .await
            .unwrap_err();
        match err {
            ExtractionError::Unavailable { extractor, reason } => {
                assert_eq!(extractor, "anthropic");
                assert_eq!(reason, format!("environment variable {} not set", NO_KEY_ENV));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_key_headers_and_maps_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(message(ANSWER)))
            .expect(1)
            .mount(&server)
            .await;

        let result = extractor(&server)
            .extract(&commit(), &CommitDiff::default())
            .await
            .unwrap();

        assert_eq!(result.is_breaking, Some(true));
        assert_eq!(result.impact_scope, Some(ImpactScope::PublicApi));
        assert_eq!(result.provider.as_deref(), Some("anthropic"));
        assert_eq!(result.model.as_deref(), Some("claude-test"));
        assert_eq!(
            result.token_usage,
            Some(TokenUsage {
                input_tokens: 1200,
                output_tokens: 140,
            })
        );
    }

    #[tokio::test]
    async fn overloaded_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded_error"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message(ANSWER)))
            .expect(1)
            .mount(&server)
            .await;

        let result = extractor(&server)
            .extract(&commit(), &CommitDiff::default())
            .await
            .unwrap();
        assert_eq!(result.is_breaking, Some(true));
    }

    #[tokio::test]
    async fn no_text_blocks_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [],
                "usage": {"input_tokens": 10, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let err = extractor(&server)
            .extract(&commit(), &CommitDiff::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Failed { .. }));
    }

    #[tokio::test]
    async fn invalid_key_is_failed_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = extractor(&server)
            .extract(&commit(), &CommitDiff::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
