//! Request plumbing shared by the LLM extractors.

use crate::error::ExtractionError;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Bounded retry for transient provider failures (connection errors,
/// 429 and 5xx). Runs inside the pipeline's per-extractor timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Exponential backoff: base, 2x base, 4x base, ...
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send a request built by `request` and decode its JSON body.
///
/// Transport errors map to [`ExtractionError::Unavailable`], non-success
/// statuses and undecodable bodies to [`ExtractionError::Failed`]. Client
/// errors other than 429 are never retried.
pub async fn send_json<T, F>(
    extractor: &str,
    retry: RetryPolicy,
    request: F,
) -> Result<T, ExtractionError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let last = attempt >= retry.max_retries;
        match request().send().await {
            Err(e) if last => {
                return Err(ExtractionError::Unavailable {
                    extractor: extractor.to_string(),
                    reason: e.to_string(),
                })
            },
            Err(e) => {
                debug!(extractor, attempt, error = %e, "Request failed, retrying");
            },
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<T>().await.map_err(|e| ExtractionError::Failed {
                        extractor: extractor.to_string(),
                        message: format!("failed to parse response: {}", e),
                    });
                }
                let text = response.text().await.unwrap_or_default();
                if last || !is_transient(status) {
                    return Err(ExtractionError::Failed {
                        extractor: extractor.to_string(),
                        message: format!("API error {}: {}", status, text.trim()),
                    });
                }
                debug!(extractor, attempt, status = %status, "Transient API error, retrying");
            },
        }
        tokio::time::sleep(retry.delay(attempt)).await;
        attempt += 1;
    }
}

/// Read an API key from `env_var`; empty values count as unset.
pub fn api_key_from_env(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        ok: bool,
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    async fn call(server: &MockServer, retry: RetryPolicy) -> Result<Answer, ExtractionError> {
        let client = reqwest::Client::new();
        let url = format!("{}/answer", server.uri());
        send_json("test", retry, || client.post(&url)).await
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[tokio::test]
    async fn server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/answer"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/answer"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(call(&server, fast(2)).await.unwrap(), Answer { ok: true });
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let err = call(&server, fast(2)).await.unwrap_err();
        match err {
            ExtractionError::Failed { message, .. } => {
                assert!(message.contains("500"));
                assert!(message.contains("overloaded"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = call(&server, fast(2)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Failed { .. }));
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": false})),
            )
            .mount(&server)
            .await;

        assert_eq!(call(&server, fast(1)).await.unwrap(), Answer { ok: false });
    }

    #[tokio::test]
    async fn undecodable_body_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = call(&server, fast(0)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Failed { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let client = reqwest::Client::new();
        let err = send_json::<Answer, _>("test", fast(1), || client.post("http://127.0.0.1:1/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Unavailable { .. }));
    }

    #[test]
    fn blank_env_key_counts_as_unset() {
        std::env::set_var("GITSUMMARY_TEST_BLANK_KEY", "  ");
        assert_eq!(api_key_from_env("GITSUMMARY_TEST_BLANK_KEY"), None);
        assert_eq!(api_key_from_env("GITSUMMARY_TEST_NO_SUCH_KEY_42"), None);
    }
}
