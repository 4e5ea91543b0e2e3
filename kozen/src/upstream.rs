//! Client for the upstream generative-language API.
//!
//! The chat proxy forwards each sanitized user message as a single outbound
//! HTTPS POST to the Gemini `generateContent` endpoint and relays the reply.
//! The call carries a hard cancellation deadline; no retries are performed -
//! a failed call surfaces immediately as an error to the caller.

use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

use crate::config::UpstreamConfig;
use crate::errors::{Error, Result};

/// Maximum relayed reply length in characters.
pub const MAX_RESPONSE_LENGTH: usize = 2000;

/// Handle for outbound calls to the generative-language service.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
    timeout: std::time::Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        }
    }

    /// Forward one sanitized message and return the sanitized reply.
    ///
    /// Fails with `ServiceUnavailable` before any outbound traffic if no API
    /// credential is configured. The deadline aborts the in-flight call and
    /// maps to `Timeout`, distinct from other upstream failures.
    pub async fn generate_reply(&self, message: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            tracing::error!("Gemini API key not configured");
            Error::ServiceUnavailable {
                service: "AI service".to_string(),
            }
        })?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        );

        let payload = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": message }],
                },
            ],
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header(reqwest::header::USER_AGENT, concat!("kozen/", env!("CARGO_PKG_VERSION")))
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            // Upstream details stay server-side; the caller only sees the status
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API error (status {}): {}", status, detail);
            return Err(Error::Upstream { status });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout
            } else {
                tracing::error!("Failed to read Gemini API response body: {}", e);
                Error::InvalidUpstreamResponse
            }
        })?;

        let text = extract_reply_text(&body).ok_or_else(|| {
            tracing::error!("Gemini API response missing candidates[0].content.parts[0].text");
            Error::InvalidUpstreamResponse
        })?;

        Ok(truncate_chars(strip_markdown_bold(text), MAX_RESPONSE_LENGTH))
    }
}

fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        tracing::error!("Chat upstream request failed: {}", e);
        Error::Internal {
            operation: "reach AI service".to_string(),
        }
    }
}

/// Pull the reply text out of a `generateContent` response body.
fn extract_reply_text(body: &Value) -> Option<&str> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/// Remove paired markdown bold markers, keeping the text between them.
fn strip_markdown_bold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        match rest[open + 2..].find("**") {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str(&rest[open + 2..open + 2 + close]);
                rest = &rest[open + 2 + close + 2..];
            }
            // Unpaired marker, leave the remainder untouched
            None => break,
        }
    }

    out.push_str(rest);
    out
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str, api_key: Option<&str>, timeout: Duration) -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig {
            api_key: api_key.map(|k| k.to_string()),
            base_url: server_uri.parse().unwrap(),
            model: "gemini-2.5-flash".to_string(),
            timeout,
        })
    }

    fn gemini_body(text: &str) -> Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } },
            ],
        })
    }

    #[test]
    fn test_strip_markdown_bold() {
        assert_eq!(strip_markdown_bold("**Hi** there"), "Hi there");
        assert_eq!(strip_markdown_bold("a **b** c **d** e"), "a b c d e");
        assert_eq!(strip_markdown_bold("no markers"), "no markers");
        // Unpaired markers are left alone
        assert_eq!(strip_markdown_bold("dangling ** marker"), "dangling ** marker");
        assert_eq!(strip_markdown_bold("**empty pair:** ****"), "empty pair: ");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello".to_string(), 10), "hello");
        assert_eq!(truncate_chars("hello".to_string(), 3), "hel");
        // Truncation respects character boundaries, not bytes
        assert_eq!(truncate_chars("ééééé".to_string(), 3), "ééé");
    }

    #[test]
    fn test_extract_reply_text() {
        assert_eq!(extract_reply_text(&gemini_body("hello")), Some("hello"));
        assert_eq!(extract_reply_text(&json!({})), None);
        assert_eq!(extract_reply_text(&json!({"candidates": []})), None);
        assert_eq!(extract_reply_text(&json!({"candidates": [{"content": {"parts": []}}]})), None);
        assert_eq!(
            extract_reply_text(&json!({"candidates": [{"content": {"parts": [{"text": 42}]}}]})),
            None
        );
    }

    #[tokio::test]
    async fn test_generate_reply_strips_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("**Hi** there")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("test-key"), Duration::from_secs(5));
        let reply = client.generate_reply("hello").await.unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_generate_reply_truncates_long_replies() {
        let server = MockServer::start().await;
        let long_reply = "a".repeat(MAX_RESPONSE_LENGTH + 500);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(&long_reply)))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("test-key"), Duration::from_secs(5));
        let reply = client.generate_reply("hello").await.unwrap();
        assert_eq!(reply.chars().count(), MAX_RESPONSE_LENGTH);
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_outbound_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("hello")))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None, Duration::from_secs(5));
        let err = client.generate_reply("hello").await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_upstream_status_maps_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("test-key"), Duration::from_secs(5));
        let err = client.generate_reply("hello").await.unwrap_err();
        match err {
            Error::Upstream { status } => assert_eq!(status.as_u16(), 503),
            other => panic!("Expected Upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_upstream_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": [{"content": {}}]})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("test-key"), Duration::from_secs(5));
        let err = client.generate_reply("hello").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUpstreamResponse));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_body("too late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("test-key"), Duration::from_millis(100));
        let err = client.generate_reply("hello").await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }
}
