//! Text-completion service client.
//!
//! The analysis stage talks to an opaque chat-completion endpoint through
//! the [`CompletionClient`] trait: a fixed message-array request in, the
//! first choice's message content out. Keeping the trait this narrow means
//! the repair cascade and fallback logic can be exercised in tests with a
//! scripted client, and the transport can be swapped without touching the
//! analyzer.
//!
//! Transport and schema failures surface as [`AnalysisFailure::Service`];
//! the analyzer converts every one of them into the local heuristic path,
//! never into a caller-visible error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AnalysisFailure;

/// One chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Parameters accompanying a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The completion endpoint the analyzer delegates to.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the messages and return the first choice's content.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, AnalysisFailure>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: String,
}

/// `reqwest`-backed client for chat-completions-shaped endpoints.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, AnalysisFailure> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnalysisFailure::Service(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, AnalysisFailure> {
        let body = WireRequest {
            model: &options.model,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            messages,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisFailure::Service(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisFailure::Service(format!(
                "completion endpoint returned {status}"
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AnalysisFailure::Service(format!("response decode: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AnalysisFailure::Service("response contained no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialises_fixed_shape() {
        let messages = vec![ChatMessage::user("analyze this")];
        let body = WireRequest {
            model: "claude-3-5-sonnet-20241022",
            temperature: 0.1,
            max_tokens: 4000,
            messages: &messages,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "analyze this");
    }

    #[test]
    fn response_extracts_first_choice() {
        let raw = r#"{"choices":[{"message":{"content":"{\"ok\":true}"}},{"message":{"content":"second"}}]}"#;
        let parsed: WireResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "{\"ok\":true}");
    }
}
