//! Remote language-model client
//!
//! Talks to an OpenAI-style chat-completions endpoint. The trait returns an
//! explicit `Result` so callers distinguish "call failed" from "text
//! content" without in-band error sentinels; any failure simply triggers
//! the deterministic fallback upstream.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default timeout for remote model requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between retry attempts on transient failure
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Sampling temperature for assessment generation
const TEMPERATURE: f64 = 0.7;

/// Completion length cap
const MAX_TOKENS: u32 = 1500;

/// Remote model call errors
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level failure (connect, timeout)
    #[error("Remote model request failed: {0}")]
    Network(String),

    /// Non-2xx response from the API
    #[error("Remote model returned status {0}: {1}")]
    Api(u16, String),

    /// Response body could not be decoded
    #[error("Remote model response malformed: {0}")]
    Malformed(String),

    /// Response decoded but carried no completion choices
    #[error("Remote model returned no completion choices")]
    Empty,
}

/// Abstraction over the remote language-model call
#[async_trait]
pub trait RemoteModelClient: Send + Sync {
    /// Generate a completion for a system + user prompt pair
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, RemoteError>;
}

/// Chat-completions HTTP client with bounded retry
pub struct ChatCompletionsClient {
    http_client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl ChatCompletionsClient {
    /// Create a client for the given endpoint
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        max_retries: u32,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(DEFAULT_TIMEOUT).build()?,
            api_url,
            api_key,
            model,
            max_retries,
        })
    }

    async fn send_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, RemoteError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(status.as_u16(), body));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        if let Some(usage) = &completion.usage {
            debug!(total_tokens = usage.total_tokens, "Remote completion received");
        }

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(RemoteError::Empty)
    }

    /// Server-side errors and network failures are retried; client errors
    /// (4xx) are not, since retrying an invalid request cannot succeed
    fn is_retryable(error: &RemoteError) -> bool {
        match error {
            RemoteError::Network(_) => true,
            RemoteError::Api(status, _) => *status >= 500,
            RemoteError::Malformed(_) | RemoteError::Empty => false,
        }
    }
}

#[async_trait]
impl RemoteModelClient for ChatCompletionsClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, RemoteError> {
        let mut attempt = 0;
        loop {
            match self.send_once(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries && Self::is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Retrying remote model call"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Chat-completions wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ChatCompletionsClient::is_retryable(&RemoteError::Network(
            "timeout".to_string()
        )));
        assert!(ChatCompletionsClient::is_retryable(&RemoteError::Api(
            503,
            "unavailable".to_string()
        )));
        assert!(!ChatCompletionsClient::is_retryable(&RemoteError::Api(
            401,
            "unauthorized".to_string()
        )));
        assert!(!ChatCompletionsClient::is_retryable(&RemoteError::Empty));
    }

    #[test]
    fn test_response_decoding() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "looks good"}}],
            "usage": {"total_tokens": 42}
        }"#;
        let decoded: ChatResponse = serde_json::from_str(body).expect("decode failed");
        assert_eq!(decoded.choices[0].message.content, "looks good");
        assert_eq!(decoded.usage.as_ref().map(|u| u.total_tokens), Some(42));
    }
}
