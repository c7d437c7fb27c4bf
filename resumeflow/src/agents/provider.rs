//! Model provider abstraction used by every agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Whether a provider failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Timeouts, connection failures, rate limits, server errors.
    Transient,
    /// Authentication, bad requests, unusable responses.
    Permanent,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Error returned by a model provider or page fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} provider error: {message}")]
pub struct ProviderError {
    /// Retry classification.
    pub kind: ProviderErrorKind,
    /// What went wrong.
    pub message: String,
}

impl ProviderError {
    /// A failure that may succeed on retry.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    /// A failure that retrying will not fix.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Classifies an HTTP status code.
    ///
    /// 408, 429 and 5xx are transient; everything else is permanent.
    #[must_use]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = format!("HTTP {status}: {}", body.into());
        if status == 408 || status == 429 || (500..600).contains(&status) {
            Self::transient(message)
        } else {
            Self::permanent(message)
        }
    }

    /// Returns true if the failure should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

/// One completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instructions.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Token ceiling for the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Ask the model for a JSON object.
    #[serde(default)]
    pub json: bool,
}

impl CompletionRequest {
    /// Creates a request with default sampling.
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            json: false,
        }
    }

    /// Requests a JSON reply.
    #[must_use]
    pub fn expect_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Sets the token ceiling.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A model reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text.
    pub content: String,
    /// Model that answered.
    pub model: String,
    /// Prompt tokens, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    /// Completion tokens, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    /// Round-trip latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl Completion {
    /// Creates a completion with only text and model set.
    #[must_use]
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Returns total tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }

    /// Usage attributes for logs and events.
    #[must_use]
    pub fn usage_attributes(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("llm.model".to_string(), serde_json::json!(self.model));
        if let Some(t) = self.input_tokens {
            map.insert("llm.input_tokens".to_string(), serde_json::json!(t));
        }
        if let Some(t) = self.output_tokens {
            map.insert("llm.output_tokens".to_string(), serde_json::json!(t));
        }
        map.insert(
            "llm.total_tokens".to_string(),
            serde_json::json!(self.total_tokens()),
        );
        if let Some(l) = self.latency_ms {
            map.insert("llm.latency_ms".to_string(), serde_json::json!(l));
        }
        map
    }
}

/// A language model backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs one completion.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status(429, "slow down").is_transient());
        assert!(ProviderError::from_status(503, "").is_transient());
        assert!(ProviderError::from_status(408, "").is_transient());
        assert!(!ProviderError::from_status(401, "bad key").is_transient());
        assert!(!ProviderError::from_status(400, "").is_transient());
    }

    #[test]
    fn test_completion_usage() {
        let completion = Completion {
            input_tokens: Some(100),
            output_tokens: Some(50),
            ..Completion::new("{}", "gpt-4o-mini")
        };
        assert_eq!(completion.total_tokens(), 150);
        let attrs = completion.usage_attributes();
        assert_eq!(attrs["llm.total_tokens"], 150);
        assert!(!attrs.contains_key("llm.latency_ms"));
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let mut mock = MockModelProvider::new();
        mock.expect_complete()
            .withf(|req| req.json)
            .times(1)
            .returning(|_| Ok(Completion::new(r#"{"ok":true}"#, "mock")));

        let reply = mock
            .complete(CompletionRequest::new("sys", "hi").expect_json())
            .await
            .unwrap();
        assert_eq!(reply.model, "mock");
    }
}
