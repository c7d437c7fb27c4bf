//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use super::{Completion, CompletionRequest, ModelProvider, ProviderError};
use crate::config::LlmConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Provider for any endpoint speaking the `/chat/completions` protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiCompatibleProvider {
    /// Builds a provider from configuration.
    pub fn new(config: LlmConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::permanent(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            response_format: request.json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ProviderError::transient(e.to_string())
                } else {
                    ProviderError::permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), "Model API returned an error");
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::permanent(format!("unreadable model response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::transient("model returned empty content"))?;

        let completion = Completion {
            content,
            model: if parsed.model.is_empty() {
                self.config.model.clone()
            } else {
                parsed.model
            },
            input_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
            latency_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
        };

        debug!(
            model = %completion.model,
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "Model call succeeded"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::local_http::serve_once;

    async fn complete_against(response: &str) -> Result<Completion, ProviderError> {
        let url = serve_once(response.to_string()).await;
        let provider =
            OpenAiCompatibleProvider::new(LlmConfig::new("sk-test").with_base_url(url)).unwrap();
        provider.complete(CompletionRequest::new("system", "prompt")).await
    }

    #[tokio::test]
    async fn test_undecodable_body_is_permanent() {
        let err = complete_against(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot json!",
        )
        .await
        .unwrap_err();
        assert!(!err.is_transient(), "{err}");
        assert!(err.message.contains("unreadable model response"));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let err = complete_against(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
        )
        .await
        .unwrap_err();
        assert!(err.is_transient());
        assert!(err.message.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_completion_parsed() {
        let body = r#"{"model":"gpt-4o-mini","choices":[{"message":{"content":"hello"}}],"usage":{"prompt_tokens":3,"completion_tokens":1}}"#;
        let completion = complete_against(&format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
        .await
        .unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.input_tokens, Some(3));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let provider = OpenAiCompatibleProvider::new(LlmConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 10,
            temperature: 0.5,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"model":"gpt-4o-mini","choices":[{"message":{"content":"{}"}}],
            "usage":{"prompt_tokens":12,"completion_tokens":3}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{}"));
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 12);
    }
}
