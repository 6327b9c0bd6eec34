//! OpenAI-compatible chat completions over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompletionError;
use crate::llm::retry::retry_with_backoff;
use crate::llm::service::{ChatMessage, CompletionRequest, CompletionService};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Attempts for transient failures (server errors, connection resets).
    pub max_attempts: u32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: 3,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    max_tokens: u32,
    n: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// [`CompletionService`] backed by `/chat/completions`.
pub struct OpenAiService {
    config: OpenAiConfig,
}

impl OpenAiService {
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config }
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError> {
        let options = &request.options;
        let limit = options.timeout;
        let client = build_client(options.proxy.as_deref())?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            temperature: options.temperature,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            max_tokens: options.max_tokens,
            n: options.n.max(1),
        };

        let response = client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, limit))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!("Completion request failed with {}: {}", status, text);
            return Err(map_status(status, &text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(limit)
            } else {
                CompletionError::InvalidResponse(e.to_string())
            }
        })?;

        let texts: Vec<String> = parsed
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect();

        if texts.is_empty() {
            return Err(CompletionError::InvalidResponse(
                "response contained no choices".to_string(),
            ));
        }
        Ok(texts)
    }
}

#[async_trait]
impl CompletionService for OpenAiService {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn supports_multiple_choices(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError> {
        retry_with_backoff(
            self.config.max_attempts,
            || self.attempt(request),
            CompletionError::is_transient,
        )
        .await
    }
}

fn build_client(proxy: Option<&str>) -> Result<Client, CompletionError> {
    let mut builder = Client::builder();
    if let Some(url) = proxy {
        let proxy = Proxy::all(url)
            .map_err(|e| CompletionError::Unreachable(format!("invalid proxy '{url}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| CompletionError::Unreachable(format!("failed to build HTTP client: {e}")))
}

fn map_transport_error(err: &reqwest::Error, limit: Duration) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout(limit)
    } else {
        CompletionError::Unreachable(err.to_string())
    }
}

/// Map a non-success HTTP status (and error body) onto the provider taxonomy.
fn map_status(status: StatusCode, body: &str) -> CompletionError {
    let api_error = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let message = api_error
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let context_exceeded = api_error
        .as_ref()
        .and_then(|e| e.error.code.as_deref())
        .is_some_and(|code| code == "context_length_exceeded")
        || message.contains("maximum context length");

    match status.as_u16() {
        401 | 403 => CompletionError::AuthInvalid,
        413 => CompletionError::PayloadTooLarge,
        429 => CompletionError::RateLimited,
        400 if context_exceeded => CompletionError::PayloadTooLarge,
        code @ 500..=599 => CompletionError::ServerError {
            status: code,
            message,
        },
        code => CompletionError::InvalidResponse(format!("HTTP {code}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status_auth() {
        assert_eq!(map_status(StatusCode::UNAUTHORIZED, ""), CompletionError::AuthInvalid);
        assert_eq!(map_status(StatusCode::FORBIDDEN, ""), CompletionError::AuthInvalid);
    }

    #[test]
    fn test_map_status_rate_limit_and_payload() {
        assert_eq!(map_status(StatusCode::TOO_MANY_REQUESTS, ""), CompletionError::RateLimited);
        assert_eq!(map_status(StatusCode::PAYLOAD_TOO_LARGE, ""), CompletionError::PayloadTooLarge);
    }

    #[test]
    fn test_map_status_context_length_exceeded() {
        let body = r#"{"error": {"message": "This model's maximum context length is 8192 tokens", "code": "context_length_exceeded"}}"#;
        assert_eq!(map_status(StatusCode::BAD_REQUEST, body), CompletionError::PayloadTooLarge);
    }

    #[test]
    fn test_map_status_server_error_keeps_message() {
        let body = r#"{"error": {"message": "upstream overloaded"}}"#;
        let err = map_status(StatusCode::BAD_GATEWAY, body);
        assert_eq!(
            err,
            CompletionError::ServerError {
                status: 502,
                message: "upstream overloaded".to_string()
            }
        );
    }

    #[test]
    fn test_map_status_other_client_error() {
        let err = map_status(StatusCode::NOT_FOUND, "no such model");
        assert!(matches!(err, CompletionError::InvalidResponse(m) if m.contains("404")));
    }

    #[test]
    fn test_invalid_proxy_is_unreachable() {
        let err = build_client(Some("http://[::1")).unwrap_err();
        assert!(matches!(err, CompletionError::Unreachable(_)));
    }

    #[test]
    fn test_body_serializes_sampling_params() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatCompletionBody {
            model: "m",
            messages: &messages,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 200,
            n: 2,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "m");
        assert_eq!(value["n"], 2);
        assert_eq!(value["max_tokens"], 200);
        assert_eq!(value["messages"][1]["role"], "user");
    }
}
