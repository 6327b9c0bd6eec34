//! The completion service capability shared by every provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CompletionError;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling and transport parameters for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
    /// Number of choices requested in this single call.
    pub n: u32,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 200,
            n: 1,
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
        }
    }
}

/// A fully built completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            options,
        }
    }

    /// Concatenated content of all messages with the given role.
    pub fn content_for(&self, role: Role) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn system_prompt(&self) -> String {
        self.content_for(Role::System)
    }

    pub fn user_prompt(&self) -> String {
        self.content_for(Role::User)
    }
}

/// A backend that turns prompt messages into text completions.
///
/// This abstraction allows mocking the provider in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &'static str;

    /// Whether `options.n > 1` is honored in a single call.
    fn supports_multiple_choices(&self) -> bool;

    /// Run one completion call and return the choice texts.
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError>;
}
