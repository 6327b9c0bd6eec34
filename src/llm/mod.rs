//! Completion providers behind one capability trait.

pub mod claude;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod service;

pub use claude::{ClaudeCliService, check_claude_installed};
pub use openai::{OpenAiConfig, OpenAiService};
pub use provider::{Provider, build_service};
pub use service::{ChatMessage, CompletionOptions, CompletionRequest, CompletionService, Role};
