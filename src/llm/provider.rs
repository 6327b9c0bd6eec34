//! Provider selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::config::Settings;
use crate::error::SecretError;
use crate::llm::claude::ClaudeCliService;
use crate::llm::openai::{OpenAiConfig, OpenAiService};
use crate::llm::service::CompletionService;
use crate::secrets::SecretStore;

/// Secret name holding the OpenAI-compatible API key.
pub const API_KEY_SECRET: &str = "api_key";

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    Claude,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Claude => "claude",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "claude" => Ok(Provider::Claude),
            other => Err(format!(
                "unknown provider '{other}' (expected openai or claude)"
            )),
        }
    }
}

/// Build the configured [`CompletionService`].
///
/// Only the OpenAI provider needs a credential; the Claude CLI handles its
/// own authentication.
pub fn build_service(
    settings: &Settings,
    secrets: &SecretStore,
) -> Result<Arc<dyn CompletionService>, SecretError> {
    match settings.provider {
        Provider::OpenAi => {
            let api_key = secrets.resolve(API_KEY_SECRET)?;
            let mut config = OpenAiConfig::new(api_key);
            config.base_url = settings.base_url.clone();
            if let Some(model) = &settings.model {
                config.model = model.clone();
            }
            debug!("Using OpenAI-compatible provider at {} ({})", config.base_url, config.model);
            Ok(Arc::new(OpenAiService::new(config)))
        }
        Provider::Claude => {
            debug!("Using Claude CLI provider");
            Ok(Arc::new(ClaudeCliService::new(settings.model.clone())))
        }
    }
}
