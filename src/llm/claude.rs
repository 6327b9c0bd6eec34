//! Claude Code CLI as a completion provider.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::CompletionError;
use crate::llm::service::{CompletionRequest, CompletionService};

const CLAUDE_BINARY: &str = "claude";

/// Claude CLI JSON envelope when using --output-format json
#[derive(Deserialize)]
struct ClaudeCliResponse {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// [`CompletionService`] that spawns `claude -p` per call.
///
/// The CLI returns a single result, so multi-choice requests are fanned out
/// by the caller.
pub struct ClaudeCliService {
    binary: PathBuf,
    model: Option<String>,
}

impl ClaudeCliService {
    pub fn new(model: Option<String>) -> Self {
        Self {
            binary: PathBuf::from(CLAUDE_BINARY),
            model,
        }
    }

    /// Use a specific executable instead of `claude` from PATH.
    pub fn with_binary(binary: impl Into<PathBuf>, model: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            model,
        }
    }
}

/// Check if Claude Code CLI is installed and accessible.
///
/// Uses the `which` crate for cross-platform executable detection.
pub async fn check_claude_installed() -> Result<(), CompletionError> {
    let not_installed = || {
        CompletionError::Unreachable(
            "Claude Code CLI not found. Install with: npm install -g @anthropic-ai/claude-code"
                .to_string(),
        )
    };

    if which::which(CLAUDE_BINARY).is_err() {
        return Err(not_installed());
    }

    let version_check = Command::new(CLAUDE_BINARY)
        .arg("--version")
        .output()
        .await
        .map_err(|e| CompletionError::Unreachable(format!("failed to run claude: {e}")))?;

    if !version_check.status.success() {
        return Err(not_installed());
    }

    Ok(())
}

#[async_trait]
impl CompletionService for ClaudeCliService {
    fn name(&self) -> &'static str {
        "Claude CLI"
    }

    fn supports_multiple_choices(&self) -> bool {
        false
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError> {
        let timeout_duration = request.options.timeout;

        let mut command = Command::new(&self.binary);
        command
            .arg("-p")
            .arg(request.user_prompt())
            .arg("--output-format")
            .arg("json");

        let system = request.system_prompt();
        if !system.is_empty() {
            command.arg("--system-prompt").arg(system);
        }
        if let Some(model) = &self.model {
            command.arg("--model").arg(model);
        }
        if let Some(proxy) = &request.options.proxy {
            command.env("HTTPS_PROXY", proxy).env("HTTP_PROXY", proxy);
        }

        let output = timeout(
            timeout_duration,
            command
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| CompletionError::Timeout(timeout_duration))?
        .map_err(|e| {
            CompletionError::Unreachable(format!(
                "failed to spawn {}: {e}",
                self.binary.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let code = output.status.code().unwrap_or(-1);
            debug!("Claude CLI exited with code {}: {}", code, stderr);
            return Err(classify_failure(code, &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_claude_response(&stdout).map(|text| vec![text])
    }
}

/// Parse the CLI envelope, falling back to the raw text.
fn parse_claude_response(response: &str) -> Result<String, CompletionError> {
    let content = match serde_json::from_str::<ClaudeCliResponse>(response) {
        Ok(envelope) if envelope.is_error => return Err(classify_failure(1, &envelope.result)),
        Ok(envelope) => envelope.result,
        Err(_) => response.to_string(),
    };

    if content.trim().is_empty() {
        return Err(CompletionError::InvalidResponse(
            "Claude returned an empty result".to_string(),
        ));
    }
    Ok(content)
}

/// Map a failed CLI run onto the provider taxonomy using its stderr text.
fn classify_failure(code: i32, stderr: &str) -> CompletionError {
    let lower = stderr.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        CompletionError::RateLimited
    } else if lower.contains("prompt is too long") || lower.contains("too large") {
        CompletionError::PayloadTooLarge
    } else if lower.contains("invalid api key")
        || lower.contains("unauthorized")
        || lower.contains("please run /login")
    {
        CompletionError::AuthInvalid
    } else {
        CompletionError::ServerError {
            status: u16::try_from(code).unwrap_or(0),
            message: stderr.trim().to_string(),
        }
    }
}
