//! Error types for gitscribe modules using thiserror.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from reading staged changes out of the repository.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to collect staged diff: {0}")]
    DiffFailed(#[source] git2::Error),

    #[error("Failed to stage tracked changes: {0}")]
    StagingFailed(#[source] git2::Error),

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExcludePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Errors from credential resolution.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error(
        "No value found for '{name}'. Set OPENAI_API_KEY or run `gitscribe config set {name} <value>`"
    )]
    NotFound { name: String },

    #[error("Secret backend '{backend}' failed: {reason}")]
    BackendFailed { backend: &'static str, reason: String },
}

/// Errors from loading or writing settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid TOML: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("Could not determine the user config directory")]
    NoConfigDir,
}

/// Failures reported by a completion provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Rate limited by the completion provider")]
    RateLimited,

    #[error("Request payload is too large for the model")]
    PayloadTooLarge,

    #[error("Authentication was rejected by the completion provider")]
    AuthInvalid,

    #[error("Completion provider is unreachable: {0}")]
    Unreachable(String),

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion provider returned a server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Completion provider returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Short actionable guidance for the user.
    pub fn remediation(&self) -> &'static str {
        match self {
            CompletionError::RateLimited => {
                "Wait a moment and retry, reduce the number of generated messages, or switch to a model with a higher rate limit."
            }
            CompletionError::PayloadTooLarge => {
                "Exclude large files with --exclude, lower --chunk-size, or switch to a model with a larger context window."
            }
            CompletionError::AuthInvalid => {
                "Check your API key (OPENAI_API_KEY or `gitscribe config set api_key <key>`)."
            }
            CompletionError::Unreachable(_) => {
                "Check your network connection, proxy settings, and the configured base URL."
            }
            CompletionError::Timeout(_) => {
                "Increase --timeout or retry; large diffs take longer to process."
            }
            CompletionError::ServerError { .. } => {
                "The provider had an internal error. Retry in a moment or switch models."
            }
            CompletionError::InvalidResponse(_) => {
                "Retry the request; if it keeps failing, switch models."
            }
        }
    }

    /// Whether the provider itself may succeed on an immediate retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::Unreachable(_) | CompletionError::ServerError { .. }
        )
    }
}

/// Terminal failures of a generation request.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to generate a commit message: {0}")]
    Provider(#[source] CompletionError),

    #[error("No commit messages were generated")]
    NoMessagesGenerated {
        #[source]
        last_error: Option<CompletionError>,
    },

    #[error("Nothing to generate from: the diff is empty")]
    EmptyInput,
}

impl GenerationError {
    /// Remediation text shown below the error.
    pub fn hint(&self) -> &'static str {
        match self {
            GenerationError::Provider(err) => err.remediation(),
            GenerationError::NoMessagesGenerated { .. } => {
                "Retry, or adjust --max-length, --chunk-size, or --exclude and try again."
            }
            GenerationError::EmptyInput => "Stage some changes with `git add` first.",
        }
    }
}

/// Errors from creating the commit.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Failed to write index tree: {0}")]
    IndexFailed(#[source] git2::Error),

    #[error("Failed to create commit: {0}")]
    CommitFailed(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    ConfigError(#[source] git2::Error),
}
