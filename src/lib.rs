//! gitscribe - A CLI tool that drafts commit messages for staged changes.
//!
//! # Overview
//!
//! gitscribe reads the staged diff with git2, picks a generation strategy by
//! diff size (the full diff, a statistical digest, or per-chunk prompts with
//! a synthesis step), asks an LLM provider for candidate messages, and
//! cleans them into single-line commit subjects.

pub mod commit;
pub mod config;
pub mod diff;
pub mod error;
pub mod generate;
pub mod llm;
pub mod secrets;

// Re-export commonly used types
pub use commit::commit_staged;
pub use config::{ConfigFile, Settings};
pub use diff::{ChangeDigest, DiffChunk, DiffSource, GitDiffSource, StagedChange, StagedDiff};
pub use error::{CommitError, CompletionError, ConfigError, DiffError, GenerationError, SecretError};
pub use generate::{CandidateMessage, GenerationInput, GenerationRequest, Generator, Strategy};
pub use llm::{CompletionService, Provider};
pub use secrets::SecretStore;
