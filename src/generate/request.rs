//! Caller-supplied parameters and generated candidates.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::llm::service::DEFAULT_TIMEOUT;

/// Commit message format requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitStyle {
    /// A plain imperative sentence.
    #[default]
    Plain,
    /// `type(scope): subject`
    Conventional,
    /// Leading gitmoji followed by the subject.
    Gitmoji,
}

impl CommitStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStyle::Plain => "plain",
            CommitStyle::Conventional => "conventional",
            CommitStyle::Gitmoji => "gitmoji",
        }
    }
}

impl fmt::Display for CommitStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "plain" => Ok(CommitStyle::Plain),
            "conventional" => Ok(CommitStyle::Conventional),
            "gitmoji" => Ok(CommitStyle::Gitmoji),
            other => Err(format!(
                "unknown commit type '{other}' (expected plain, conventional, or gitmoji)"
            )),
        }
    }
}

/// How to handle diffs too large to send directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LargeDiffMode {
    /// Prefer the digest, fall back to chunks when no digest is available.
    #[default]
    Auto,
    Summary,
    Chunked,
}

impl LargeDiffMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LargeDiffMode::Auto => "auto",
            LargeDiffMode::Summary => "summary",
            LargeDiffMode::Chunked => "chunked",
        }
    }
}

impl fmt::Display for LargeDiffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LargeDiffMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(LargeDiffMode::Auto),
            "summary" => Ok(LargeDiffMode::Summary),
            "chunked" => Ok(LargeDiffMode::Chunked),
            other => Err(format!(
                "unknown large diff mode '{other}' (expected auto, summary, or chunked)"
            )),
        }
    }
}

/// Read-only parameters for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub locale: String,
    /// Number of candidate messages requested.
    pub completions: u32,
    pub max_length: usize,
    pub style: CommitStyle,
    pub timeout: Duration,
    pub proxy: Option<String>,
    /// Per-chunk token budget override.
    pub chunk_tokens: Option<usize>,
    pub large_diff: LargeDiffMode,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            completions: 1,
            max_length: 50,
            style: CommitStyle::Plain,
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            chunk_tokens: None,
            large_diff: LargeDiffMode::Auto,
        }
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Direct,
    ChunkSynthesis,
    Summary,
}

/// A cleaned, single-line commit message proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMessage {
    pub text: String,
    pub origin: MessageOrigin,
}

impl fmt::Display for CandidateMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
