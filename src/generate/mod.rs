//! Commit message generation: strategy selection, prompting, orchestration,
//! and output cleanup.

pub mod orchestrator;
pub mod postprocess;
pub mod prompt;
pub mod request;
pub mod strategy;

pub use orchestrator::{GenerationInput, Generator, GeneratorConfig};
pub use postprocess::{CleanOptions, clean_message, dedupe, process_candidates, truncate_message};
pub use request::{CandidateMessage, CommitStyle, GenerationRequest, LargeDiffMode, MessageOrigin};
pub use strategy::{SizePolicy, Strategy, select_strategy};
