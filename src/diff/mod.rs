//! Staged change collection, diff partitioning, and change digests.

pub mod partition;
pub mod source;
pub mod summary;

pub use partition::{
    DEFAULT_CHARS_PER_TOKEN, DEFAULT_CHUNK_TOKENS, DiffChunk, TokenEstimator, partition_diff,
    split_by_file,
};
pub use source::{
    ChangeStatistics, DEFAULT_EXCLUDES, DiffSource, GitDiffSource, StagedChange, StagedDiff,
};
pub use summary::{ChangeDigest, DEFAULT_TOP_FILES, DigestEntry, summarize};
