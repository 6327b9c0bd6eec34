//! Strategy selection by diff size.

use std::fmt;

use crate::generate::request::LargeDiffMode;

/// Diffs up to this many bytes are sent to the model as-is.
pub const DEFAULT_DIRECT_MAX_BYTES: usize = 30_000;

/// Change sets with more files than this are never sent as-is.
pub const DEFAULT_DIRECT_MAX_FILES: usize = 100;

/// Generation strategy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Full diff in a single prompt.
    Direct,
    /// Statistical digest in a single prompt.
    Summary,
    /// One prompt per diff chunk, then synthesis.
    Chunked,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Direct => "direct",
            Strategy::Summary => "summary",
            Strategy::Chunked => "chunked",
        })
    }
}

/// Tunable size thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    pub direct_max_bytes: usize,
    pub direct_max_files: usize,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            direct_max_bytes: DEFAULT_DIRECT_MAX_BYTES,
            direct_max_files: DEFAULT_DIRECT_MAX_FILES,
        }
    }
}

impl SizePolicy {
    /// Whether a diff is small enough to send whole.
    pub fn is_small(&self, diff_bytes: usize, file_count: usize) -> bool {
        diff_bytes < self.direct_max_bytes && file_count <= self.direct_max_files
    }
}

/// Pick a strategy.
///
/// Small diffs always go direct. For large diffs the mode decides; the
/// summary path needs a digest and falls back to chunking without one.
pub fn select_strategy(
    diff_bytes: usize,
    file_count: usize,
    digest_available: bool,
    mode: LargeDiffMode,
    policy: &SizePolicy,
) -> Strategy {
    if policy.is_small(diff_bytes, file_count) {
        return Strategy::Direct;
    }

    match mode {
        LargeDiffMode::Chunked => Strategy::Chunked,
        LargeDiffMode::Auto | LargeDiffMode::Summary if digest_available => Strategy::Summary,
        LargeDiffMode::Auto | LargeDiffMode::Summary => Strategy::Chunked,
    }
}
