//! Token-bounded partitioning of unified diffs.
//!
//! A diff is first split at file boundaries (`diff --git` headers). Whole
//! file segments are packed into chunks while they fit the token budget; a
//! segment that is too large on its own is split greedily by line. Chunks
//! always hold whole lines and concatenate back to the original text.

/// Marker line that starts a new file in a unified git diff.
const FILE_HEADER: &str = "diff --git ";

/// Rough characters-per-token ratio for source code and diffs.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Default token budget for a single chunk.
pub const DEFAULT_CHUNK_TOKENS: usize = 3_000;

/// Approximate token counter.
///
/// Only monotonicity with text length matters; the ratio is tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimator {
    chars_per_token: usize,
}

impl TokenEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_chars(text.chars().count())
    }

    fn estimate_chars(&self, chars: usize) -> usize {
        chars.div_ceil(self.chars_per_token)
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

/// A contiguous slice of a diff with its estimated token cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffChunk {
    pub text: String,
    pub estimated_tokens: usize,
}

impl DiffChunk {
    /// Paths introduced by `diff --git` headers inside this chunk.
    ///
    /// A chunk that continues a file started in an earlier chunk has no header
    /// and returns an empty list.
    pub fn file_names(&self) -> Vec<String> {
        self.text
            .lines()
            .filter_map(|line| line.strip_prefix(FILE_HEADER))
            .filter_map(parse_header_path)
            .collect()
    }
}

/// Extract the destination path from the remainder of a `diff --git` line.
fn parse_header_path(rest: &str) -> Option<String> {
    if let Some(idx) = rest.rfind(" b/") {
        return Some(rest[idx + 3..].trim_end().to_string());
    }
    rest.split_whitespace().last().map(str::to_string)
}

/// Split a diff into per-file segments.
///
/// Any text before the first header is kept with the first segment so the
/// segments always concatenate back to the input. Returns an empty list
/// when the text has no file headers at all.
pub fn split_by_file(diff: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = Vec::new();
    let mut offset = 0;
    for line in diff.split_inclusive('\n') {
        if line.starts_with(FILE_HEADER) {
            starts.push(offset);
        }
        offset += line.len();
    }

    if starts.is_empty() {
        return Vec::new();
    }

    // Preamble belongs to the first segment.
    starts[0] = 0;

    let mut segments = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(diff.len());
        segments.push(&diff[start..end]);
    }
    segments
}

/// Partition a diff into chunks of at most `max_tokens` estimated tokens.
///
/// The only chunks that may exceed the budget are single lines that are
/// larger than the budget on their own.
pub fn partition_diff(
    diff: &str,
    max_tokens: usize,
    estimator: TokenEstimator,
) -> Vec<DiffChunk> {
    let mut builder = ChunkBuilder::new(max_tokens.max(1), estimator);

    let segments = split_by_file(diff);
    if segments.is_empty() {
        builder.push_lines(diff);
        return builder.finish();
    }

    for segment in segments {
        if estimator.estimate(segment) <= builder.max_tokens {
            builder.push(segment);
        } else {
            builder.flush();
            builder.push_lines(segment);
            builder.flush();
        }
    }

    builder.finish()
}

struct ChunkBuilder {
    max_tokens: usize,
    estimator: TokenEstimator,
    current: String,
    current_chars: usize,
    chunks: Vec<DiffChunk>,
}

impl ChunkBuilder {
    fn new(max_tokens: usize, estimator: TokenEstimator) -> Self {
        Self {
            max_tokens,
            estimator,
            current: String::new(),
            current_chars: 0,
            chunks: Vec::new(),
        }
    }

    /// Append `piece`, starting a new chunk first if it would overflow.
    fn push(&mut self, piece: &str) {
        let chars = piece.chars().count();
        if !self.current.is_empty()
            && self.estimator.estimate_chars(self.current_chars + chars) > self.max_tokens
        {
            self.flush();
        }
        self.current.push_str(piece);
        self.current_chars += chars;
    }

    fn push_lines(&mut self, text: &str) {
        for line in text.split_inclusive('\n') {
            self.push(line);
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.current);
        let estimated_tokens = self.estimator.estimate_chars(self.current_chars);
        self.current_chars = 0;
        self.chunks.push(DiffChunk {
            text,
            estimated_tokens,
        });
    }

    fn finish(mut self) -> Vec<DiffChunk> {
        self.flush();
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_diff(path: &str, body_lines: usize) -> String {
        let mut out = format!(
            "diff --git a/{path} b/{path}\nindex 1111111..2222222 100644\n--- a/{path}\n+++ b/{path}\n@@ -1,{body_lines} +1,{body_lines} @@\n"
        );
        for i in 0..body_lines {
            out.push_str(&format!("+line {i} of {path}\n"));
        }
        out
    }

    fn joined(chunks: &[DiffChunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_estimator_rounds_up() {
        let est = TokenEstimator::new(4);
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("abc"), 1);
        assert_eq!(est.estimate("abcd"), 1);
        assert_eq!(est.estimate("abcde"), 2);
    }

    #[test]
    fn test_estimator_zero_ratio_is_clamped() {
        let est = TokenEstimator::new(0);
        assert_eq!(est.estimate("abc"), 3);
    }

    #[test]
    fn test_split_by_file_segments() {
        let diff = format!("{}{}", file_diff("a.rs", 2), file_diff("b.rs", 3));
        let segments = split_by_file(&diff);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].starts_with("diff --git a/a.rs"));
        assert!(segments[1].starts_with("diff --git a/b.rs"));
        assert_eq!(segments.concat(), diff);
    }

    #[test]
    fn test_split_by_file_keeps_preamble() {
        let diff = format!("stray preamble\n{}", file_diff("a.rs", 1));
        let segments = split_by_file(&diff);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].starts_with("stray preamble\n"));
    }

    #[test]
    fn test_split_by_file_without_headers_is_empty() {
        assert!(split_by_file("just some text\nwith lines\n").is_empty());
        assert!(split_by_file("").is_empty());
    }

    #[test]
    fn test_small_diff_is_one_chunk() {
        let diff = format!("{}{}", file_diff("a.rs", 2), file_diff("b.rs", 2));
        let chunks = partition_diff(&diff, 10_000, TokenEstimator::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, diff);
    }

    #[test]
    fn test_empty_diff_yields_no_chunks() {
        assert!(partition_diff("", 100, TokenEstimator::default()).is_empty());
    }

    #[test]
    fn test_files_are_not_split_when_they_fit() {
        let a = file_diff("a.rs", 10);
        let b = file_diff("b.rs", 10);
        let est = TokenEstimator::default();
        let budget = est.estimate(&a).max(est.estimate(&b));
        let diff = format!("{a}{b}");

        let chunks = partition_diff(&diff, budget, est);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, a);
        assert_eq!(chunks[1].text, b);
    }

    #[test]
    fn test_oversized_file_is_split_by_line() {
        let big = file_diff("big.rs", 200);
        let small = file_diff("small.rs", 1);
        let diff = format!("{small}{big}{small}");
        let est = TokenEstimator::default();

        let chunks = partition_diff(&diff, 100, est);
        assert!(chunks.len() > 3);
        assert_eq!(joined(&chunks), diff);
        for chunk in &chunks {
            assert!(chunk.estimated_tokens <= 100, "chunk over budget: {}", chunk.estimated_tokens);
            assert!(chunk.text.ends_with('\n'));
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn test_headerless_text_falls_back_to_line_split() {
        let text: String = (0..50).map(|i| format!("plain line number {i}\n")).collect();
        let chunks = partition_diff(&text, 20, TokenEstimator::default());
        assert!(chunks.len() > 1);
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_single_huge_line_forms_own_chunk() {
        let huge = "x".repeat(1_000);
        let text = format!("short\n{huge}\nshort again\n");
        let chunks = partition_diff(&text, 10, TokenEstimator::default());

        assert_eq!(joined(&chunks), text);
        let oversized: Vec<_> = chunks.iter().filter(|c| c.estimated_tokens > 10).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].text, format!("{huge}\n"));
    }

    #[test]
    fn test_missing_trailing_newline_is_preserved() {
        let text = format!("{}+tail without newline", file_diff("a.rs", 30));
        let chunks = partition_diff(&text, 25, TokenEstimator::default());
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_reconstruction_across_budgets() {
        let diff: String = (0..8)
            .map(|i| file_diff(&format!("src/file_{i}.rs"), i * 13 + 1))
            .collect();
        for budget in [1, 7, 40, 150, 1_000, 100_000] {
            let chunks = partition_diff(&diff, budget, TokenEstimator::default());
            assert_eq!(joined(&chunks), diff, "budget {budget}");
        }
    }

    #[test]
    fn test_chunk_file_names() {
        let diff = format!("{}{}", file_diff("src/a.rs", 1), file_diff("docs/b.md", 1));
        let chunk = DiffChunk {
            estimated_tokens: 0,
            text: diff,
        };
        assert_eq!(chunk.file_names(), vec!["src/a.rs", "docs/b.md"]);
    }

    #[test]
    fn test_continuation_chunk_has_no_file_names() {
        let chunk = DiffChunk {
            text: "+more lines\n+of a file\n".to_string(),
            estimated_tokens: 5,
        };
        assert!(chunk.file_names().is_empty());
    }
}
