//! Cleanup of raw model output into single-line commit messages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;

/// Messages shorter than this are dropped when the minimum length policy is on.
pub const MIN_MESSAGE_LENGTH: usize = 10;

/// Overflow beyond the limit after which a hard cut gets an ellipsis.
const ELLIPSIS_SLACK: usize = 10;
const ELLIPSIS: &str = "...";

static TRAILING_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)\.$").expect("valid trailing period regex"));

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\r\n]+\s*").expect("valid line break regex"));

/// Cleaning limits for one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    pub max_length: usize,
    /// Drop results shorter than this many characters.
    pub min_length: Option<usize>,
}

impl CleanOptions {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            min_length: None,
        }
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }
}

/// Clean one raw completion. Returns `None` when nothing usable remains.
pub fn clean_message(raw: &str, options: CleanOptions) -> Option<String> {
    // A cut can expose a quote or a period at the new end, so repeat until
    // stable. Every pass after the first only shrinks the text.
    let mut truncated = clean_pass(raw, options.max_length);
    loop {
        let next = clean_pass(&truncated, options.max_length);
        if next == truncated {
            break;
        }
        truncated = next;
    }

    if truncated.is_empty() {
        return None;
    }
    if let Some(min) = options.min_length
        && truncated.chars().count() < min
    {
        return None;
    }
    Some(truncated)
}

fn clean_pass(raw: &str, max_length: usize) -> String {
    let trimmed = raw.trim();
    let unquoted = strip_quotes(trimmed);
    let single_line = LINE_BREAKS.replace_all(unquoted, " ");
    let normalized = strip_trailing_period(single_line.trim());
    truncate_message(&normalized, max_length)
}

/// Clean every candidate and drop duplicates, keeping first-seen order.
pub fn process_candidates<I, S>(raws: I, options: CleanOptions) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dedupe(
        raws.into_iter()
            .filter_map(|raw| clean_message(raw.as_ref(), options)),
    )
}

/// Collapse exact duplicates, preserving first-seen order.
pub fn dedupe<I>(messages: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

/// Strip one leading and one trailing quote; a period right after the
/// trailing quote goes with it.
fn strip_quotes(text: &str) -> &str {
    let is_quote = |c: char| c == '"' || c == '\'';

    let mut out = text;
    if let Some(rest) = out.strip_prefix(is_quote) {
        out = rest;
    }
    if let Some(rest) = out
        .strip_suffix("\".")
        .or_else(|| out.strip_suffix("'."))
    {
        out = rest;
    } else if let Some(rest) = out.strip_suffix(is_quote) {
        out = rest;
    }
    out.trim()
}

fn strip_trailing_period(text: &str) -> String {
    TRAILING_PERIOD.replace(text, "$1").into_owned()
}

/// Shorten `message` to at most `max_length` characters.
///
/// Prefers, in order: the last sentence end past 70% of the limit, the last
/// clause separator past 60%, the last space past 50%. Otherwise the text is
/// hard cut, with an ellipsis when it ran well over the limit. A period left
/// after a word at the cut is dropped.
pub fn truncate_message(message: &str, max_length: usize) -> String {
    let length = message.chars().count();
    if length <= max_length {
        return message.to_string();
    }
    strip_trailing_period(&cut_to_length(message, length, max_length))
}

fn cut_to_length(message: &str, length: usize, max_length: usize) -> String {

    // One extra character lets a boundary sitting exactly at the limit match.
    let window: String = message.chars().take(max_length + 1).collect();
    let past = |byte_idx: usize, percent: usize| {
        window[..byte_idx].chars().count() * 100 > max_length * percent
    };

    if let Some(idx) = last_match(&window, &[". ", "! ", "? "])
        && past(idx, 70)
    {
        // Keep the punctuation.
        return window[..idx + 1].trim_end().to_string();
    }

    if let Some(idx) = last_match(&window, &[", ", "; "])
        && past(idx, 60)
    {
        return window[..idx].trim_end().to_string();
    }

    if let Some(idx) = window.rfind(char::is_whitespace)
        && past(idx, 50)
    {
        return window[..idx].trim_end().to_string();
    }

    if length > max_length + ELLIPSIS_SLACK && max_length > ELLIPSIS.len() {
        let head: String = message
            .chars()
            .take(max_length - ELLIPSIS.len())
            .collect();
        return format!("{}{}", head.trim_end(), ELLIPSIS);
    }

    let head: String = message.chars().take(max_length).collect();
    head.trim_end().to_string()
}

/// Byte index of the last occurrence of any of `patterns`.
fn last_match(text: &str, patterns: &[&str]) -> Option<usize> {
    patterns.iter().filter_map(|p| text.rfind(p)).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str) -> Option<String> {
        clean_message(raw, CleanOptions::new(50))
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(clean("  fix: handle empty input \n").unwrap(), "fix: handle empty input");
    }

    #[test]
    fn test_strips_surrounding_quotes() {
        assert_eq!(clean("\"Add login page\"").unwrap(), "Add login page");
        assert_eq!(clean("'Add login page'").unwrap(), "Add login page");
    }

    #[test]
    fn test_strips_period_after_trailing_quote() {
        assert_eq!(clean("\"Add login page\".").unwrap(), "Add login page");
    }

    #[test]
    fn test_removes_newlines() {
        assert_eq!(
            clean("Add cache layer\n\nSpeeds up lookups").unwrap(),
            "Add cache layer Speeds up lookups"
        );
        assert_eq!(clean("Fix crash\r\non exit").unwrap(), "Fix crash on exit");
    }

    #[test]
    fn test_removes_trailing_period_after_word() {
        assert_eq!(clean("Update dependencies.").unwrap(), "Update dependencies");
        assert_eq!(clean("Bump version to 2.0").unwrap(), "Bump version to 2.0");
        assert_eq!(clean("Wait for it...").unwrap(), "Wait for it...");
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(clean("").is_none());
        assert!(clean("   ").is_none());
        assert!(clean("\"\"").is_none());
    }

    #[test]
    fn test_min_length_policy() {
        let opts = CleanOptions::new(50).with_min_length(MIN_MESSAGE_LENGTH);
        assert!(clean_message("fix: a", opts).is_none());
        assert_eq!(clean_message("fix: handle nulls", opts).unwrap(), "fix: handle nulls");
        assert_eq!(clean_message("fix: a", CleanOptions::new(50)).unwrap(), "fix: a");
    }

    #[test]
    fn test_truncate_prefers_sentence_boundary() {
        let msg = "Add a new caching layer for users. Also refactor the database module heavily";
        let out = truncate_message(msg, 40);
        assert_eq!(out, "Add a new caching layer for users");
    }

    #[test]
    fn test_truncate_keeps_exclamation() {
        let msg = "Fix the broken release build now! Then tidy up the remaining scripts";
        let out = truncate_message(msg, 40);
        assert_eq!(out, "Fix the broken release build now!");
    }

    #[test]
    fn test_truncate_prefers_clause_separator() {
        let msg = "Add retry support to uploads, downloads and the sync client";
        let out = truncate_message(msg, 40);
        assert_eq!(out, "Add retry support to uploads");
    }

    #[test]
    fn test_truncate_falls_back_to_whitespace() {
        let msg = "Refactor configuration loading to support layered overrides";
        let out = truncate_message(msg, 30);
        assert_eq!(out, "Refactor configuration loading");
        assert!(out.chars().count() <= 30);

        let out = truncate_message(msg, 25);
        assert_eq!(out, "Refactor configuration");
    }

    #[test]
    fn test_truncate_hard_cut_with_ellipsis() {
        let msg = "x".repeat(80);
        let out = truncate_message(&msg, 20);
        assert_eq!(out, format!("{}...", "x".repeat(17)));
        assert_eq!(out.chars().count(), 20);
    }

    #[test]
    fn test_truncate_hard_cut_without_ellipsis_when_slightly_over() {
        let msg = "y".repeat(25);
        let out = truncate_message(&msg, 20);
        assert_eq!(out, "y".repeat(20));
    }

    #[test]
    fn test_truncate_never_exceeds_max() {
        let inputs = [
            "Add a feature. Another sentence here that goes on",
            "one, two, three, four, five, six, seven, eight, nine",
            "a b c d e f g h i j k l m n o p q r s t u v w x y z",
            "supercalifragilisticexpialidocious-and-then-some-more-text",
            "Ünïcödé characters everywhere in this message, really long one",
        ];
        for input in inputs {
            for max in [5, 10, 17, 30, 45] {
                let out = truncate_message(input, max);
                assert!(out.chars().count() <= max, "{input:?} @ {max} -> {out:?}");
            }
        }
    }

    #[test]
    fn test_clean_is_idempotent() {
        let inputs = [
            "\"feat(auth): add two-factor login.\"",
            "Refactor configuration loading to support layered overrides for every environment",
            "Fix crash\non exit.",
            "docs: update README",
            "Add a new caching layer for users. Also refactor the database module heavily",
            &"z".repeat(90),
        ];
        for input in inputs {
            let once = clean(input).unwrap();
            let twice = clean(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_clean_is_idempotent_when_cut_exposes_punctuation() {
        let opts = CleanOptions::new(20);
        let cases = [
            ("Fix parsers. Beautifyeverythingnow", "Fix parsers"),
            ("abcdefghijklmnopqrs.tuvw", "abcdefghijklmnopqrs"),
            ("Fix 'parser' handling everywhere", "Fix 'parser"),
        ];
        for (input, expected) in cases {
            let once = clean_message(input, opts).unwrap();
            assert_eq!(once, expected, "unexpected cleanup of {input:?}");
            assert_eq!(clean_message(&once, opts).unwrap(), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_truncate_drops_period_exposed_by_cut() {
        assert_eq!(truncate_message("Fix parsers. Beautifyeverythingnow", 20), "Fix parsers");
        assert_eq!(truncate_message("abcdefghijklmnopqrs.tuvw", 20), "abcdefghijklmnopqrs");
    }

    #[test]
    fn test_clean_is_idempotent_for_long_inputs() {
        let inputs = [
            "Fix parsers. Beautifyeverythingnow and then keep going past the limit",
            "\"Quoted subject that will certainly run past the configured limit\"",
        ];
        for input in inputs {
            let once = clean(input).unwrap();
            let twice = clean(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_process_candidates_dedupes_in_order() {
        let out = process_candidates(["fix: a", "fix: a", "fix: b"], CleanOptions::new(50));
        assert_eq!(out, vec!["fix: a".to_string(), "fix: b".to_string()]);
    }

    #[test]
    fn test_process_candidates_dedupes_after_cleaning() {
        let out = process_candidates(
            ["\"Add tests\"", "Add tests.", "  Add tests  ", ""],
            CleanOptions::new(50),
        );
        assert_eq!(out, vec!["Add tests".to_string()]);
    }
}
