//! Prompt construction for commit message generation.
//!
//! Every strategy shares [`build_system_prompt`] so format and length rules
//! are identical whether the model sees a diff, a digest, or a chunk.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::diff::ChangeDigest;
use crate::generate::request::{CommitStyle, GenerationRequest};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid ANSI regex"));

const CONVENTIONAL_TYPES: &[(&str, &str)] = &[
    ("feat", "A new feature"),
    ("fix", "A bug fix"),
    ("docs", "Documentation only changes"),
    ("style", "Changes that do not affect the meaning of the code (formatting, whitespace)"),
    ("refactor", "A code change that neither fixes a bug nor adds a feature"),
    ("perf", "A code change that improves performance"),
    ("test", "Adding missing tests or correcting existing tests"),
    ("build", "Changes to the build system or external dependencies"),
    ("ci", "Changes to CI configuration files and scripts"),
    ("chore", "Other changes that don't modify src or test files"),
    ("revert", "Reverts a previous commit"),
];

const GITMOJI_TYPES: &[(&str, &str)] = &[
    (":sparkles:", "Introduce new features"),
    (":bug:", "Fix a bug"),
    (":memo:", "Add or update documentation"),
    (":art:", "Improve structure or format of the code"),
    (":recycle:", "Refactor code"),
    (":zap:", "Improve performance"),
    (":white_check_mark:", "Add, update, or pass tests"),
    (":wrench:", "Add or update configuration files"),
    (":arrow_up:", "Upgrade dependencies"),
    (":fire:", "Remove code or files"),
];

/// Build the system prompt for the given request parameters.
pub fn build_system_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Generate a concise git commit message written in present tense for the code changes provided by the user.\n\
         Rules:\n\
         - Message language: {locale}\n\
         - The commit message must be at most {max} characters long.\n\
         - Return only the commit message on a single line: no quotes, no explanations, no markdown, no trailing period.\n\
         - Describe the intent of the change, not a file-by-file list.\n",
        locale = request.locale,
        max = request.max_length,
    );
    prompt.push_str(&style_instructions(request.style));
    prompt
}

fn style_instructions(style: CommitStyle) -> String {
    match style {
        CommitStyle::Plain => {
            "- Write the message as a plain imperative sentence, e.g. \"Add retry to upload client\".\n"
                .to_string()
        }
        CommitStyle::Conventional => {
            let mut out = String::from(
                "- Use the Conventional Commits format: <type>(<optional scope>): <description>\n\
                 - Choose the type that best describes the change:\n",
            );
            for (name, description) in CONVENTIONAL_TYPES {
                out.push_str(&format!("  {name}: {description}\n"));
            }
            out
        }
        CommitStyle::Gitmoji => {
            let mut out = String::from(
                "- Start the message with exactly one gitmoji code followed by a space and the description.\n\
                 - Choose the gitmoji that best describes the change:\n",
            );
            for (code, description) in GITMOJI_TYPES {
                out.push_str(&format!("  {code}: {description}\n"));
            }
            out
        }
    }
}

/// User payload for the direct strategy.
pub fn diff_payload(diff: &str) -> String {
    sanitize_diff(diff)
}

/// User payload for the summary strategy.
pub fn digest_payload(digest: &ChangeDigest) -> String {
    format!(
        "The staged change set is too large to show in full. Here is a summary of it:\n\n\
         {digest}\n\
         Write one commit message that captures the overall intent of these changes."
    )
}

/// User payload for one chunk of a large diff.
pub fn chunk_payload(chunk_text: &str, index: usize, total: usize, max_length: usize) -> String {
    format!(
        "This is part {part} of {total} of a larger change. Write one concise commit message \
         (at most {max_length} characters) describing only this part.\n\n{diff}",
        part = index + 1,
        diff = sanitize_diff(chunk_text),
    )
}

/// User payload asking the model to merge per-chunk messages.
pub fn synthesis_payload(messages: &[String]) -> String {
    let list: String = messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}\n", i + 1, m))
        .collect();

    format!(
        "Each of these commit messages describes one part of the same change:\n\n{list}\n\
         Combine them into a single commit message that captures their combined intent."
    )
}

/// Last-resort payload built only from changed file names.
pub fn file_list_payload(files: &[String]) -> String {
    let list: String = files.iter().map(|f| format!("- {f}\n")).collect();
    format!(
        "The diff was too large to analyze. These files were changed:\n\n{list}\n\
         Write one commit message summarizing the most likely intent of the change."
    )
}

/// Sanitize diff text for inclusion in an LLM prompt.
///
/// Removes ANSI escape sequences and control characters other than
/// newlines and tabs. Diff content is otherwise left untouched.
pub fn sanitize_diff(text: &str) -> String {
    let without_ansi = ANSI_ESCAPE.replace_all(text, "");
    without_ansi
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
