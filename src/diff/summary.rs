//! Compact digests of large change sets.

use std::cmp::Reverse;
use std::fmt;

use crate::diff::source::StagedChange;

/// Default number of files listed individually in a digest.
pub const DEFAULT_TOP_FILES: usize = 20;

/// One file line in a [`ChangeDigest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    pub changes: usize,
}

/// Bounded-size statistical summary of a change set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeDigest {
    pub total_files: usize,
    pub total_additions: usize,
    pub total_deletions: usize,
    pub total_changes: usize,
    /// Largest files by changed lines, descending. Ties keep input order.
    pub entries: Vec<DigestEntry>,
    /// Files not listed in `entries`.
    pub omitted: usize,
}

impl ChangeDigest {
    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }

    /// Render the digest as prompt text.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Files changed: {}\nTotal: +{} -{} ({} changed lines)\n",
            self.total_files, self.total_additions, self.total_deletions, self.total_changes
        );

        if !self.entries.is_empty() {
            out.push_str("\nLargest changes:\n");
            for entry in &self.entries {
                out.push_str(&format!(
                    "- {} (+{} -{}, {} lines)\n",
                    entry.path, entry.additions, entry.deletions, entry.changes
                ));
            }
        }

        if self.omitted > 0 {
            out.push_str(&format!("... and {} more files\n", self.omitted));
        }

        out
    }
}

impl fmt::Display for ChangeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Build a digest listing the `top_n` largest changes.
pub fn summarize(changes: &[StagedChange], top_n: usize) -> ChangeDigest {
    let total_additions = changes.iter().map(|c| c.additions).sum();
    let total_deletions = changes.iter().map(|c| c.deletions).sum();

    let mut ranked: Vec<&StagedChange> = changes.iter().collect();
    // Stable sort keeps input order for equal change counts.
    ranked.sort_by_key(|c| Reverse(c.changes()));

    let entries: Vec<DigestEntry> = ranked
        .into_iter()
        .take(top_n)
        .map(|c| DigestEntry {
            path: c.path.clone(),
            additions: c.additions,
            deletions: c.deletions,
            changes: c.changes(),
        })
        .collect();

    ChangeDigest {
        total_files: changes.len(),
        total_additions,
        total_deletions,
        total_changes: total_additions + total_deletions,
        omitted: changes.len() - entries.len(),
        entries,
    }
}
