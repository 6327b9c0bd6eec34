//! Staged diff collection from the index using git2.

use git2::{DiffFindOptions, ErrorCode, Patch, Repository, Tree};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::error::DiffError;

/// Files that are almost never useful to an LLM and blow up the diff size.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "Cargo.lock",
    "*.lock",
];

/// One file's pending modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    /// Unified diff text for this file. Empty for pure renames and mode changes.
    pub diff: String,
}

impl StagedChange {
    pub fn new(path: impl Into<String>, additions: usize, deletions: usize) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
            diff: String::new(),
        }
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = diff.into();
        self
    }

    /// Total changed lines.
    pub fn changes(&self) -> usize {
        self.additions + self.deletions
    }
}

/// The staged file list together with the full unified diff.
#[derive(Debug, Clone)]
pub struct StagedDiff {
    pub files: Vec<String>,
    pub raw_diff: String,
}

/// Per-file statistics for the staged changes.
#[derive(Debug, Clone)]
pub struct ChangeStatistics {
    pub files: Vec<String>,
    pub per_file: Vec<StagedChange>,
    pub total_changes: usize,
}

/// Source of staged changes.
///
/// Both methods return `Ok(None)` when nothing is staged, which callers
/// treat as a no-op rather than an error.
pub trait DiffSource {
    fn staged_changes(&self, exclude: &[String]) -> Result<Option<StagedDiff>, DiffError>;

    fn change_statistics(&self, exclude: &[String])
    -> Result<Option<ChangeStatistics>, DiffError>;
}

/// [`DiffSource`] reading HEAD → index from a git2 repository.
pub struct GitDiffSource<'r> {
    repo: &'r Repository,
}

impl<'r> GitDiffSource<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self { repo }
    }

    /// Stage modifications and deletions of already-tracked files (`git add --update`).
    pub fn stage_tracked(&self) -> Result<(), DiffError> {
        let mut index = self.repo.index().map_err(DiffError::StagingFailed)?;
        index
            .update_all(["*"].iter(), None)
            .map_err(DiffError::StagingFailed)?;
        index.write().map_err(DiffError::StagingFailed)?;
        Ok(())
    }

    /// Collect every staged file that survives the exclude patterns.
    fn collect(&self, exclude: &[String]) -> Result<Vec<StagedChange>, DiffError> {
        let matcher = ExcludeMatcher::new(exclude)?;
        let head_tree = resolve_head_tree(self.repo)?;

        let mut diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)
            .map_err(DiffError::DiffFailed)?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(DiffError::DiffFailed)?;

        let mut changes = Vec::new();
        for idx in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(idx) else {
                continue;
            };

            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();

            if path.is_empty() {
                continue;
            }
            if matcher.is_excluded(&path) {
                debug!("Excluding staged file {}", path);
                continue;
            }

            let (additions, deletions, text) = match Patch::from_diff(&diff, idx)
                .map_err(DiffError::DiffFailed)?
            {
                Some(mut patch) => {
                    let (_, additions, deletions) =
                        patch.line_stats().map_err(DiffError::DiffFailed)?;
                    let buf = patch.to_buf().map_err(DiffError::DiffFailed)?;
                    (additions, deletions, String::from_utf8_lossy(&buf).into_owned())
                }
                None => (0, 0, String::new()),
            };

            changes.push(StagedChange {
                path,
                additions,
                deletions,
                diff: text,
            });
        }

        Ok(changes)
    }
}

impl DiffSource for GitDiffSource<'_> {
    fn staged_changes(&self, exclude: &[String]) -> Result<Option<StagedDiff>, DiffError> {
        let changes = self.collect(exclude)?;
        if changes.is_empty() {
            return Ok(None);
        }

        let raw_diff: String = changes.iter().map(|c| c.diff.as_str()).collect();
        let files = changes.into_iter().map(|c| c.path).collect();
        Ok(Some(StagedDiff { files, raw_diff }))
    }

    fn change_statistics(
        &self,
        exclude: &[String],
    ) -> Result<Option<ChangeStatistics>, DiffError> {
        let per_file = self.collect(exclude)?;
        if per_file.is_empty() {
            return Ok(None);
        }

        let files = per_file.iter().map(|c| c.path.clone()).collect();
        let total_changes = per_file.iter().map(StagedChange::changes).sum();
        Ok(Some(ChangeStatistics {
            files,
            per_file,
            total_changes,
        }))
    }
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found),
/// `Ok(Some(tree))` for repos with a valid HEAD, or `Err(DiffError::DiffFailed)`
/// for real errors (corrupt HEAD, permission issues, missing objects).
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, DiffError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(DiffError::DiffFailed(e)),
    };

    let tree = head_ref.peel_to_tree().map_err(DiffError::DiffFailed)?;
    Ok(Some(tree))
}

/// Glob matcher over the default excludes plus user patterns.
///
/// A path is excluded when either its full path or its file name matches.
struct ExcludeMatcher {
    set: GlobSet,
}

impl ExcludeMatcher {
    fn new(extra: &[String]) -> Result<Self, DiffError> {
        let mut builder = GlobSetBuilder::new();
        let patterns = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(extra.iter().cloned());

        for pattern in patterns {
            let glob = Glob::new(&pattern).map_err(|source| DiffError::InvalidExcludePattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }

        let set = builder
            .build()
            .map_err(|source| DiffError::InvalidExcludePattern {
                pattern: extra.join(", "),
                source,
            })?;
        Ok(Self { set })
    }

    fn is_excluded(&self, path: &str) -> bool {
        if self.set.is_match(path) {
            return true;
        }
        path.rsplit('/')
            .next()
            .is_some_and(|name| self.set.is_match(name))
    }
}
