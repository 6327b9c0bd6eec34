//! Commit creation from the accepted message.

use git2::{ErrorCode, Oid, Repository};
use tracing::debug;

use crate::error::CommitError;

/// Commit the current index on HEAD with the repository's signature.
///
/// Works on an unborn branch, in which case the commit has no parent.
pub fn commit_staged(repo: &Repository, message: &str) -> Result<Oid, CommitError> {
    let mut index = repo.index().map_err(CommitError::IndexFailed)?;
    let tree_id = index.write_tree().map_err(CommitError::IndexFailed)?;
    let tree = repo.find_tree(tree_id).map_err(CommitError::CommitFailed)?;

    // Get the signature from git config
    let sig = repo.signature().map_err(CommitError::ConfigError)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().map_err(CommitError::CommitFailed)?),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
        Err(e) => return Err(CommitError::CommitFailed(e)),
    };
    let parents: Vec<_> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .map_err(CommitError::CommitFailed)?;

    debug!("Created commit {}", oid);
    Ok(oid)
}
