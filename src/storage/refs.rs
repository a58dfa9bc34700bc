//!  Branch management for the store.
//!
//!  The store keeps its whole committed state behind a single git branch,
//!  `main`. This module resolves that branch and moves it, always with
//!  compare-and-swap semantics so a stale writer can never overwrite a
//!  newer commit.

use git2::{ErrorCode, Repository};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::CommitId;

/// the branch holding the committed state of the store
pub const MAIN_BRANCH: &str = "main";

/// full ref path of [`MAIN_BRANCH`]
pub const MAIN_REF: &str = "refs/heads/main";

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Resolve a ref path to its current commit ID.
    pub fn resolve(repo: &Repository, refname: &str) -> StorageResult<CommitId> {
        let reference = repo.find_reference(refname).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                StorageError::EmptyStore
            } else {
                StorageError::Git(e)
            }
        })?;

        let commit = reference.peel_to_commit()?;
        Ok(CommitId::new(commit.id()))
    }

    /// Get the current tip of `main`.
    pub fn main_commit(repo: &Repository) -> StorageResult<CommitId> {
        Self::resolve(repo, MAIN_REF)
    }

    /// Check if a ref exists.
    pub fn exists(repo: &Repository, refname: &str) -> bool {
        repo.find_reference(refname).is_ok()
    }

    /// Move a ref only if it still points to the expected commit.
    ///
    /// The check and the update happen atomically inside libgit2 (the ref
    /// lock file), so two writers in different processes cannot both win.
    pub fn update_if_unchanged(
        repo: &Repository,
        refname: &str,
        expected: CommitId,
        new_target: CommitId,
    ) -> StorageResult<()> {
        let log_message = format!("commit {} on top of {}", new_target.short(), expected.short());

        match repo.reference_matching(refname, new_target.raw(), true, expected.raw(), &log_message) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ErrorCode::Modified => Err(StorageError::ConcurrentModification {
                branch: refname.to_string(),
            }),
            Err(e) => Err(StorageError::Git(e)),
        }
    }

    /// Make sure HEAD points at `main`.
    ///
    /// This should be called after creating the initial commit.
    pub fn init_main_branch(repo: &Repository) -> StorageResult<()> {
        if !Self::exists(repo, MAIN_REF) {
            return Err(StorageError::EmptyStore);
        }
        repo.set_head(MAIN_REF)?;
        Ok(())
    }
}
