//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here
//! We use `thiserror` for ergonomic error definition and better error messages

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::Namespace;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// a write targeted a namespace that was never created
    #[error("namespace not found: {0}")]
    NamespaceNotFound(Namespace),

    /// keys must be at least one byte long
    #[error("empty key in namespace {0}")]
    EmptyKey(Namespace),

    /// data integrity check failed
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: String, reason: String },

    /// the tree entry has an unexpected type
    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: String,
        expected: String,
        found: String,
    },

    /// store is not initialized
    #[error("store not initialized: {0}")]
    NotInitialized(PathBuf),

    /// the main branch has no commit to read from
    #[error("store is empty: no commits found")]
    EmptyStore,

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// branch update failed due to concurrent modification
    #[error("concurrent modification: branch {branch} was updated by another writer")]
    ConcurrentModification { branch: String },

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error points at damaged on-disk state
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StorageError::CorruptedData { .. } | StorageError::UnexpectedEntryType { .. }
        )
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::ConcurrentModification { .. })
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
