//! Transaction error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The store could not hand out a transaction (snapshot unreadable).
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] StorageError),

    /// The transaction's changes could not be made durable.
    #[error("failed to commit transaction {tx_id}: {source}")]
    Commit {
        tx_id: String,
        #[source]
        source: StorageError,
    },

    /// A mutation or commit was attempted on a read-only transaction.
    #[error("transaction {tx_id} is read-only")]
    ReadOnly { tx_id: String },

    /// Storage layer error while the transaction was running.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TransactionError {
    /// Check if this error is retryable.
    ///
    /// Only a commit that lost the race for `main` against another process
    /// can succeed when the whole transaction is run again.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransactionError::Commit { source, .. } => source.is_retriable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let lost_race = TransactionError::Commit {
            tx_id: "tx001".to_string(),
            source: StorageError::ConcurrentModification {
                branch: "refs/heads/main".to_string(),
            },
        };
        assert!(lost_race.is_retryable());

        let read_only = TransactionError::ReadOnly {
            tx_id: "tx001".to_string(),
        };
        assert!(!read_only.is_retryable());

        let begin = TransactionError::Begin(StorageError::EmptyStore);
        assert!(!begin.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = TransactionError::ReadOnly {
            tx_id: "01h".to_string(),
        };
        assert_eq!(err.to_string(), "transaction 01h is read-only");

        let err = TransactionError::Begin(StorageError::EmptyStore);
        assert_eq!(
            err.to_string(),
            "failed to begin transaction: store is empty: no commits found"
        );
    }
}
