//! Catalog error types.

use thiserror::Error;

use crate::transaction::TransactionError;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur reading or writing catalog records.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The transaction could not be opened, ran into a storage failure, or
    /// could not be committed.
    #[error("transaction failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("failed to encode record {key}: {source}")]
    Encoding {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode record {key}: {reason}")]
    Decoding { key: String, reason: String },
}

impl CatalogError {
    pub(crate) fn decoding(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogError::Decoding {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
