//! Repository record encoding.
//!
//! Records are stored as pretty JSON blobs so `git show` on the store stays
//! readable. Metadata fields carry a `_` prefix.

use serde::{Deserialize, Serialize};

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::types::Repository;

/// Current record format version.
pub(crate) const RECORD_FORMAT: u32 = 1;

#[derive(Serialize)]
struct RecordOut<'a> {
    #[serde(rename = "_format")]
    format: u32,
    #[serde(flatten)]
    repository: &'a Repository,
}

#[derive(Deserialize)]
struct RecordIn {
    #[serde(rename = "_format")]
    format: u32,
    #[serde(flatten)]
    repository: Repository,
}

/// Encode a repository record.
pub(crate) fn encode_repository(repository: &Repository) -> CatalogResult<Vec<u8>> {
    let record = RecordOut {
        format: RECORD_FORMAT,
        repository,
    };
    serde_json::to_vec_pretty(&record).map_err(|source| CatalogError::Encoding {
        key: repository.name.clone(),
        source,
    })
}

/// Decode a repository record stored under `key`.
///
/// The name inside the record must match the key it was stored under.
pub(crate) fn decode_repository(key: &str, bytes: &[u8]) -> CatalogResult<Repository> {
    let record: RecordIn =
        serde_json::from_slice(bytes).map_err(|e| CatalogError::decoding(key, e.to_string()))?;

    if record.format != RECORD_FORMAT {
        return Err(CatalogError::decoding(
            key,
            format!("unsupported record format {}", record.format),
        ));
    }

    if record.repository.name != key {
        return Err(CatalogError::decoding(
            key,
            format!(
                "name mismatch: key is '{}' but record has '{}'",
                key, record.repository.name
            ),
        ));
    }

    Ok(record.repository)
}
