//! Repository records and the pending index.

use tracing::debug;

use crate::catalog::codec::{decode_repository, encode_repository};
use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::namespaces::{pending_repositories, repositories};
use crate::catalog::types::{Repository, RepositoryStatus};
use crate::storage::Namespace;
use crate::transaction::{Transaction, TransactionManager};

/// Catalog of repositories.
///
/// Every repository has one record in `repositories`. Names of repositories
/// in the pending state are also kept in `pendingrepositories`; both are
/// updated in the same transaction.
#[derive(Clone)]
pub struct RepositoryStore {
    manager: TransactionManager,
}

impl RepositoryStore {
    pub fn new(manager: TransactionManager) -> Self {
        Self { manager }
    }

    /// Create or overwrite a repository record and update the pending
    /// index, atomically.
    ///
    /// Pending adds the name to the index and active removes it, whichever
    /// variant carries the code. Other status codes leave the index as it
    /// is.
    pub fn put_repository(&self, repository: &Repository) -> CatalogResult<()> {
        let record = encode_repository(repository)?;
        let key = repository.name.as_bytes();

        self.manager.update(|tx| -> CatalogResult<()> {
            let records = repositories();
            tx.ensure_namespace(&records)?;
            tx.put(&records, key, record)?;

            let pending = pending_repositories();
            match repository.status.canonical() {
                RepositoryStatus::Pending => {
                    tx.ensure_namespace(&pending)?;
                    tx.put(&pending, key, Vec::new())?;
                }
                RepositoryStatus::Active => {
                    tx.ensure_namespace(&pending)?;
                    tx.delete(&pending, key)?;
                }
                RepositoryStatus::Other(code) => {
                    debug!(name = %repository.name, code, "status leaves pending index untouched");
                }
            }
            Ok(())
        })?;

        debug!(name = %repository.name, status = %repository.status, "put repository");
        Ok(())
    }

    /// Get a repository record. A missing record is `None`.
    pub fn get_repository(&self, name: &str) -> CatalogResult<Option<Repository>> {
        let bytes = self
            .manager
            .view(|tx| tx.get(&repositories(), name.as_bytes()))?;

        bytes
            .map(|bytes| decode_repository(name, &bytes))
            .transpose()
    }

    /// Names of all repositories, in byte order.
    pub fn list_repositories(&self) -> CatalogResult<Vec<String>> {
        self.manager.view(|tx| list_names(tx, &repositories()))
    }

    /// Names of all repositories in the pending state, in byte order.
    pub fn list_pending_repositories(&self) -> CatalogResult<Vec<String>> {
        self.manager
            .view(|tx| list_names(tx, &pending_repositories()))
    }
}

/// Keys of a namespace as names.
pub(crate) fn list_names(tx: &Transaction<'_>, namespace: &Namespace) -> CatalogResult<Vec<String>> {
    tx.keys(namespace)?
        .into_iter()
        .map(|key| {
            String::from_utf8(key).map_err(|e| {
                CatalogError::decoding(
                    String::from_utf8_lossy(e.as_bytes()),
                    format!("name in {} is not valid UTF-8", namespace),
                )
            })
        })
        .collect()
}
