//! Transaction manager - the entry point for transactions.
//!
//! The TransactionManager hands out transactions over one [`GitStore`] and
//! provides the scoped `view`/`update` forms that guarantee every
//! transaction is finalized exactly once.

use crate::storage::{CommitInfo, GitStore};
use crate::transaction::context::Transaction;
use crate::transaction::error::{TransactionError, TransactionResult};

/// Transaction manager - coordinates all transaction operations.
///
/// Thread-safe: can be shared across threads via Clone (the store uses Arc
/// internally). Any number of read transactions may run concurrently; write
/// transactions are serialized.
#[derive(Clone)]
pub struct TransactionManager {
    store: GitStore,
}

impl TransactionManager {
    /// Create a new transaction manager for the given store.
    pub fn new(store: GitStore) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &GitStore {
        &self.store
    }

    /// Begin a new transaction.
    ///
    /// A writable transaction blocks until the previous writer finishes.
    /// Beginning a second write transaction on the same thread while one is
    /// still open deadlocks.
    pub fn begin(&self, writable: bool) -> TransactionResult<Transaction<'_>> {
        Transaction::begin(&self.store, writable)
    }

    /// Run `f` in a read-only transaction, which is always rolled back.
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        let tx = self.begin(false)?;
        let outcome = f(&tx);
        tx.rollback();
        outcome
    }

    /// Run `f` in a write transaction.
    ///
    /// The transaction commits if `f` succeeds and rolls back if it fails;
    /// the error of `f` is returned unchanged.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        let mut tx = self.begin(true)?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    /// Committed transactions, newest first.
    pub fn history(&self, limit: Option<usize>) -> TransactionResult<Vec<CommitInfo>> {
        Ok(self.store.history(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Namespace, StorageError, StoreOptions};
    use tempfile::TempDir;

    fn setup() -> (TempDir, TransactionManager) {
        let dir = TempDir::new().unwrap();
        let store = GitStore::init(dir.path(), &StoreOptions::default()).unwrap();
        (dir, TransactionManager::new(store))
    }

    fn counters() -> Namespace {
        Namespace::new("counters")
    }

    fn read_counter(tx: &Transaction<'_>) -> TransactionResult<u64> {
        Ok(tx
            .get(&counters(), b"n")?
            .map(|bytes| String::from_utf8_lossy(&bytes).parse().unwrap_or(0))
            .unwrap_or(0))
    }

    #[test]
    fn test_update_commits() {
        let (_dir, manager) = setup();

        manager
            .update(|tx| -> TransactionResult<()> {
                tx.ensure_namespace(&counters())?;
                tx.put(&counters(), b"n", b"1".to_vec())
            })
            .unwrap();

        let value = manager.view(|tx| read_counter(tx)).unwrap();
        assert_eq!(value, 1);

        let history = manager.history(None).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].summary().starts_with("[TX] "));
    }

    #[test]
    fn test_update_rolls_back_on_error() {
        let (_dir, manager) = setup();
        let before = manager.store().head().unwrap();

        let result: TransactionResult<()> = manager.update(|tx| {
            tx.ensure_namespace(&counters())?;
            tx.put(&counters(), b"n", b"1".to_vec())?;
            Err(StorageError::Internal("abort".to_string()).into())
        });
        assert!(result.is_err());

        assert_eq!(manager.store().head().unwrap(), before);
        let exists = manager
            .view(|tx| tx.has_namespace(&counters()))
            .unwrap();
        assert!(!exists);
    }

    #[test]
    fn test_view_cannot_write() {
        let (_dir, manager) = setup();
        let writable = manager
            .view(|tx| Ok::<_, TransactionError>(tx.is_writable()))
            .unwrap();
        assert!(!writable);
    }

    #[test]
    fn test_concurrent_writers_are_serialized() {
        let (_dir, manager) = setup();
        manager
            .update(|tx| tx.ensure_namespace(&counters()))
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        manager
                            .update(|tx| {
                                let n = read_counter(tx)?;
                                tx.put(&counters(), b"n", (n + 1).to_string().into_bytes())
                            })
                            .unwrap();
                    }
                });
            }
        });

        let value = manager.view(|tx| read_counter(tx)).unwrap();
        assert_eq!(value, 20);
    }

    #[test]
    fn test_readers_run_beside_writer() {
        let (_dir, manager) = setup();

        let writer = manager.begin(true).unwrap();
        // a reader does not wait for the open writer
        let reader = manager.begin(false).unwrap();
        assert_eq!(reader.base_commit(), writer.base_commit());
        reader.rollback();
        writer.rollback();
    }
}
