//! Transaction context.
//!
//! A transaction reads from the snapshot `main` pointed at when it began and
//! buffers its writes in a [`NamespaceChanges`] overlay. Nothing touches the
//! object database until commit, so rollback is simply forgetting the
//! overlay. `commit` and `rollback` take `self` by value: a transaction is
//! finalized exactly once and cannot be used afterwards.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::MutexGuard;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::storage::{
    CommitId, CommitMessage, GitStore, Namespace, NamespaceChanges, StorageError, TreeId,
};
use crate::transaction::error::{TransactionError, TransactionResult};

/// A read-only or writable transaction against a [`GitStore`].
///
/// A writable transaction owns the store's writer slot until it is
/// finalized or dropped. Dropping an unfinished transaction discards its
/// changes.
pub struct Transaction<'db> {
    id: String,
    store: &'db GitStore,
    base: CommitId,
    root: TreeId,
    writer: Option<MutexGuard<'db, ()>>,
    changes: NamespaceChanges,
    finished: bool,
}

impl<'db> Transaction<'db> {
    /// Start a transaction on the current tip of `main`.
    ///
    /// A writable transaction blocks here until no other writer is active.
    pub(crate) fn begin(store: &'db GitStore, writable: bool) -> TransactionResult<Self> {
        // claim the writer slot first so the snapshot is the newest commit
        let writer = writable.then(|| store.lock_writer());

        let base = store.head().map_err(TransactionError::Begin)?;
        let root = store.root_tree(base).map_err(TransactionError::Begin)?;
        let id = Ulid::new().to_string().to_lowercase();

        debug!(tx = %id, writable, base = %base.short(), "begin transaction");

        Ok(Self {
            id,
            store,
            base,
            root,
            writer,
            changes: NamespaceChanges::new(),
            finished: false,
        })
    }

    /// Get the transaction ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this transaction may write.
    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    /// Get the commit this transaction reads from.
    pub fn base_commit(&self) -> CommitId {
        self.base
    }

    fn require_writable(&self) -> TransactionResult<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(TransactionError::ReadOnly {
                tx_id: self.id.clone(),
            })
        }
    }

    fn check_write(&self, namespace: &Namespace, key: &[u8]) -> TransactionResult<()> {
        self.require_writable()?;
        if key.is_empty() {
            return Err(StorageError::EmptyKey(namespace.clone()).into());
        }
        if !self.has_namespace(namespace)? {
            return Err(StorageError::NamespaceNotFound(namespace.clone()).into());
        }
        Ok(())
    }

    // ==================== Namespaces ====================

    /// Check whether a namespace exists, including ones created in this
    /// transaction.
    pub fn has_namespace(&self, namespace: &Namespace) -> TransactionResult<bool> {
        if self.changes.get(namespace).is_some() {
            return Ok(true);
        }
        Ok(self.store.has_namespace(self.root, namespace)?)
    }

    /// Create a namespace and all its parents if they don't exist yet.
    pub fn ensure_namespace(&mut self, namespace: &Namespace) -> TransactionResult<()> {
        self.require_writable()?;
        self.changes.ensure(namespace);
        Ok(())
    }

    /// List the namespaces nested directly in `namespace`, in byte order.
    pub fn child_namespaces(&self, namespace: &Namespace) -> TransactionResult<Vec<Vec<u8>>> {
        let mut names: BTreeSet<Vec<u8>> = self
            .store
            .read_child_namespaces(self.root, namespace)?
            .into_iter()
            .collect();

        if let Some(pending) = self.changes.get(namespace) {
            names.extend(pending.child_names().map(<[u8]>::to_vec));
        }

        Ok(names.into_iter().collect())
    }

    // ==================== Keys ====================

    /// Read a value. A missing namespace or key is `None`, not an error.
    pub fn get(&self, namespace: &Namespace, key: &[u8]) -> TransactionResult<Option<Vec<u8>>> {
        if let Some(pending) = self.changes.get(namespace) {
            if let Some(value) = pending.lookup(key) {
                return Ok(value.map(<[u8]>::to_vec));
            }
        }
        Ok(self.store.read_value(self.root, namespace, key)?)
    }

    /// Write a value. The namespace must exist.
    pub fn put(
        &mut self,
        namespace: &Namespace,
        key: &[u8],
        value: impl Into<Vec<u8>>,
    ) -> TransactionResult<()> {
        self.check_write(namespace, key)?;
        self.changes.record(namespace, key, Some(value.into()));
        Ok(())
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub fn delete(&mut self, namespace: &Namespace, key: &[u8]) -> TransactionResult<()> {
        self.check_write(namespace, key)?;
        self.changes.record(namespace, key, None);
        Ok(())
    }

    /// Visit every key/value pair of a namespace in key byte order.
    ///
    /// Nested namespaces are not visited. A missing namespace visits nothing.
    pub fn for_each<F>(&self, namespace: &Namespace, mut visit: F) -> TransactionResult<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .store
            .read_entries(self.root, namespace)?
            .into_iter()
            .collect();

        if let Some(pending) = self.changes.get(namespace) {
            for (key, value) in pending.writes() {
                match value {
                    Some(value) => {
                        merged.insert(key.to_vec(), value.to_vec());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }

        for (key, value) in &merged {
            visit(key, value);
        }
        Ok(())
    }

    /// List the keys of a namespace in byte order without reading values.
    pub fn keys(&self, namespace: &Namespace) -> TransactionResult<Vec<Vec<u8>>> {
        let mut keys: BTreeSet<Vec<u8>> = self
            .store
            .read_keys(self.root, namespace)?
            .into_iter()
            .collect();

        if let Some(pending) = self.changes.get(namespace) {
            for (key, value) in pending.writes() {
                if value.is_some() {
                    keys.insert(key.to_vec());
                } else {
                    keys.remove(key);
                }
            }
        }

        Ok(keys.into_iter().collect())
    }

    // ==================== Finalization ====================

    /// Make every change of this transaction durable, atomically.
    ///
    /// Returns the new commit, or `None` when nothing changed.
    pub fn commit(mut self) -> TransactionResult<Option<CommitId>> {
        self.finished = true;
        self.require_writable()?;

        if self.changes.is_empty() {
            debug!(tx = %self.id, "commit of empty transaction");
            return Ok(None);
        }

        let summary = self.changes.summary();
        let message = CommitMessage::transaction(&self.id, &summary);

        match self.store.commit_changes(self.base, &self.changes, &message) {
            Ok(commit) => {
                debug!(
                    tx = %self.id,
                    commit = %commit.map(|c| c.short()).unwrap_or_default(),
                    %summary,
                    "committed transaction"
                );
                Ok(commit)
            }
            Err(source) => {
                warn!(tx = %self.id, error = %source, "commit failed, changes discarded");
                Err(TransactionError::Commit {
                    tx_id: self.id.clone(),
                    source,
                })
            }
        }
    }

    /// Discard every change of this transaction.
    pub fn rollback(mut self) {
        self.finished = true;
        debug!(tx = %self.id, "rolled back transaction");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.is_writable() && !self.changes.is_empty() {
            warn!(tx = %self.id, "write transaction dropped without commit, changes discarded");
        } else {
            debug!(tx = %self.id, "transaction dropped");
        }
    }
}
