//! storage layer for refledger
//!
//! this module provides a complete abstraction over git for key-value storage.
//! The upper layers (transaction manager, catalog) use this API and never
//! touch git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        GitStore                             │
//! │    (bare repository, snapshot reads, atomic commits)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │   commit    │       │    refs     │
//!  │ (namespaces)│       │  (history)  │       │   (main)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!  ```
//!
//! A namespace is a nested git tree, a value is a blob, and the committed
//! state of the whole store is the tree of the commit `main` points at.
//!
//! # Usage
//!
//! ```ignore
//! use refledger::storage::{GitStore, Namespace, NamespaceChanges, StoreOptions};
//!
//! let store = GitStore::open_or_init("./ledger", &StoreOptions::default())?;
//! let base = store.head()?;
//!
//! let mut changes = NamespaceChanges::new();
//! changes.record(&Namespace::new("repositories"), b"proj1", Some(bytes));
//! store.commit_changes(base, &changes, "[TX] example")?;
//! ```

mod commit;
mod error;
mod refs;
mod store;
mod tree;
mod types;

// Re-export public API
pub use commit::{CommitInfo, CommitMessage};
pub use error::{StorageError, StorageResult};
pub use refs::{MAIN_BRANCH, MAIN_REF};
pub use store::{GitStore, StoreOptions};
pub use tree::{ChangeSummary, NamespaceChanges};
pub use types::{CommitId, GitSignature, Namespace, TreeId};
