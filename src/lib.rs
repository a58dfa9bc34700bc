//! refledger - a Git-backed store for repository records and refs
//!
//! This crate keeps metadata about repositories tracked by a ledger, an
//! index of the ones still pending, and per-repository refs pointing at
//! 32-byte content hashes. Every write is one transaction, every committed
//! transaction is one commit in a bare git repository, and the full history
//! of the store is the history of its `main` branch.
//!
//! # Example
//!
//! ```no_run
//! use refledger::catalog::{Hash, Repository, RepositoryStatus};
//! use refledger::db::Database;
//!
//! let db = Database::open("./ledger").unwrap();
//! db.repositories()
//!     .put_repository(&Repository::new("proj1", RepositoryStatus::Pending, Hash::EMPTY))
//!     .unwrap();
//! db.refs().put_ref("proj1", "master", Hash::new([1; 32])).unwrap();
//! ```

pub mod catalog;
pub mod db;
pub mod storage;
pub mod transaction;
