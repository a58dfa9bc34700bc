//! Transaction management for refledger.
//!
//! This module is the ordered key-value engine the catalog is built on.
//! Every transaction reads from the commit `main` pointed at when it began;
//! a write transaction buffers its changes and turns them into exactly one
//! commit on `main` when it commits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │        (begin, scoped view/update, single writer)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │     Transaction     │
//!                   │ (snapshot + overlay)│
//!                   └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use refledger::transaction::TransactionManager;
//!
//! let manager = TransactionManager::new(store);
//!
//! manager.update(|tx| {
//!     tx.ensure_namespace(&ns)?;
//!     tx.put(&ns, b"proj1", bytes)
//! })?;
//!
//! let value = manager.view(|tx| tx.get(&ns, b"proj1"))?;
//! ```

mod context;
mod error;
mod manager;

pub use context::Transaction;
pub use error::{TransactionError, TransactionResult};
pub use manager::TransactionManager;
