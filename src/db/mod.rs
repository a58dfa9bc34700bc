//! High-level Database API.
//!
//! This module provides the user-facing handle that opens a store from a
//! [`DatabaseConfig`] and hands out the repository and ref stores.

mod api;

pub use api::{Database, DatabaseConfig, DatabaseError, DatabaseResult, DatabaseStats};
