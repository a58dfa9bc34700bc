//! Namespace layout of the catalog.
//!
//! ```text
//! repositories/         name -> repository record
//! pendingrepositories/  name -> empty marker
//! refs/<repository>/    ref name -> 32 hash bytes
//! ```

use crate::storage::Namespace;

pub const REPOSITORIES: &str = "repositories";
pub const PENDING_REPOSITORIES: &str = "pendingrepositories";
pub const REFS: &str = "refs";

pub(crate) fn repositories() -> Namespace {
    Namespace::new(REPOSITORIES)
}

pub(crate) fn pending_repositories() -> Namespace {
    Namespace::new(PENDING_REPOSITORIES)
}

/// Parent of every ref table.
pub(crate) fn refs_root() -> Namespace {
    Namespace::new(REFS)
}

/// Ref table of one repository. The name is its own path component, so
/// no repository can reach into another one's table.
pub(crate) fn refs_of(repository: &str) -> Namespace {
    refs_root().child(repository)
}
