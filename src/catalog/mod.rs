//! Catalog module: repository records and their refs.
//!
//! Both stores run every operation in exactly one transaction of the
//! [`TransactionManager`](crate::transaction::TransactionManager) they are
//! built on. Writes are all-or-nothing; reads never see a partial write.

mod codec;
mod error;
pub(crate) mod namespaces;
mod refs;
mod repositories;
mod types;

pub use error::{CatalogError, CatalogResult};
pub use namespaces::{PENDING_REPOSITORIES, REFS, REPOSITORIES};
pub use refs::RefStore;
pub use repositories::RepositoryStore;
pub use types::{Hash, HashParseError, Repository, RepositoryStatus};
