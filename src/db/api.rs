//! Database API - high-level interface for refledger.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::catalog::namespaces::{pending_repositories, refs_root, repositories};
use crate::catalog::{CatalogError, RefStore, RepositoryStore};
use crate::storage::{CommitId, CommitInfo, GitSignature, GitStore, StorageError, StoreOptions};
use crate::transaction::{TransactionError, TransactionManager, TransactionResult};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("database not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Database configuration options.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database directory (a bare git repository).
    pub path: PathBuf,
    /// Create if doesn't exist.
    pub create_if_missing: bool,
    /// Flush objects to disk before a commit becomes visible.
    pub sync_writes: bool,
    /// Name recorded on transaction commits.
    pub signature_name: String,
    /// Email recorded on transaction commits.
    pub signature_email: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let signature = GitSignature::refledger();
        Self {
            path: PathBuf::from(".refledger"),
            create_if_missing: true,
            sync_writes: true,
            signature_name: signature.name,
            signature_email: signature.email,
        }
    }
}

impl DatabaseConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set sync_writes flag.
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Set the commit signature.
    pub fn signature(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.signature_name = name.into();
        self.signature_email = email.into();
        self
    }

    /// Check the configuration before anything touches the disk.
    pub fn validate(&self) -> DatabaseResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(DatabaseError::InvalidConfig("database path is empty".to_string()));
        }
        for (field, value) in [
            ("signature name", &self.signature_name),
            ("signature email", &self.signature_email),
        ] {
            if value.trim().is_empty() {
                return Err(DatabaseError::InvalidConfig(format!("{} is empty", field)));
            }
            if value.contains(['<', '>', '\n']) {
                return Err(DatabaseError::InvalidConfig(format!(
                    "{} contains '<', '>' or a newline",
                    field
                )));
            }
        }
        Ok(())
    }

    fn store_options(&self) -> StoreOptions {
        StoreOptions {
            sync_writes: self.sync_writes,
            signature: GitSignature::new(&self.signature_name, &self.signature_email),
        }
    }
}

/// Counts over the committed state of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub repositories: usize,
    pub pending_repositories: usize,
    pub ref_tables: usize,
    pub refs: usize,
    pub commits: usize,
    pub head: CommitId,
}

impl fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "repositories: {}", self.repositories)?;
        writeln!(f, "pending:      {}", self.pending_repositories)?;
        writeln!(f, "ref tables:   {}", self.ref_tables)?;
        writeln!(f, "refs:         {}", self.refs)?;
        writeln!(f, "commits:      {}", self.commits)?;
        write!(f, "head:         {}", self.head)
    }
}

/// The main database handle.
///
/// Cheap to clone; all clones share one store and its writer slot.
#[derive(Clone)]
pub struct Database {
    config: DatabaseConfig,
    transactions: TransactionManager,
    repositories: RepositoryStore,
    refs: RefStore,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        Self::open_with_config(DatabaseConfig::new(path.as_ref()))
    }

    /// Open or create a database with custom configuration.
    pub fn open_with_config(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        let options = config.store_options();

        let store = if config.create_if_missing {
            GitStore::open_or_init(&config.path, &options)?
        } else if config.path.exists() {
            GitStore::open(&config.path, &options)?
        } else {
            return Err(DatabaseError::NotFound(config.path.clone()));
        };

        info!(path = %config.path.display(), "database ready");

        let transactions = TransactionManager::new(store);
        Ok(Self {
            repositories: RepositoryStore::new(transactions.clone()),
            refs: RefStore::new(transactions.clone()),
            transactions,
            config,
        })
    }

    /// Repository records and the pending index.
    pub fn repositories(&self) -> &RepositoryStore {
        &self.repositories
    }

    /// Ref tables.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Raw transactions on the underlying store.
    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Get commit history, newest first.
    pub fn history(&self, limit: Option<usize>) -> DatabaseResult<Vec<CommitInfo>> {
        Ok(self.transactions.history(limit)?)
    }

    /// Get database statistics from one consistent snapshot.
    pub fn stats(&self) -> DatabaseResult<DatabaseStats> {
        let (head, repositories, pending_repositories, ref_tables, refs) =
            self.transactions.view(|tx| -> TransactionResult<_> {
                let tables = tx.child_namespaces(&refs_root())?;
                let mut refs = 0;
                for table in &tables {
                    refs += tx.keys(&refs_root().child(table))?.len();
                }
                Ok((
                    tx.base_commit(),
                    tx.keys(&repositories())?.len(),
                    tx.keys(&pending_repositories())?.len(),
                    tables.len(),
                    refs,
                ))
            })?;

        let commits = self.transactions.history(None)?.len();

        Ok(DatabaseStats {
            repositories,
            pending_repositories,
            ref_tables,
            refs,
            commits,
            head,
        })
    }
}
