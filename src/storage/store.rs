//!   Core Git store wrapper.
//!
//!  This is the central component of the storage layer. It wraps a bare
//!  `git2::Repository` with thread-safe access and provides the snapshot
//!  reads and atomic commits the transaction layer builds on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{ErrorCode, Repository, RepositoryInitOptions};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::{RefManager, MAIN_BRANCH, MAIN_REF};
use crate::storage::tree::NamespaceChanges;
use crate::storage::types::{CommitId, GitSignature, Namespace, TreeId};

/// Options applied when a store is opened or created.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// fsync loose objects before `main` moves
    pub sync_writes: bool,
    /// author/committer of transaction commits
    pub signature: GitSignature,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sync_writes: true,
            signature: GitSignature::refledger(),
        }
    }
}

/// The main Git store wrapper.
///
/// Clone this to share across threads - it uses Arc internally. All clones
/// share one writer slot, so at most one write transaction exists per store.
#[derive(Clone)]
pub struct GitStore {
    inner: Arc<GitStoreInner>,
}

struct GitStoreInner {
    repo: Mutex<Repository>,
    writer: Mutex<()>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitStore {
    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Self::open_repo(path)?;

        // an interrupted init can leave a repository without its first commit
        RefManager::main_commit(&repo)?;
        Self::apply_options(&repo, options)?;

        info!(path = %path.display(), "opened store");
        Ok(Self::from_repo(repo, path, options))
    }

    /// Initialize a new store.
    pub fn init(path: impl AsRef<Path>, options: &StoreOptions) -> StorageResult<Self> {
        let path = path.as_ref();

        let mut init_opts = RepositoryInitOptions::new();
        init_opts.bare(true).initial_head(MAIN_BRANCH);
        let repo = Repository::init_opts(path, &init_opts)?;

        Self::bootstrap(repo, path, options)
    }

    /// Open or initialize a store.
    ///
    /// A repository left without its first commit by an interrupted init is
    /// initialized in place.
    pub fn open_or_init(path: impl AsRef<Path>, options: &StoreOptions) -> StorageResult<Self> {
        let path = path.as_ref();
        if !path.join("HEAD").exists() {
            return Self::init(path, options);
        }

        match Self::open(path, options) {
            Err(StorageError::EmptyStore) => {
                warn!(path = %path.display(), "store has no commits, finishing initialization");
                Self::bootstrap(Self::open_repo(path)?, path, options)
            }
            other => other,
        }
    }

    fn open_repo(path: &Path) -> StorageResult<Repository> {
        Repository::open_bare(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                StorageError::NotInitialized(path.to_path_buf())
            } else {
                StorageError::Git(e)
            }
        })
    }

    /// Write the initial commit and point HEAD at `main`.
    fn bootstrap(repo: Repository, path: &Path, options: &StoreOptions) -> StorageResult<Self> {
        Self::apply_options(&repo, options)?;

        let root = commit::create_initial_commit(&repo, &options.signature)?;
        RefManager::init_main_branch(&repo)?;

        info!(path = %path.display(), commit = %root.short(), "initialized store");
        Ok(Self::from_repo(repo, path, options))
    }

    fn from_repo(repo: Repository, path: &Path, options: &StoreOptions) -> Self {
        Self {
            inner: Arc::new(GitStoreInner {
                repo: Mutex::new(repo),
                writer: Mutex::new(()),
                path: path.to_path_buf(),
                signature: options.signature.clone(),
            }),
        }
    }

    fn apply_options(repo: &Repository, options: &StoreOptions) -> StorageResult<()> {
        let mut config = repo.config()?;
        config.set_bool("core.fsyncObjectFiles", options.sync_writes)?;
        Ok(())
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// Claim the single writer slot, blocking until it is free.
    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.inner.writer.lock()
    }

    // ==================== Snapshot Reads ====================

    /// Get the current tip of `main`.
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::main_commit)
    }

    /// Get the root tree of a commit.
    pub fn root_tree(&self, at: CommitId) -> StorageResult<TreeId> {
        self.with_repo(|repo| Ok(commit::get_tree_at_commit(repo, at)?.id()))
    }

    /// Check whether a namespace exists in a snapshot.
    pub fn has_namespace(&self, root: TreeId, namespace: &Namespace) -> StorageResult<bool> {
        self.with_repo(|repo| {
            let tree = commit::get_tree(repo, root)?;
            Ok(tree.namespace(repo, namespace)?.is_some())
        })
    }

    /// Read one value from a snapshot.
    pub fn read_value(
        &self,
        root: TreeId,
        namespace: &Namespace,
        key: &[u8],
    ) -> StorageResult<Option<Vec<u8>>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree(repo, root)?;
            match tree.namespace(repo, namespace)? {
                Some(handle) => handle.get(repo, key),
                None => Ok(None),
            }
        })
    }

    /// Read all keys of a namespace in a snapshot (empty if it is missing).
    pub fn read_keys(&self, root: TreeId, namespace: &Namespace) -> StorageResult<Vec<Vec<u8>>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree(repo, root)?;
            match tree.namespace(repo, namespace)? {
                Some(handle) => handle.keys(),
                None => Ok(Vec::new()),
            }
        })
    }

    /// Read all key/value pairs of a namespace in a snapshot.
    pub fn read_entries(
        &self,
        root: TreeId,
        namespace: &Namespace,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree(repo, root)?;
            match tree.namespace(repo, namespace)? {
                Some(handle) => handle.entries(repo),
                None => Ok(Vec::new()),
            }
        })
    }

    /// Read the names of namespaces nested directly in `namespace`.
    pub fn read_child_namespaces(
        &self,
        root: TreeId,
        namespace: &Namespace,
    ) -> StorageResult<Vec<Vec<u8>>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree(repo, root)?;
            match tree.namespace(repo, namespace)? {
                Some(handle) => handle.namespaces(),
                None => Ok(Vec::new()),
            }
        })
    }

    // ==================== Commits ====================

    /// Write `changes` on top of `base` and move `main` to the result.
    ///
    /// Returns `None` when the changes leave the tree exactly as it was; no
    /// commit is created then. Objects are written before `main` moves, so a
    /// crash at any point leaves `main` either at `base` or at the new commit.
    pub fn commit_changes(
        &self,
        base: CommitId,
        changes: &NamespaceChanges,
        message: &str,
    ) -> StorageResult<Option<CommitId>> {
        self.with_repo(|repo| {
            let base_tree = commit::get_tree_at_commit(repo, base)?;
            let new_tree = changes.write(repo, Some(base_tree.inner()))?;

            if new_tree == base_tree.id() {
                debug!(base = %base.short(), "no effective changes, skipping commit");
                return Ok(None);
            }

            let commit_id = CommitBuilder::new(repo)
                .tree(new_tree)
                .parent(base)
                .message(message)
                .signature(self.inner.signature.clone())
                .commit()?;

            RefManager::update_if_unchanged(repo, MAIN_REF, base, commit_id)?;
            Ok(Some(commit_id))
        })
    }

    /// Get commit history of `main`, newest first.
    pub fn history(&self, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| {
            let head = RefManager::main_commit(repo)?;
            let iter = commit::history(repo, head)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitStore) {
        let dir = TempDir::new().unwrap();
        let store = GitStore::init(dir.path(), &StoreOptions::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_init_and_open() {
        let dir = TempDir::new().unwrap();

        let store = GitStore::init(dir.path(), &StoreOptions::default()).unwrap();
        let head1 = store.head().unwrap();

        drop(store);
        let store = GitStore::open(dir.path(), &StoreOptions::default()).unwrap();
        let head2 = store.head().unwrap();

        assert_eq!(head1, head2);
    }

    #[test]
    fn test_open_or_init() {
        let dir = TempDir::new().unwrap();

        let store1 = GitStore::open_or_init(dir.path(), &StoreOptions::default()).unwrap();
        let head1 = store1.head().unwrap();

        drop(store1);
        let store2 = GitStore::open_or_init(dir.path(), &StoreOptions::default()).unwrap();
        assert_eq!(head1, store2.head().unwrap());
    }

    #[test]
    fn test_open_missing_store() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let result = GitStore::open(&missing, &StoreOptions::default());
        assert!(matches!(result, Err(StorageError::NotInitialized(_))));
    }

    #[test]
    fn test_open_or_init_finishes_interrupted_init() {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.bare(true).initial_head(MAIN_BRANCH);
        Repository::init_opts(dir.path(), &opts).unwrap();

        // no first commit: a plain open refuses the store
        let result = GitStore::open(dir.path(), &StoreOptions::default());
        assert!(matches!(result, Err(StorageError::EmptyStore)));

        let store = GitStore::open_or_init(dir.path(), &StoreOptions::default()).unwrap();
        let head = store.head().unwrap();
        assert_eq!(store.history(None).unwrap().len(), 1);

        drop(store);
        let store = GitStore::open(dir.path(), &StoreOptions::default()).unwrap();
        assert_eq!(store.head().unwrap(), head);
    }

    #[test]
    fn test_open_non_repository_directory() {
        let dir = TempDir::new().unwrap();
        let result = GitStore::open(dir.path(), &StoreOptions::default());
        assert!(matches!(result, Err(StorageError::NotInitialized(_))));
    }

    #[test]
    fn test_sync_writes_configured() {
        let dir = TempDir::new().unwrap();
        let options = StoreOptions {
            sync_writes: false,
            ..StoreOptions::default()
        };
        let store = GitStore::init(dir.path(), &options).unwrap();

        let value = store
            .with_repo(|repo| Ok(repo.config()?.get_bool("core.fsyncObjectFiles")?))
            .unwrap();
        assert!(!value);
    }

    #[test]
    fn test_commit_changes_and_read_back() {
        let (_dir, store) = setup();
        let base = store.head().unwrap();
        let ns = Namespace::new("repositories");

        let mut changes = NamespaceChanges::new();
        changes.record(&ns, b"proj1", Some(b"record".to_vec()));
        let commit = store.commit_changes(base, &changes, "test").unwrap().unwrap();
        assert_eq!(store.head().unwrap(), commit);

        let new_root = store.root_tree(commit).unwrap();
        assert_eq!(
            store.read_value(new_root, &ns, b"proj1").unwrap(),
            Some(b"record".to_vec())
        );
        assert_eq!(store.read_keys(new_root, &ns).unwrap(), vec![b"proj1".to_vec()]);

        // the old snapshot is untouched
        let old_root = store.root_tree(base).unwrap();
        assert!(!store.has_namespace(old_root, &ns).unwrap());
        assert_eq!(store.read_value(old_root, &ns, b"proj1").unwrap(), None);
        assert!(store.read_entries(old_root, &ns).unwrap().is_empty());
    }

    #[test]
    fn test_commit_without_effect_is_skipped() {
        let (_dir, store) = setup();
        let base = store.head().unwrap();

        let changes = NamespaceChanges::new();
        assert_eq!(store.commit_changes(base, &changes, "noop").unwrap(), None);
        assert_eq!(store.head().unwrap(), base);
    }

    #[test]
    fn test_stale_base_is_rejected() {
        let (_dir, store) = setup();
        let base = store.head().unwrap();
        let ns = Namespace::new("refs").child("repoA");

        let mut first = NamespaceChanges::new();
        first.record(&ns, b"master", Some(vec![1; 32]));
        let winner = store.commit_changes(base, &first, "first").unwrap().unwrap();

        let mut second = NamespaceChanges::new();
        second.record(&ns, b"master", Some(vec![2; 32]));
        let result = store.commit_changes(base, &second, "second");

        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));
        assert_eq!(store.head().unwrap(), winner);
    }

    #[test]
    fn test_child_namespaces() {
        let (_dir, store) = setup();
        let base = store.head().unwrap();
        let refs = Namespace::new("refs");

        let mut changes = NamespaceChanges::new();
        changes.ensure(&refs.child("repoB"));
        changes.record(&refs.child("repoA"), b"master", Some(vec![1; 32]));
        let commit = store.commit_changes(base, &changes, "refs").unwrap().unwrap();

        let root = store.root_tree(commit).unwrap();
        assert_eq!(
            store.read_child_namespaces(root, &refs).unwrap(),
            vec![b"repoA".to_vec(), b"repoB".to_vec()]
        );
    }

    #[test]
    fn test_history() {
        let (_dir, store) = setup();
        let base = store.head().unwrap();

        let mut changes = NamespaceChanges::new();
        changes.record(&Namespace::new("repositories"), b"p", Some(b"x".to_vec()));
        let commit = store.commit_changes(base, &changes, "[TX] one").unwrap().unwrap();

        let history = store.history(Some(10)).unwrap();
        assert_eq!(history.len(), 2); // init + one transaction
        assert_eq!(history[0].id, commit);
        assert_eq!(history[0].summary(), "[TX] one");
        assert_eq!(history[1].id, base);

        assert_eq!(store.history(Some(1)).unwrap().len(), 1);
    }
}
