//! Per-repository ref tables.

use tracing::debug;

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::namespaces::{refs_of, refs_root, repositories};
use crate::catalog::repositories::list_names;
use crate::catalog::types::Hash;
use crate::transaction::TransactionManager;

/// Named, mutable hash pointers, one table per repository.
///
/// The repository record does not have to exist for its refs to be
/// written.
#[derive(Clone)]
pub struct RefStore {
    manager: TransactionManager,
}

impl RefStore {
    pub fn new(manager: TransactionManager) -> Self {
        Self { manager }
    }

    /// Create or overwrite a ref.
    pub fn put_ref(&self, repository: &str, name: &str, hash: Hash) -> CatalogResult<()> {
        self.manager.update(|tx| -> CatalogResult<()> {
            tx.ensure_namespace(&repositories())?;

            let table = refs_of(repository);
            tx.ensure_namespace(&table)?;
            tx.put(&table, name.as_bytes(), hash.as_bytes().to_vec())?;
            Ok(())
        })?;

        debug!(repository, ref_name = name, %hash, "put ref");
        Ok(())
    }

    /// Get a ref. A missing ref reads as [`Hash::EMPTY`].
    pub fn get_ref(&self, repository: &str, name: &str) -> CatalogResult<Hash> {
        let bytes = self
            .manager
            .view(|tx| tx.get(&refs_of(repository), name.as_bytes()))?;

        match bytes {
            Some(bytes) => Hash::from_slice(&bytes)
                .map_err(|e| CatalogError::decoding(format!("{}/{}", repository, name), e.to_string())),
            None => Ok(Hash::EMPTY),
        }
    }

    /// Names of the refs of a repository, in byte order.
    pub fn list_refs(&self, repository: &str) -> CatalogResult<Vec<String>> {
        self.manager.view(|tx| list_names(tx, &refs_of(repository)))
    }

    /// Names of the repositories that have a ref table, in byte order.
    pub fn list_ref_tables(&self) -> CatalogResult<Vec<String>> {
        self.manager.view(|tx| -> CatalogResult<Vec<String>> {
            tx.child_namespaces(&refs_root())?
                .into_iter()
                .map(|name| {
                    String::from_utf8(name).map_err(|e| {
                        CatalogError::decoding(
                            String::from_utf8_lossy(e.as_bytes()),
                            "ref table name is not valid UTF-8",
                        )
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::namespaces::{PENDING_REPOSITORIES, REFS, REPOSITORIES};
    use crate::storage::{GitStore, StoreOptions};
    use crate::transaction::TransactionResult;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RefStore) {
        let dir = TempDir::new().unwrap();
        let store = GitStore::init(dir.path(), &StoreOptions::default()).unwrap();
        (dir, RefStore::new(TransactionManager::new(store)))
    }

    fn hash(byte: u8) -> Hash {
        Hash::new([byte; 32])
    }

    #[test]
    fn test_put_get() {
        let (_dir, refs) = setup();
        refs.put_ref("repoA", "master", hash(1)).unwrap();

        assert_eq!(refs.get_ref("repoA", "master").unwrap(), hash(1));
        assert_eq!(refs.get_ref("repoA", "feature").unwrap(), Hash::EMPTY);
    }

    #[test]
    fn test_get_on_empty_store() {
        let (_dir, refs) = setup();
        assert_eq!(refs.get_ref("repoA", "master").unwrap(), Hash::EMPTY);
        assert!(refs.list_refs("repoA").unwrap().is_empty());
        assert!(refs.list_ref_tables().unwrap().is_empty());
    }

    #[test]
    fn test_overwrite() {
        let (_dir, refs) = setup();
        refs.put_ref("repoA", "master", hash(1)).unwrap();
        refs.put_ref("repoA", "master", hash(2)).unwrap();
        assert_eq!(refs.get_ref("repoA", "master").unwrap(), hash(2));
        assert_eq!(refs.list_refs("repoA").unwrap(), vec!["master"]);
    }

    #[test]
    fn test_list_refs() {
        let (_dir, refs) = setup();
        refs.put_ref("repoA", "b", hash(2)).unwrap();
        refs.put_ref("repoA", "a", hash(1)).unwrap();
        assert_eq!(refs.list_refs("repoA").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_tables_are_isolated() {
        let (_dir, refs) = setup();
        refs.put_ref("repoA", "master", hash(1)).unwrap();
        refs.put_ref("repoB", "master", hash(2)).unwrap();
        refs.put_ref("repo", "Amaster", hash(3)).unwrap();

        assert_eq!(refs.get_ref("repoA", "master").unwrap(), hash(1));
        assert_eq!(refs.get_ref("repoB", "master").unwrap(), hash(2));
        assert_eq!(refs.get_ref("repo", "Amaster").unwrap(), hash(3));
        assert_eq!(refs.get_ref("repo", "master").unwrap(), Hash::EMPTY);
        assert_eq!(refs.list_refs("repo").unwrap(), vec!["Amaster"]);
        assert_eq!(refs.list_refs("repoA").unwrap(), vec!["master"]);

        assert_eq!(
            refs.list_ref_tables().unwrap(),
            vec!["repo", "repoA", "repoB"]
        );
    }

    #[test]
    fn test_names_embedding_the_layout() {
        let (_dir, refs) = setup();
        refs.put_ref(REPOSITORIES, "x", hash(1)).unwrap();
        refs.put_ref(PENDING_REPOSITORIES, "x", hash(2)).unwrap();
        refs.put_ref(REFS, "x", hash(3)).unwrap();
        refs.put_ref("refs/repoA", "x", hash(4)).unwrap();

        assert_eq!(refs.get_ref(REPOSITORIES, "x").unwrap(), hash(1));
        assert_eq!(refs.get_ref(PENDING_REPOSITORIES, "x").unwrap(), hash(2));
        assert_eq!(refs.get_ref(REFS, "x").unwrap(), hash(3));
        assert_eq!(refs.get_ref("refs/repoA", "x").unwrap(), hash(4));
        assert_eq!(refs.get_ref("repoA", "x").unwrap(), Hash::EMPTY);

        // none of it leaks into the catalog namespaces
        let keys = refs
            .manager
            .view(|tx| tx.keys(&repositories()))
            .unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_bad_length_is_decoding_error() {
        let (_dir, refs) = setup();
        refs.manager
            .update(|tx| -> TransactionResult<()> {
                let table = refs_of("repoA");
                tx.ensure_namespace(&table)?;
                tx.put(&table, b"master", vec![1; 20])
            })
            .unwrap();

        assert!(matches!(
            refs.get_ref("repoA", "master"),
            Err(CatalogError::Decoding { .. })
        ));
    }

    #[test]
    fn test_concurrent_writers() {
        let (_dir, refs) = setup();

        std::thread::scope(|scope| {
            for t in 0..4u8 {
                let refs = refs.clone();
                scope.spawn(move || {
                    for i in 0..5u8 {
                        refs.put_ref("repoA", &format!("t{}-{}", t, i), hash(t + 1))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(refs.list_refs("repoA").unwrap().len(), 20);
        assert_eq!(refs.get_ref("repoA", "t3-4").unwrap(), hash(4));
    }
}
