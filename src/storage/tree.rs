//!  tree operations for namespace management.
//!
//! in Git, a tree is a directory. In the store:
//! - the root tree contains the top-level namespaces
//! - a namespace tree contains value blobs and nested namespace trees
//! - entry names are `b.<hex>` for namespaces and `k.<hex>` for keys
//!
//! hex-encoding every name lets arbitrary key bytes live in a git tree,
//! keeps byte order of keys equal to the order of their entry names, and
//! makes it impossible for a key to shadow a namespace of the same name.

use std::collections::BTreeMap;
use std::fmt;

use git2::{FileMode, ObjectType, Repository, Tree};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Namespace, TreeId};

const NAMESPACE_PREFIX: &str = "b.";
const KEY_PREFIX: &str = "k.";

/// tree entry name for a namespace component
pub(crate) fn namespace_entry_name(component: &[u8]) -> String {
    format!("{}{}", NAMESPACE_PREFIX, hex::encode(component))
}

/// tree entry name for a key
pub(crate) fn key_entry_name(key: &[u8]) -> String {
    format!("{}{}", KEY_PREFIX, hex::encode(key))
}

/// a decoded tree entry name
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryName {
    Namespace(Vec<u8>),
    Key(Vec<u8>),
}

fn parse_entry_name(name: &str) -> Option<EntryName> {
    if let Some(encoded) = name.strip_prefix(NAMESPACE_PREFIX) {
        return hex::decode(encoded).ok().map(EntryName::Namespace);
    }
    if let Some(encoded) = name.strip_prefix(KEY_PREFIX) {
        return hex::decode(encoded).ok().map(EntryName::Key);
    }
    None
}

/// A read only handle to a namespace tree at a specific commit
///
/// think of it as a snapshot - it won't change even if new commits are made.
#[derive(Debug)]
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    /// create a TreeHandle from a git2::Tree
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    /// get the tree ID
    pub fn id(&self) -> TreeId {
        TreeId::new(self.tree.id())
    }

    /// get the underlying git2::Tree (for internal use)
    pub(crate) fn inner(&self) -> &Tree<'repo> {
        &self.tree
    }

    /// descend into a nested namespace, `None` if any level is missing
    pub fn namespace(
        &self,
        repo: &'repo Repository,
        namespace: &Namespace,
    ) -> StorageResult<Option<TreeHandle<'repo>>> {
        let mut current = self.tree.clone();

        for component in namespace.components() {
            let name = namespace_entry_name(component);
            let next = match current.get_name(&name) {
                Some(entry) => {
                    if entry.kind() != Some(ObjectType::Tree) {
                        return Err(StorageError::UnexpectedEntryType {
                            path: namespace.to_string(),
                            expected: "tree (namespace)".to_string(),
                            found: format!("{:?}", entry.kind()),
                        });
                    }
                    repo.find_tree(entry.id())?
                }
                None => return Ok(None),
            };
            current = next;
        }

        Ok(Some(TreeHandle::new(current)))
    }

    /// read the value stored under `key` in this namespace
    pub fn get(&self, repo: &Repository, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let name = key_entry_name(key);
        match self.tree.get_name(&name) {
            Some(entry) => {
                if entry.kind() != Some(ObjectType::Blob) {
                    return Err(StorageError::UnexpectedEntryType {
                        path: name,
                        expected: "blob (value)".to_string(),
                        found: format!("{:?}", entry.kind()),
                    });
                }
                let blob = repo.find_blob(entry.id())?;
                Ok(Some(blob.content().to_vec()))
            }
            None => Ok(None),
        }
    }

    /// list all keys in this namespace, in byte order
    pub fn keys(&self) -> StorageResult<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for entry in self.parsed_entries()? {
            if let (EntryName::Key(key), _) = entry {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// list all key/value pairs in this namespace, in key byte order
    pub fn entries(&self, repo: &Repository) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        for entry in self.parsed_entries()? {
            if let (EntryName::Key(key), oid) = entry {
                let blob = repo.find_blob(oid)?;
                entries.push((key, blob.content().to_vec()));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// list the names of namespaces nested directly in this one
    pub fn namespaces(&self) -> StorageResult<Vec<Vec<u8>>> {
        let mut names = Vec::new();
        for entry in self.parsed_entries()? {
            if let (EntryName::Namespace(name), _) = entry {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// decode every entry, checking that its object type matches its name
    fn parsed_entries(&self) -> StorageResult<Vec<(EntryName, git2::Oid)>> {
        let mut parsed = Vec::with_capacity(self.tree.len());

        for entry in self.tree.iter() {
            let raw_name = entry.name().ok_or_else(|| StorageError::CorruptedData {
                path: self.tree.id().to_string(),
                reason: "tree entry name is not valid utf-8".to_string(),
            })?;
            let name = parse_entry_name(raw_name).ok_or_else(|| StorageError::CorruptedData {
                path: raw_name.to_string(),
                reason: "unrecognised tree entry name".to_string(),
            })?;

            let expected = match name {
                EntryName::Namespace(_) => ObjectType::Tree,
                EntryName::Key(_) => ObjectType::Blob,
            };
            if entry.kind() != Some(expected) {
                return Err(StorageError::UnexpectedEntryType {
                    path: raw_name.to_string(),
                    expected: format!("{:?}", expected),
                    found: format!("{:?}", entry.kind()),
                });
            }

            parsed.push((name, entry.id()));
        }

        Ok(parsed)
    }
}

/// Uncommitted changes to a namespace and everything nested below it.
///
/// The root instance stands for the root tree and only ever has children.
/// Every child node exists because the namespace was ensured inside the
/// transaction; `writes` maps keys to a new value or `None` for a delete.
///
/// # Usage Pattern
///
/// ```ignore
/// let mut changes = NamespaceChanges::new();
/// changes.ensure(&Namespace::new("repositories"));
/// changes.record(&Namespace::new("repositories"), b"proj1", Some(bytes));
/// let new_tree_id = changes.write(repo, Some(&base_tree))?;
/// ```
#[derive(Debug, Default)]
pub struct NamespaceChanges {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    children: BTreeMap<Vec<u8>, NamespaceChanges>,
}

impl NamespaceChanges {
    /// an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// true when nothing was ensured, written or deleted
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.children.is_empty()
    }

    /// mark a namespace (and all its parents) as created
    pub fn ensure(&mut self, namespace: &Namespace) -> &mut NamespaceChanges {
        let mut node = self;
        for component in namespace.components() {
            node = node.children.entry(component.clone()).or_default();
        }
        node
    }

    /// the pending node for a namespace, if it was ensured
    pub fn get(&self, namespace: &Namespace) -> Option<&NamespaceChanges> {
        let mut node = self;
        for component in namespace.components() {
            node = node.children.get(component)?;
        }
        Some(node)
    }

    /// record a write (`Some`) or delete (`None`) of a key
    pub fn record(&mut self, namespace: &Namespace, key: &[u8], value: Option<Vec<u8>>) {
        self.ensure(namespace).writes.insert(key.to_vec(), value);
    }

    /// pending state of a key in this node: `Some(Some(_))` written,
    /// `Some(None)` deleted, `None` untouched
    pub fn lookup(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.writes.get(key).map(|value| value.as_deref())
    }

    /// pending writes of this node, in key order
    pub fn writes(&self) -> impl Iterator<Item = (&[u8], Option<&[u8]>)> {
        self.writes
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_deref()))
    }

    /// names of the namespaces ensured directly below this node
    pub fn child_names(&self) -> impl Iterator<Item = &[u8]> {
        self.children.keys().map(|name| name.as_slice())
    }

    /// count what this change set touches
    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        self.accumulate(&mut summary);
        summary
    }

    fn accumulate(&self, summary: &mut ChangeSummary) {
        for value in self.writes.values() {
            match value {
                Some(_) => summary.puts += 1,
                None => summary.deletes += 1,
            }
        }
        for child in self.children.values() {
            summary.namespaces += 1;
            child.accumulate(summary);
        }
    }

    /// write all changes on top of `base` and return the new tree ID
    ///
    /// this is where the magic happens - we rebuild the tree hierarchy
    /// bottom-up, reusing every untouched subtree of `base`.
    pub fn write(&self, repo: &Repository, base: Option<&Tree<'_>>) -> StorageResult<TreeId> {
        let mut builder = repo.treebuilder(base)?;

        for (key, value) in &self.writes {
            let name = key_entry_name(key);
            match value {
                Some(bytes) => {
                    let blob_id = repo.blob(bytes)?;
                    builder.insert(&name, blob_id, FileMode::Blob.into())?;
                }
                None => {
                    // git2 errors when removing a missing entry
                    if builder.get(&name)?.is_some() {
                        builder.remove(&name)?;
                    }
                }
            }
        }

        for (component, child) in &self.children {
            let name = namespace_entry_name(component);
            let child_base = match base.and_then(|tree| tree.get_name(&name)) {
                Some(entry) => {
                    if entry.kind() != Some(ObjectType::Tree) {
                        return Err(StorageError::UnexpectedEntryType {
                            path: name,
                            expected: "tree (namespace)".to_string(),
                            found: format!("{:?}", entry.kind()),
                        });
                    }
                    Some(repo.find_tree(entry.id())?)
                }
                None => None,
            };
            let child_id = child.write(repo, child_base.as_ref())?;
            builder.insert(&name, child_id.raw(), FileMode::Tree.into())?;
        }

        Ok(TreeId::new(builder.write()?))
    }
}

/// counts of what a transaction changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub namespaces: usize,
    pub puts: usize,
    pub deletes: usize,
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} put(s), {} delete(s) across {} namespace(s)",
            self.puts, self.deletes, self.namespaces
        )
    }
}

/// helper function to create the empty root tree of a new store
pub fn create_empty_tree(repo: &Repository) -> StorageResult<TreeId> {
    let builder = repo.treebuilder(None)?;
    Ok(TreeId::new(builder.write()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        (dir, repo)
    }

    fn write_and_load<'r>(
        repo: &'r Repository,
        changes: &NamespaceChanges,
        base: Option<&Tree<'_>>,
    ) -> TreeHandle<'r> {
        let tree_id = changes.write(repo, base).unwrap();
        TreeHandle::new(repo.find_tree(tree_id.raw()).unwrap())
    }

    #[test]
    fn test_entry_names() {
        assert_eq!(namespace_entry_name(b"refs"), "b.72656673");
        assert_eq!(key_entry_name(b"a"), "k.61");
        assert_eq!(
            parse_entry_name("k.61"),
            Some(EntryName::Key(b"a".to_vec()))
        );
        assert_eq!(
            parse_entry_name("b.72656673"),
            Some(EntryName::Namespace(b"refs".to_vec()))
        );
        assert_eq!(parse_entry_name("k.zz"), None);
        assert_eq!(parse_entry_name("README"), None);
    }

    #[test]
    fn test_empty_key_has_entry_name() {
        assert_eq!(key_entry_name(b""), "k.");
        assert_eq!(parse_entry_name("k."), Some(EntryName::Key(Vec::new())));
    }

    #[test]
    fn test_write_and_read_nested() {
        let (_dir, repo) = setup_repo();
        let refs = Namespace::new("refs").child("repoA");

        let mut changes = NamespaceChanges::new();
        changes.record(&refs, b"master", Some(vec![1, 2, 3]));
        let root = write_and_load(&repo, &changes, None);

        let table = root.namespace(&repo, &refs).unwrap().unwrap();
        assert_eq!(table.get(&repo, b"master").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(table.get(&repo, b"feature").unwrap(), None);

        let parent = root.namespace(&repo, &Namespace::new("refs")).unwrap().unwrap();
        assert_eq!(parent.namespaces().unwrap(), vec![b"repoA".to_vec()]);
        assert!(parent.keys().unwrap().is_empty());
    }

    #[test]
    fn test_missing_namespace() {
        let (_dir, repo) = setup_repo();
        let mut changes = NamespaceChanges::new();
        changes.ensure(&Namespace::new("repositories"));
        let root = write_and_load(&repo, &changes, None);

        assert!(root
            .namespace(&repo, &Namespace::new("pendingrepositories"))
            .unwrap()
            .is_none());
        let repos = root.namespace(&repo, &Namespace::new("repositories")).unwrap().unwrap();
        assert!(repos.keys().unwrap().is_empty());
    }

    #[test]
    fn test_keys_in_byte_order() {
        let (_dir, repo) = setup_repo();
        let ns = Namespace::new("ordered");

        let mut changes = NamespaceChanges::new();
        for key in [&b"b"[..], b"ab", b"a", b"\xff", b"B"] {
            changes.record(&ns, key, Some(Vec::new()));
        }
        let root = write_and_load(&repo, &changes, None);
        let handle = root.namespace(&repo, &ns).unwrap().unwrap();

        let keys = handle.keys().unwrap();
        assert_eq!(
            keys,
            vec![b"B".to_vec(), b"a".to_vec(), b"ab".to_vec(), b"b".to_vec(), b"\xff".to_vec()]
        );
    }

    #[test]
    fn test_delete_on_top_of_base() {
        let (_dir, repo) = setup_repo();
        let ns = Namespace::new("pendingrepositories");

        let mut first = NamespaceChanges::new();
        first.record(&ns, b"p1", Some(Vec::new()));
        first.record(&ns, b"p2", Some(Vec::new()));
        let base = write_and_load(&repo, &first, None);

        let mut second = NamespaceChanges::new();
        second.record(&ns, b"p1", None);
        second.record(&ns, b"never-there", None);
        let root = write_and_load(&repo, &second, Some(base.inner()));

        let handle = root.namespace(&repo, &ns).unwrap().unwrap();
        assert_eq!(handle.keys().unwrap(), vec![b"p2".to_vec()]);
    }

    #[test]
    fn test_untouched_subtrees_are_reused() {
        let (_dir, repo) = setup_repo();
        let keep = Namespace::new("keep");
        let edit = Namespace::new("edit");

        let mut first = NamespaceChanges::new();
        first.record(&keep, b"k", Some(b"v".to_vec()));
        first.record(&edit, b"k", Some(b"v".to_vec()));
        let base = write_and_load(&repo, &first, None);
        let kept_before = base.namespace(&repo, &keep).unwrap().unwrap().id();

        let mut second = NamespaceChanges::new();
        second.record(&edit, b"k", Some(b"w".to_vec()));
        let root = write_and_load(&repo, &second, Some(base.inner()));

        let kept_after = root.namespace(&repo, &keep).unwrap().unwrap().id();
        assert_eq!(kept_before, kept_after);
        let edited = root.namespace(&repo, &edit).unwrap().unwrap();
        assert_eq!(edited.get(&repo, b"k").unwrap(), Some(b"w".to_vec()));
    }

    #[test]
    fn test_rewriting_identical_content_keeps_tree_id() {
        let (_dir, repo) = setup_repo();
        let ns = Namespace::new("repositories");

        let mut first = NamespaceChanges::new();
        first.record(&ns, b"proj1", Some(b"record".to_vec()));
        let base = write_and_load(&repo, &first, None);

        let mut again = NamespaceChanges::new();
        again.record(&ns, b"proj1", Some(b"record".to_vec()));
        let root = write_and_load(&repo, &again, Some(base.inner()));

        assert_eq!(base.id(), root.id());
    }

    #[test]
    fn test_key_and_namespace_with_same_name_coexist() {
        let (_dir, repo) = setup_repo();
        let parent = Namespace::new("parent");

        let mut changes = NamespaceChanges::new();
        changes.record(&parent, b"child", Some(b"value".to_vec()));
        changes.record(&parent.child("child"), b"inner", Some(b"nested".to_vec()));
        let root = write_and_load(&repo, &changes, None);

        let handle = root.namespace(&repo, &parent).unwrap().unwrap();
        assert_eq!(handle.get(&repo, b"child").unwrap(), Some(b"value".to_vec()));
        let nested = root.namespace(&repo, &parent.child("child")).unwrap().unwrap();
        assert_eq!(nested.get(&repo, b"inner").unwrap(), Some(b"nested".to_vec()));
    }

    #[test]
    fn test_summary() {
        let mut changes = NamespaceChanges::new();
        let repos = Namespace::new("repositories");
        let pending = Namespace::new("pendingrepositories");
        changes.record(&repos, b"p", Some(b"x".to_vec()));
        changes.record(&pending, b"p", None);

        let summary = changes.summary();
        assert_eq!(summary, ChangeSummary { namespaces: 2, puts: 1, deletes: 1 });
        assert_eq!(summary.to_string(), "1 put(s), 1 delete(s) across 2 namespace(s)");
    }

    #[test]
    fn test_lookup_and_get() {
        let mut changes = NamespaceChanges::new();
        let ns = Namespace::new("repositories");
        assert!(changes.is_empty());
        assert!(changes.get(&ns).is_none());

        changes.record(&ns, b"a", Some(b"1".to_vec()));
        changes.record(&ns, b"b", None);

        let node = changes.get(&ns).unwrap();
        assert_eq!(node.lookup(b"a"), Some(Some(&b"1"[..])));
        assert_eq!(node.lookup(b"b"), Some(None));
        assert_eq!(node.lookup(b"c"), None);
        assert!(!changes.is_empty());
    }
}
