//! In-memory cluster store implementation.
//!
//! [`MemoryClusterStore`] implements [`ClusterStore`] over a hash map with
//! the same optimistic-concurrency semantics a control-plane API server
//! enforces: every successful write assigns a new, strictly increasing
//! [`ResourceVersion`], and an update carrying an older version is rejected.
//!
//! # Limitations
//!
//! - Data is not persisted; all records are lost when the process exits
//! - Versions are global to the store, not per record

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    store::ClusterStore,
    types::{ConfigRecord, ResourceVersion, qualified_name},
};

#[derive(Debug, Default)]
struct Inner {
    /// Records indexed by (namespace, name).
    records: HashMap<(String, String), ConfigRecord>,
    /// Last version handed out.
    last_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> ResourceVersion {
        self.last_version += 1;
        ResourceVersion(self.last_version)
    }
}

/// In-memory implementation of [`ClusterStore`] for tests and development.
///
/// # Cloning
///
/// Cloning is cheap; all clones share the same underlying records.
///
/// # Thread Safety
///
/// Uses [`parking_lot::RwLock`]. The lock is never held across an `.await`.
///
/// # Examples
///
/// ```
/// use credential_gc_store::{ClusterStore, ConfigRecord, MemoryClusterStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryClusterStore::new();
///     let secret = ConfigRecord::builder()
///         .namespace("kube-system")
///         .name("node-password-worker-1")
///         .build()
///         .with_entry("hash", "$1$...");
///
///     store.create(&secret).await?;
///     store.delete("kube-system", "node-password-worker-1").await?;
///
///     assert!(store.get("kube-system", "node-password-worker-1").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryClusterStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryClusterStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a record without a version check.
    ///
    /// Models an out-of-band writer (bootstrap process, another control-plane
    /// node). Returns the newly assigned version.
    pub fn put(&self, record: &ConfigRecord) -> ResourceVersion {
        let mut inner = self.inner.write();
        let version = inner.next_version();
        let mut stored = record.clone();
        stored.version = version;
        inner.records.insert(Self::make_key(&record.namespace, &record.name), stored);
        version
    }

    /// Returns `true` if the named record exists.
    #[must_use]
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.inner.read().records.contains_key(&Self::make_key(namespace, name))
    }

    /// Returns the names of all records in a namespace, sorted.
    #[must_use]
    pub fn record_names(&self, namespace: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .records
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Total number of records across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    fn make_key(namespace: &str, name: &str) -> (String, String) {
        (namespace.to_owned(), name.to_owned())
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, namespace: &str, name: &str) -> StorageResult<Option<ConfigRecord>> {
        let inner = self.inner.read();
        Ok(inner.records.get(&Self::make_key(namespace, name)).cloned())
    }

    #[tracing::instrument(skip(self, record), fields(record = %record.qualified_name()))]
    async fn create(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
        let mut inner = self.inner.write();
        let key = Self::make_key(&record.namespace, &record.name);

        if inner.records.contains_key(&key) {
            return Err(StorageError::Conflict);
        }

        let version = inner.next_version();
        let mut stored = record.clone();
        stored.version = version;
        inner.records.insert(key, stored);
        Ok(version)
    }

    #[tracing::instrument(
        skip(self, record),
        fields(record = %record.qualified_name(), version = %record.version)
    )]
    async fn update(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
        let mut inner = self.inner.write();
        let key = Self::make_key(&record.namespace, &record.name);

        let current = match inner.records.get(&key) {
            Some(current) => current.version,
            None => return Err(StorageError::not_found(record.qualified_name())),
        };
        if current != record.version {
            return Err(StorageError::Conflict);
        }

        let version = inner.next_version();
        let mut stored = record.clone();
        stored.version = version;
        inner.records.insert(key, stored);
        Ok(version)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, namespace: &str, name: &str) -> StorageResult<()> {
        let mut inner = self.inner.write();

        if inner.records.remove(&Self::make_key(namespace, name)).is_none() {
            return Err(StorageError::not_found(qualified_name(namespace, name)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{assert_conflict, assert_not_found};

    fn make_record(name: &str) -> ConfigRecord {
        ConfigRecord::builder().namespace("kube-system").name(name).build().with_entry("k", "v")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryClusterStore::new();

        let version = store.create(&make_record("keys")).await.expect("create");
        let record = store.get("kube-system", "keys").await.expect("get").expect("exists");

        assert_eq!(record.version, version);
        assert!(record.contains_entry("k"));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryClusterStore::new();

        let result = store.get("kube-system", "missing").await.expect("get should not error");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_existing_conflicts() {
        let store = MemoryClusterStore::new();
        store.create(&make_record("dup")).await.expect("first create");

        let result = store.create(&make_record("dup")).await;

        assert_conflict!(result);
    }

    #[tokio::test]
    async fn test_update_assigns_new_version() {
        let store = MemoryClusterStore::new();
        store.create(&make_record("keys")).await.expect("create");
        let record = store.get("kube-system", "keys").await.expect("get").expect("exists");

        let new_version = store.update(&record.clone().with_entry("k2", "v2")).await.expect("update");

        assert!(new_version > record.version);
        let stored = store.get("kube-system", "keys").await.expect("get").expect("exists");
        assert_eq!(stored.version, new_version);
        assert!(stored.contains_entry("k2"));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let store = MemoryClusterStore::new();
        store.create(&make_record("keys")).await.expect("create");
        let stale = store.get("kube-system", "keys").await.expect("get").expect("exists");

        // Another writer gets in first.
        store.update(&stale.clone().with_entry("other", "writer")).await.expect("first update");

        let result = store.update(&stale.with_entry("mine", "lost")).await;

        assert_conflict!(result);
        let stored = store.get("kube-system", "keys").await.expect("get").expect("exists");
        assert!(stored.contains_entry("other"));
        assert!(!stored.contains_entry("mine"));
    }

    #[tokio::test]
    async fn test_update_missing_record_not_found() {
        let store = MemoryClusterStore::new();

        let result = store.update(&make_record("ghost")).await;

        assert_not_found!(result);
    }

    #[tokio::test]
    async fn test_put_bypasses_version_check() {
        let store = MemoryClusterStore::new();
        store.create(&make_record("keys")).await.expect("create");
        let read = store.get("kube-system", "keys").await.expect("get").expect("exists");

        let version = store.put(&make_record("keys").with_entry("out-of-band", "x"));

        assert!(version > read.version);
        let result = store.update(&read).await;
        assert_conflict!(result);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryClusterStore::new();
        store.create(&make_record("node-password-a")).await.expect("create");

        store.delete("kube-system", "node-password-a").await.expect("delete");

        assert!(!store.contains("kube-system", "node-password-a"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_not_found() {
        let store = MemoryClusterStore::new();

        let result = store.delete("kube-system", "node-password-ghost").await;

        assert_not_found!(result);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryClusterStore::new();
        let record = make_record("shared");
        store.create(&record).await.expect("create in kube-system");
        let mut other = record.clone();
        other.namespace = "default".to_owned();
        store.create(&other).await.expect("create in default");

        store.delete("default", "shared").await.expect("delete");

        assert!(store.contains("kube-system", "shared"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_record_names_sorted() {
        let store = MemoryClusterStore::new();
        for name in ["node-password-c", "node-password-a", "node-password-b"] {
            store.create(&make_record(name)).await.expect("create");
        }

        assert_eq!(
            store.record_names("kube-system"),
            vec!["node-password-a", "node-password-b", "node-password-c"]
        );
        assert!(store.record_names("default").is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let store = MemoryClusterStore::new();
        let cloned = store.clone();

        store.create(&make_record("shared")).await.expect("create via original");

        assert!(cloned.get("kube-system", "shared").await.expect("get via clone").is_some());
    }
}
