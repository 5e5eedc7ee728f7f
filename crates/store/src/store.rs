//! Cluster store trait definition.
//!
//! [`ClusterStore`] is the narrow slice of the control-plane API that the
//! credential reapers depend on: read a versioned record, write it back
//! under an optimistic-concurrency check, and delete a record by name.
//!
//! # Implementing a Store
//!
//! 1. Implement [`ClusterStore`] over the real control-plane client
//! 2. Map client errors to [`StorageError`](crate::StorageError); a stale
//!    version token must surface as [`StorageError::Conflict`](crate::StorageError::Conflict)
//! 3. Run the [`conformance`](crate::conformance) suite against it
//!
//! See [`MemoryClusterStore`](crate::MemoryClusterStore) for a reference implementation.

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    types::{ConfigRecord, ResourceVersion},
};

/// Versioned record store shared by every writer in the cluster.
///
/// Implementations must be thread-safe (`Send + Sync`); the reapers hold
/// them behind `Arc<dyn ClusterStore>` and call them from background tasks.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](ClusterStore::get) | Read a record together with its version token |
/// | [`create`](ClusterStore::create) | Insert a record that must not exist yet |
/// | [`update`](ClusterStore::update) | Replace a record's data if its version is current |
/// | [`delete`](ClusterStore::delete) | Remove a record |
///
/// # Example
///
/// ```
/// use credential_gc_store::{ClusterStore, ConfigRecord, MemoryClusterStore, StorageError};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = MemoryClusterStore::new();
/// let seed = ConfigRecord::builder().namespace("kube-system").name("keys").build();
/// store.create(&seed).await.unwrap();
///
/// let mut record = store.get("kube-system", "keys").await.unwrap().unwrap();
/// record = record.with_entry("sa-key-2025-06-01T00:00:00Z", "blob");
/// store.update(&record).await.unwrap();
///
/// // Writing again with the now-stale version is rejected.
/// let result = store.update(&record).await;
/// assert!(matches!(result, Err(StorageError::Conflict)));
/// # });
/// ```
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Reads a record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` with `record.version` set to the current token
    /// - `Ok(None)` if the record does not exist
    /// - `Err(...)` on store errors
    #[must_use = "store operations may fail and errors must be handled"]
    async fn get(&self, namespace: &str, name: &str) -> StorageResult<Option<ConfigRecord>>;

    /// Creates a record that does not exist yet.
    ///
    /// The version carried by `record` is ignored; the store assigns one and
    /// returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`](crate::StorageError::Conflict) if a
    /// record with the same namespace and name already exists.
    #[must_use = "store operations may fail and errors must be handled"]
    async fn create(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion>;

    /// Replaces a record's data, checking `record.version` against the
    /// stored version.
    ///
    /// On success the store assigns and returns a new version token.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if `record.version` is stale
    /// - [`StorageError::NotFound`](crate::StorageError::NotFound) if the record no longer exists
    #[must_use = "store operations may fail and errors must be handled"]
    async fn update(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) if the
    /// record is already absent. Callers that only need the record gone
    /// should treat this as success.
    #[must_use = "store operations may fail and errors must be handled"]
    async fn delete(&self, namespace: &str, name: &str) -> StorageResult<()>;
}
