//! Shared test utilities for cluster store consumers.
//!
//! Feature-gated behind `testutil` so none of this leaks into production
//! builds:
//!
//! ```toml
//! [dev-dependencies]
//! credential-gc-store = { path = "../store", features = ["testutil"] }
//! ```
//!
//! Provides record builders, assertion macros over [`StorageResult`], and two
//! [`ClusterStore`] wrappers around [`MemoryClusterStore`]:
//!
//! - [`FailingStore`] injects errors per operation (and per record for deletes), and can simulate
//!   a concurrent writer slipping in between a read and a write
//! - [`CountingStore`] counts calls per operation and can add latency

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use crate::{
    error::{StorageError, StorageResult},
    memory::MemoryClusterStore,
    store::ClusterStore,
    types::{ConfigRecord, ResourceVersion},
};

/// Factory for an injected error. `StorageError` is not `Clone`, so each
/// injection builds a fresh value.
pub type ErrorFactory = fn() -> StorageError;

/// Builds a signing-key entry name `<kid>-<RFC 3339 timestamp>`.
///
/// Timestamps are rendered with second precision and a `Z` suffix, e.g.
/// `sa-key-2025-06-01T00:00:00Z`.
#[must_use]
pub fn key_entry_name(kid: &str, issued_at: DateTime<Utc>) -> String {
    format!("{kid}-{}", issued_at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Builds a record in `namespace/name` holding the given `(entry, value)` pairs.
#[must_use]
pub fn record_with_entries<'a>(
    namespace: &str,
    name: &str,
    entries: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> ConfigRecord {
    entries
        .into_iter()
        .fold(ConfigRecord::builder().namespace(namespace).name(name).build(), |record, (k, v)| {
            record.with_entry(k, v)
        })
}

/// Parses an RFC 3339 literal for test fixtures.
///
/// # Panics
///
/// Panics if `value` is not valid RFC 3339.
#[must_use]
pub fn utc(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).expect("valid RFC 3339 fixture").with_timezone(&Utc)
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use credential_gc_store::{StorageError, StorageResult, assert_conflict};
///
/// let result: StorageResult<()> = Err(StorageError::Conflict);
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "{}: expected StorageError::Conflict, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "{}: expected StorageError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is an error of the named variant.
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use credential_gc_store::{StorageError, StorageResult, assert_storage_error};
///
/// let result: StorageResult<()> = Err(StorageError::timeout());
/// assert_storage_error!(result, Timeout);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// [`ClusterStore`] wrapper that injects failures.
///
/// Failures stay armed until cleared. Delete failures are keyed by record
/// name so one node's delete can fail while another's succeeds.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryClusterStore,
    get_failure: Mutex<Option<ErrorFactory>>,
    update_failure: Mutex<Option<ErrorFactory>>,
    delete_failures: Mutex<HashMap<String, ErrorFactory>>,
    write_after_get: Mutex<Option<ConfigRecord>>,
}

impl FailingStore {
    /// Creates a wrapper over an empty [`MemoryClusterStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped store (shares state with this wrapper).
    #[must_use]
    pub fn inner(&self) -> &MemoryClusterStore {
        &self.inner
    }

    /// Makes every `get` fail with the given error (`None` clears).
    pub fn set_get_failure(&self, factory: Option<ErrorFactory>) {
        *self.get_failure.lock() = factory;
    }

    /// Makes every `update` fail with the given error (`None` clears).
    pub fn set_update_failure(&self, factory: Option<ErrorFactory>) {
        *self.update_failure.lock() = factory;
    }

    /// Makes deletes of the named record fail with the given error.
    pub fn fail_delete_of(&self, name: impl Into<String>, factory: ErrorFactory) {
        self.delete_failures.lock().insert(name.into(), factory);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        *self.get_failure.lock() = None;
        *self.update_failure.lock() = None;
        self.delete_failures.lock().clear();
    }

    /// Arms a one-shot out-of-band write: right after the next successful
    /// `get` returns, `record` is written with [`MemoryClusterStore::put`],
    /// so the caller's subsequent update carries a stale version.
    pub fn write_after_next_get(&self, record: ConfigRecord) {
        *self.write_after_get.lock() = Some(record);
    }
}

#[async_trait]
impl ClusterStore for FailingStore {
    async fn get(&self, namespace: &str, name: &str) -> StorageResult<Option<ConfigRecord>> {
        if let Some(factory) = *self.get_failure.lock() {
            return Err(factory());
        }
        let result = self.inner.get(namespace, name).await?;
        let pending = self.write_after_get.lock().take();
        if let Some(record) = pending {
            self.inner.put(&record);
        }
        Ok(result)
    }

    async fn create(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
        self.inner.create(record).await
    }

    async fn update(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
        if let Some(factory) = *self.update_failure.lock() {
            return Err(factory());
        }
        self.inner.update(record).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> StorageResult<()> {
        let failure = self.delete_failures.lock().get(name).copied();
        if let Some(factory) = failure {
            return Err(factory());
        }
        self.inner.delete(namespace, name).await
    }
}

/// [`ClusterStore`] wrapper that counts calls and can add latency.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryClusterStore,
    get_count: AtomicUsize,
    update_count: AtomicUsize,
    delete_count: AtomicUsize,
    delay: Mutex<Duration>,
}

impl CountingStore {
    /// Creates a wrapper over an empty [`MemoryClusterStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped store (shares state with this wrapper).
    #[must_use]
    pub fn inner(&self) -> &MemoryClusterStore {
        &self.inner
    }

    /// Number of `get` calls so far.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    /// Number of `update` calls so far.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls so far.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    /// Adds a fixed latency to every `get`, `update`, and `delete`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    async fn maybe_delay(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ClusterStore for CountingStore {
    async fn get(&self, namespace: &str, name: &str) -> StorageResult<Option<ConfigRecord>> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        self.inner.get(namespace, name).await
    }

    async fn create(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
        self.inner.create(record).await
    }

    async fn update(&self, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        self.inner.update(record).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> StorageResult<()> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        self.inner.delete(namespace, name).await
    }
}
