//! Record types exchanged with the cluster store.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Optimistic-concurrency token attached to every stored record.
///
/// The store assigns a fresh version on every successful write. A write
/// must present the version it read; a mismatch is rejected with
/// [`StorageError::Conflict`](crate::StorageError::Conflict).
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceVersion(pub u64);

impl From<u64> for ResourceVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ResourceVersion> for u64 {
    fn from(version: ResourceVersion) -> Self {
        version.0
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry map of a record: entry name to opaque (secret) value.
///
/// Values are wrapped in [`Zeroizing`] so key material is wiped from memory
/// when a record copy is dropped.
pub type RecordData = BTreeMap<String, Zeroizing<String>>;

/// A named, versioned configuration record (or secret) in the cluster store.
///
/// The same shape backs both the shared signing-key record and the
/// per-node credential records.
///
/// # Example
///
/// ```
/// use credential_gc_store::ConfigRecord;
///
/// let record = ConfigRecord::builder()
///     .namespace("kube-system")
///     .name("k3s-service-account-token-keys")
///     .build()
///     .with_entry("sa-key-2025-06-01T00:00:00Z", "MCowBQYDK2VwAyEA...");
///
/// assert_eq!(record.qualified_name(), "kube-system/k3s-service-account-token-keys");
/// assert_eq!(record.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct ConfigRecord {
    /// Namespace the record lives in.
    #[builder(into)]
    pub namespace: String,

    /// Record name, unique within the namespace.
    #[builder(into)]
    pub name: String,

    /// Named entries held by the record.
    #[builder(default)]
    #[serde(default)]
    pub data: RecordData,

    /// Version token observed when the record was read.
    ///
    /// Ignored on create; checked on update.
    #[builder(default)]
    #[serde(default)]
    pub version: ResourceVersion,
}

impl ConfigRecord {
    /// Returns `namespace/name`, the form used in logs and errors.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.namespace, &self.name)
    }

    /// Adds (or replaces) an entry, consuming and returning the record.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(name.into(), Zeroizing::new(value.into()));
        self
    }

    /// Number of entries in the record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the record holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if an entry with the given name exists.
    #[must_use]
    pub fn contains_entry(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }
}

/// Formats a `namespace/name` pair.
#[must_use]
pub fn qualified_name(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}
