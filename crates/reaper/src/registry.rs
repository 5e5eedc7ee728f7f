//! In-memory ledger of nodes removed from the cluster.
//!
//! The node-removal detector registers nodes here; the token verification
//! path asks whether a node is removed; the node-credential reaper drains
//! pending entries. None of these calls perform I/O, and no lock is held
//! beyond the map operation itself.
//!
//! # Entry lifecycle
//!
//! ```text
//!  register ──→ Pending ──delete ok / already absent──→ Cleaned ── retention ─→ evicted
//!                  │
//!                  └──── max_delete_attempts failures ──→ Abandoned
//! ```
//!
//! Registering a node again at any point overwrites its identifier and puts
//! it back to `Pending`. `Cleaned` entries keep answering
//! [`is_node_removed`](NodeCredentialRegistry::is_node_removed) until they
//! are evicted. `Abandoned` entries are never evicted: the credential may
//! still exist, so the node stays rejected until it is registered again.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::key_name::is_stale;

/// Cleanup state of a removed node's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupState {
    /// The credential still needs deleting.
    Pending,
    /// The credential is gone.
    Cleaned {
        /// When the delete succeeded.
        at: DateTime<Utc>,
    },
    /// Deleting failed too many times; no more attempts are made.
    Abandoned {
        /// When the last attempt failed.
        at: DateTime<Utc>,
    },
}

impl CleanupState {
    /// Returns `true` for `Cleaned` and `Abandoned`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn cleaned_at(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Cleaned { at } => Some(at),
            Self::Pending | Self::Abandoned { .. } => None,
        }
    }
}

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNodeEntry {
    /// Identifier supplied at (the latest) registration.
    pub node_id: String,
    /// When the node was (last) registered.
    pub registered_at: DateTime<Utc>,
    /// Failed delete attempts since registration.
    pub attempts: u32,
    /// Cleanup state.
    pub state: CleanupState,
}

/// A pending node, as copied out by
/// [`snapshot_pending`](NodeCredentialRegistry::snapshot_pending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNode {
    /// Node name.
    pub name: String,
    /// Identifier at the time of the snapshot.
    pub node_id: String,
    /// Failed delete attempts so far.
    pub attempts: u32,
}

/// Thread-safe registry of removed nodes, keyed by node name.
#[derive(Debug, Default)]
pub struct NodeCredentialRegistry {
    nodes: RwLock<HashMap<String, RemovedNodeEntry>>,
}

impl NodeCredentialRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `name` was removed, with identifier `node_id`.
    ///
    /// Overwrites any existing entry for the name and resets it to pending.
    pub fn register_removed_node(&self, name: impl Into<String>, node_id: impl Into<String>) {
        self.register_removed_node_at(name, node_id, Utc::now());
    }

    /// Same as [`register_removed_node`](Self::register_removed_node), stamping
    /// the entry with `at` instead of the wall clock.
    pub fn register_removed_node_at(
        &self,
        name: impl Into<String>,
        node_id: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        let name = name.into();
        let node_id = node_id.into();
        tracing::info!(node = %name, node_id = %node_id, "registered removed node");
        self.nodes.write().insert(
            name,
            RemovedNodeEntry {
                node_id,
                registered_at: at,
                attempts: 0,
                state: CleanupState::Pending,
            },
        );
    }

    /// Returns the identifier recorded for `name` if the node was removed.
    #[must_use]
    pub fn is_node_removed(&self, name: &str) -> Option<String> {
        self.nodes.read().get(name).map(|entry| entry.node_id.clone())
    }

    /// Returns a copy of the entry for `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<RemovedNodeEntry> {
        self.nodes.read().get(name).cloned()
    }

    /// Copies out every pending node, sorted by name.
    ///
    /// The read lock is released before this returns; later registrations do
    /// not affect the returned vector.
    #[must_use]
    pub fn snapshot_pending(&self) -> Vec<RemovedNode> {
        let mut pending: Vec<RemovedNode> = self
            .nodes
            .read()
            .iter()
            .filter(|(_, entry)| entry.state == CleanupState::Pending)
            .map(|(name, entry)| RemovedNode {
                name: name.clone(),
                node_id: entry.node_id.clone(),
                attempts: entry.attempts,
            })
            .collect();
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        pending
    }

    /// Marks a pending node's credential as cleaned.
    ///
    /// Ignored (returns `false`) if the node was re-registered with a
    /// different identifier since the snapshot, or is no longer pending.
    pub fn record_delete_success(&self, name: &str, node_id: &str, at: DateTime<Utc>) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(name) {
            Some(entry) if entry.node_id == node_id && entry.state == CleanupState::Pending => {
                entry.state = CleanupState::Cleaned { at };
                true
            },
            _ => false,
        }
    }

    /// Counts a failed delete; abandons the node once `max_attempts` is reached.
    ///
    /// Returns `true` if this failure abandoned the node. Ignored under the
    /// same conditions as [`record_delete_success`](Self::record_delete_success).
    pub fn record_delete_failure(
        &self,
        name: &str,
        node_id: &str,
        at: DateTime<Utc>,
        max_attempts: u32,
    ) -> bool {
        let mut nodes = self.nodes.write();
        let Some(entry) = nodes.get_mut(name) else {
            return false;
        };
        if entry.node_id != node_id || entry.state != CleanupState::Pending {
            return false;
        }
        entry.attempts = entry.attempts.saturating_add(1);
        if entry.attempts >= max_attempts {
            entry.state = CleanupState::Abandoned { at };
            return true;
        }
        false
    }

    /// Drops `Cleaned` entries cleaned more than `retention` before `now`.
    /// Returns how many were dropped.
    ///
    /// `Abandoned` entries are kept whatever their age.
    pub fn evict_expired(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let mut nodes = self.nodes.write();
        let before = nodes.len();
        nodes.retain(|_, entry| match entry.state.cleaned_at() {
            Some(at) => !is_stale(at, now, retention),
            None => true,
        });
        before - nodes.len()
    }

    /// Number of entries in any state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns `true` if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Number of pending entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.nodes.read().values().filter(|entry| entry.state == CleanupState::Pending).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use credential_gc_store::testutil::utc;

    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_register_and_lookup() {
        let registry = NodeCredentialRegistry::new();

        registry.register_removed_node("worker-1", "id-1");

        assert_eq!(registry.is_node_removed("worker-1"), Some("id-1".to_owned()));
        assert_eq!(registry.is_node_removed("worker-2"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_overwrites_and_resets() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("worker-1", "id-1");
        registry.record_delete_success("worker-1", "id-1", utc("2025-06-01T00:00:00Z"));

        registry.register_removed_node("worker-1", "id-2");

        let entry = registry.entry("worker-1").unwrap();
        assert_eq!(entry.node_id, "id-2");
        assert_eq!(entry.state, CleanupState::Pending);
        assert_eq!(entry.attempts, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_contains_only_pending_sorted() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("c", "3");
        registry.register_removed_node("a", "1");
        registry.register_removed_node("b", "2");
        registry.record_delete_success("b", "2", utc("2025-06-01T00:00:00Z"));

        let names: Vec<_> =
            registry.snapshot_pending().into_iter().map(|node| node.name).collect();

        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(registry.pending_count(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_registrations() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("a", "1");

        let snapshot = registry.snapshot_pending();
        registry.register_removed_node("b", "2");
        registry.register_removed_node("a", "changed");

        assert_eq!(snapshot, vec![RemovedNode { name: "a".into(), node_id: "1".into(), attempts: 0 }]);
    }

    #[test]
    fn test_success_ignored_for_stale_identifier() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("a", "old");
        registry.register_removed_node("a", "new");

        assert!(!registry.record_delete_success("a", "old", utc("2025-06-01T00:00:00Z")));
        assert_eq!(registry.entry("a").unwrap().state, CleanupState::Pending);
    }

    #[test]
    fn test_failure_counts_then_abandons() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("a", "1");
        let at = utc("2025-06-01T00:00:00Z");

        assert!(!registry.record_delete_failure("a", "1", at, 3));
        assert!(!registry.record_delete_failure("a", "1", at, 3));
        assert!(registry.record_delete_failure("a", "1", at, 3));

        let entry = registry.entry("a").unwrap();
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.state, CleanupState::Abandoned { at });
        assert!(registry.snapshot_pending().is_empty());
        assert!(!registry.record_delete_failure("a", "1", at, 3), "terminal entries are frozen");
        assert_eq!(registry.is_node_removed("a"), Some("1".to_owned()));
    }

    #[test]
    fn test_unknown_node_updates_are_ignored() {
        let registry = NodeCredentialRegistry::new();
        let at = utc("2025-06-01T00:00:00Z");

        assert!(!registry.record_delete_success("ghost", "1", at));
        assert!(!registry.record_delete_failure("ghost", "1", at, 1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_at_stamps_given_time() {
        let registry = NodeCredentialRegistry::new();
        let at = utc("2025-06-01T12:00:00Z");

        registry.register_removed_node_at("worker-1", "id-1", at);

        let entry = registry.entry("worker-1").unwrap();
        assert_eq!(entry.registered_at, at);
        assert_eq!(entry.state, CleanupState::Pending);
    }

    #[test]
    fn test_evict_expired_cleaned_entries_only() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("cleaned-old", "1");
        registry.register_removed_node("cleaned-recent", "2");
        registry.register_removed_node("abandoned-old", "3");
        registry.register_removed_node("pending", "4");
        registry.record_delete_success("cleaned-old", "1", utc("2025-06-01T00:00:00Z"));
        registry.record_delete_success("cleaned-recent", "2", utc("2025-06-02T00:00:00Z"));
        registry.record_delete_failure("abandoned-old", "3", utc("2025-05-30T00:00:00Z"), 1);

        let evicted = registry.evict_expired(utc("2025-06-02T00:00:01Z"), DAY);

        assert_eq!(evicted, 1);
        assert!(registry.is_node_removed("cleaned-old").is_none());
        assert_eq!(registry.is_node_removed("abandoned-old"), Some("3".to_owned()));
        assert!(registry.is_node_removed("cleaned-recent").is_some());
        assert!(registry.is_node_removed("pending").is_some());
    }

    #[test]
    fn test_abandoned_entry_never_evicted() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("w1", "1");
        registry.record_delete_failure("w1", "1", utc("2025-06-01T00:00:00Z"), 1);

        assert_eq!(registry.evict_expired(utc("2026-06-01T00:00:00Z"), DAY), 0);
        assert_eq!(registry.is_node_removed("w1"), Some("1".to_owned()));
        assert!(matches!(registry.entry("w1").unwrap().state, CleanupState::Abandoned { .. }));
    }

    #[test]
    fn test_evict_keeps_entry_at_exact_retention() {
        let registry = NodeCredentialRegistry::new();
        registry.register_removed_node("a", "1");
        registry.record_delete_success("a", "1", utc("2025-06-01T00:00:00Z"));

        assert_eq!(registry.evict_expired(utc("2025-06-02T00:00:00Z"), DAY), 0);
        assert_eq!(registry.len(), 1);
    }
}
