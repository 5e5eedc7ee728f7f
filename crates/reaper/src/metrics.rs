//! Reaper counters.
//!
//! [`ReaperMetrics`] is shared by both reapers (each updates only its own
//! counters) and read through [`ReaperMetrics::snapshot`].
//!
//! All counters are independent and monotonically increasing, so every
//! atomic uses `Ordering::Relaxed`. A snapshot may observe counters from
//! slightly different instants, which is fine for telemetry.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`ReaperMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bon::Builder)]
pub struct ReaperMetricsSnapshot {
    /// Completed stale-key cycles.
    #[builder(default)]
    pub key_cycles: u64,
    /// Signing keys removed by successful writes.
    #[builder(default)]
    pub keys_removed: u64,
    /// Entries skipped because their name carried no timestamp.
    #[builder(default)]
    pub keys_unparseable: u64,
    /// Failed fetches of the signing-key record.
    #[builder(default)]
    pub key_fetch_failures: u64,
    /// Failed write-backs of the signing-key record, conflicts included.
    #[builder(default)]
    pub key_write_failures: u64,
    /// Write-backs rejected for a stale version.
    #[builder(default)]
    pub key_write_conflicts: u64,
    /// Completed node-credential cycles.
    #[builder(default)]
    pub node_cycles: u64,
    /// Credential deletes issued.
    #[builder(default)]
    pub deletes_attempted: u64,
    /// Credential deletes that removed a record.
    #[builder(default)]
    pub deletes_succeeded: u64,
    /// Credential deletes answered with "not found".
    #[builder(default)]
    pub deletes_already_absent: u64,
    /// Credential deletes that failed.
    #[builder(default)]
    pub deletes_failed: u64,
    /// Nodes given up on after too many failed deletes.
    #[builder(default)]
    pub nodes_abandoned: u64,
    /// Cleaned registry entries evicted after retention.
    #[builder(default)]
    pub nodes_evicted: u64,
}

/// Atomic counters updated by the reapers.
#[derive(Debug, Default)]
pub struct ReaperMetrics {
    key_cycles: AtomicU64,
    keys_removed: AtomicU64,
    keys_unparseable: AtomicU64,
    key_fetch_failures: AtomicU64,
    key_write_failures: AtomicU64,
    key_write_conflicts: AtomicU64,
    node_cycles: AtomicU64,
    deletes_attempted: AtomicU64,
    deletes_succeeded: AtomicU64,
    deletes_already_absent: AtomicU64,
    deletes_failed: AtomicU64,
    nodes_abandoned: AtomicU64,
    nodes_evicted: AtomicU64,
}

fn add(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

impl ReaperMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_key_cycle(&self, unparseable: usize) {
        add(&self.key_cycles, 1);
        add(&self.keys_unparseable, unparseable);
    }

    pub(crate) fn record_keys_removed(&self, n: usize) {
        add(&self.keys_removed, n);
    }

    pub(crate) fn record_key_fetch_failure(&self) {
        add(&self.key_fetch_failures, 1);
    }

    pub(crate) fn record_key_write_failure(&self, conflict: bool) {
        add(&self.key_write_failures, 1);
        if conflict {
            add(&self.key_write_conflicts, 1);
        }
    }

    pub(crate) fn record_node_cycle(&self) {
        add(&self.node_cycles, 1);
    }

    pub(crate) fn record_delete_attempt(&self) {
        add(&self.deletes_attempted, 1);
    }

    pub(crate) fn record_delete_success(&self) {
        add(&self.deletes_succeeded, 1);
    }

    pub(crate) fn record_delete_already_absent(&self) {
        add(&self.deletes_already_absent, 1);
    }

    pub(crate) fn record_delete_failure(&self) {
        add(&self.deletes_failed, 1);
    }

    pub(crate) fn record_abandoned(&self) {
        add(&self.nodes_abandoned, 1);
    }

    pub(crate) fn record_evicted(&self, n: usize) {
        add(&self.nodes_evicted, n);
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> ReaperMetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ReaperMetricsSnapshot {
            key_cycles: load(&self.key_cycles),
            keys_removed: load(&self.keys_removed),
            keys_unparseable: load(&self.keys_unparseable),
            key_fetch_failures: load(&self.key_fetch_failures),
            key_write_failures: load(&self.key_write_failures),
            key_write_conflicts: load(&self.key_write_conflicts),
            node_cycles: load(&self.node_cycles),
            deletes_attempted: load(&self.deletes_attempted),
            deletes_succeeded: load(&self.deletes_succeeded),
            deletes_already_absent: load(&self.deletes_already_absent),
            deletes_failed: load(&self.deletes_failed),
            nodes_abandoned: load(&self.nodes_abandoned),
            nodes_evicted: load(&self.nodes_evicted),
        }
    }
}
