//! Periodic removal of stale signing keys from the shared key record.
//!
//! Each cycle reads the key record, drops every entry whose name carries a
//! timestamp older than the configured threshold, and writes the record back
//! under the version token it read. A cycle that removes nothing writes
//! nothing, so an idle cluster produces no write traffic.
//!
//! # Failure handling
//!
//! Fetch and write errors are logged at `warn` and end the cycle; the next
//! tick starts over from a fresh read. A version conflict means another
//! writer updated the record in between, and is handled the same way.
//! Nothing is carried from one cycle to the next.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use credential_gc_store::{
    ClusterStore, ConfigRecord, ResourceVersion, StorageResult, qualified_name,
};
use fail::fail_point;
use tokio_util::sync::CancellationToken;

use crate::{
    config::KeyReaperConfig,
    error::ReaperErrorKind,
    key_name::{is_stale, parse_key_name},
    metrics::ReaperMetrics,
    task::BackgroundTask,
};

/// How a stale-key cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyReapOutcome {
    /// The key record does not exist.
    RecordMissing,
    /// Nothing was stale; no write was issued.
    Unchanged,
    /// Stale keys were removed; the store assigned this version.
    Pruned {
        /// Version of the record after the write.
        version: ResourceVersion,
    },
    /// Reading the record failed.
    FetchFailed(ReaperErrorKind),
    /// Writing the record back failed (including version conflicts).
    WriteFailed(ReaperErrorKind),
}

/// Result of one stale-key cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReapReport {
    /// How the cycle ended.
    pub outcome: KeyReapOutcome,
    /// Entries examined.
    pub scanned: usize,
    /// Names of the entries found stale, in record order.
    ///
    /// They were removed only if the outcome is [`KeyReapOutcome::Pruned`].
    pub stale: Vec<String>,
    /// Entries skipped because their name carries no timestamp.
    pub unparseable: usize,
}

impl KeyReapReport {
    fn empty(outcome: KeyReapOutcome) -> Self {
        Self { outcome, scanned: 0, stale: Vec::new(), unparseable: 0 }
    }

    /// Number of keys actually removed from the store.
    #[must_use]
    pub fn removed(&self) -> usize {
        match self.outcome {
            KeyReapOutcome::Pruned { .. } => self.stale.len(),
            _ => 0,
        }
    }

    /// Returns `true` if the cycle issued a write.
    #[must_use]
    pub fn wrote(&self) -> bool {
        matches!(self.outcome, KeyReapOutcome::Pruned { .. } | KeyReapOutcome::WriteFailed(_))
    }
}

/// Removes signing keys older than the staleness threshold.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use credential_gc::{KeyReaperConfig, StaleKeyReaper};
/// use credential_gc_store::{ClusterStore, MemoryClusterStore};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let reaper = Arc::new(StaleKeyReaper::new(KeyReaperConfig::default()));
/// let store: Arc<dyn ClusterStore> = Arc::new(MemoryClusterStore::new());
/// let cancel = CancellationToken::new();
///
/// assert!(reaper.start(&cancel, Arc::clone(&store)));
/// assert!(!reaper.start(&cancel, store)); // already running
///
/// cancel.cancel();
/// reaper.shutdown().await;
/// # }
/// ```
#[derive(Debug)]
pub struct StaleKeyReaper {
    config: KeyReaperConfig,
    metrics: Arc<ReaperMetrics>,
    task: BackgroundTask,
}

impl StaleKeyReaper {
    /// Creates a reaper with its own metrics.
    #[must_use]
    pub fn new(config: KeyReaperConfig) -> Self {
        Self::with_metrics(config, Arc::new(ReaperMetrics::new()))
    }

    /// Creates a reaper that records into shared metrics.
    #[must_use]
    pub fn with_metrics(config: KeyReaperConfig, metrics: Arc<ReaperMetrics>) -> Self {
        Self { config, metrics, task: BackgroundTask::new("stale_key_reaper") }
    }

    /// Returns the reaper configuration.
    #[must_use]
    pub fn config(&self) -> &KeyReaperConfig {
        &self.config
    }

    /// Returns the metrics this reaper records into.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ReaperMetrics> {
        &self.metrics
    }

    /// Starts the periodic cycle.
    ///
    /// Only the first call on an instance starts anything and returns
    /// `true`. Later calls, concurrent ones included, return `false`. The
    /// first cycle runs one interval after start.
    ///
    /// Returns `false` when called outside a Tokio runtime, leaving the
    /// instance startable from within one.
    pub fn start(self: &Arc<Self>, cancel: &CancellationToken, store: Arc<dyn ClusterStore>) -> bool {
        let reaper = Arc::clone(self);
        self.task.start(cancel, self.config.interval(), move || {
            let reaper = Arc::clone(&reaper);
            let store = Arc::clone(&store);
            async move {
                reaper.run_cycle(store.as_ref()).await;
            }
        })
    }

    /// Returns `true` once [`start`](Self::start) has succeeded.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.task.is_started()
    }

    /// Stops the periodic cycle and waits for a running cycle to finish.
    pub async fn shutdown(&self) {
        self.task.shutdown().await;
    }

    /// Runs one cycle against the current wall clock.
    pub async fn run_cycle(&self, store: &dyn ClusterStore) -> KeyReapReport {
        self.run_cycle_at(store, Utc::now()).await
    }

    /// Runs one cycle as if the current time were `now`.
    #[tracing::instrument(
        name = "run_cycle",
        skip(self, store),
        fields(
            reaper = "stale_keys",
            record = %qualified_name(self.config.namespace(), self.config.record_name()),
        )
    )]
    pub async fn run_cycle_at(&self, store: &dyn ClusterStore, now: DateTime<Utc>) -> KeyReapReport {
        let report = self.reap(store, now).await;
        self.metrics.record_key_cycle(report.unparseable);
        report
    }

    async fn reap(&self, store: &dyn ClusterStore, now: DateTime<Utc>) -> KeyReapReport {
        let mut record =
            match store.get(self.config.namespace(), self.config.record_name()).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    tracing::debug!("signing-key record not found");
                    return KeyReapReport::empty(KeyReapOutcome::RecordMissing);
                },
                Err(err) => {
                    let kind = ReaperErrorKind::from(&err);
                    tracing::warn!(error = %err, kind = kind.as_str(), "failed to fetch signing-key record");
                    self.metrics.record_key_fetch_failure();
                    return KeyReapReport::empty(KeyReapOutcome::FetchFailed(kind));
                },
            };

        let threshold = self.config.stale_threshold();
        let mut stale = Vec::new();
        let mut unparseable = 0;
        for entry in record.data.keys() {
            match parse_key_name(entry) {
                Some(parsed) if is_stale(parsed.issued_at, now, threshold) => {
                    tracing::debug!(entry = %entry, kid = parsed.kid, issued_at = %parsed.issued_at, "stale signing key");
                    stale.push(entry.clone());
                },
                Some(_) => {},
                None => {
                    tracing::debug!(entry = %entry, "skipping entry without trailing timestamp");
                    unparseable += 1;
                },
            }
        }

        let scanned = record.len();
        if stale.is_empty() {
            return KeyReapReport { outcome: KeyReapOutcome::Unchanged, scanned, stale, unparseable };
        }

        for entry in &stale {
            record.data.remove(entry);
        }

        let outcome = match write_back(store, &record).await {
            Ok(version) => {
                for entry in &stale {
                    tracing::info!(
                        audit.action = "remove_signing_key",
                        audit.resource = %format!("{}/{entry}", record.qualified_name()),
                        audit.result = "success",
                        "audit_event"
                    );
                }
                tracing::info!(
                    removed = stale.len(),
                    remaining = record.len(),
                    %version,
                    "removed stale signing keys"
                );
                self.metrics.record_keys_removed(stale.len());
                KeyReapOutcome::Pruned { version }
            },
            Err(err) => {
                let kind = ReaperErrorKind::from(&err);
                tracing::warn!(
                    error = %err,
                    kind = kind.as_str(),
                    stale = stale.len(),
                    "failed to write back signing-key record, retrying next cycle"
                );
                self.metrics.record_key_write_failure(kind == ReaperErrorKind::Conflict);
                KeyReapOutcome::WriteFailed(kind)
            },
        };

        KeyReapReport { outcome, scanned, stale, unparseable }
    }
}

async fn write_back(store: &dyn ClusterStore, record: &ConfigRecord) -> StorageResult<ResourceVersion> {
    fail_point!("key-reaper-before-write", |_| {
        Err(credential_gc_store::StorageError::internal("injected failure before key record write"))
    });
    store.update(record).await
}
