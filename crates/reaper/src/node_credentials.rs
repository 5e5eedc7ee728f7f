//! Periodic deletion of credentials belonging to removed nodes.
//!
//! Each cycle snapshots the pending nodes in the
//! [`NodeCredentialRegistry`], then issues one delete per node for the record
//! `<credential_prefix><node name>`. Deletes are independent: a failure is
//! logged and counted, and the cycle moves on to the next node. A node whose
//! credential is already gone counts as cleaned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use credential_gc_store::{ClusterStore, StorageResult, qualified_name};
use fail::fail_point;
use tokio_util::sync::CancellationToken;

use crate::{
    config::NodeReaperConfig, error::ReaperErrorKind, metrics::ReaperMetrics,
    registry::NodeCredentialRegistry, task::BackgroundTask,
};

/// Result of one node-credential cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeReapReport {
    /// Pending nodes in the snapshot.
    pub pending: usize,
    /// Nodes whose credential was deleted.
    pub deleted: Vec<String>,
    /// Nodes whose credential was already absent.
    pub already_absent: Vec<String>,
    /// Nodes whose delete failed, with the failure kind.
    pub failed: Vec<(String, ReaperErrorKind)>,
    /// Nodes abandoned by this cycle after too many failures.
    pub abandoned: Vec<String>,
    /// Cleaned registry entries evicted at the end of the cycle.
    pub evicted: usize,
}

impl NodeReapReport {
    /// Nodes whose cleanup completed this cycle.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.deleted.len() + self.already_absent.len()
    }
}

/// Deletes the credential records of removed nodes.
#[derive(Debug)]
pub struct NodeCredentialReaper {
    registry: Arc<NodeCredentialRegistry>,
    config: NodeReaperConfig,
    metrics: Arc<ReaperMetrics>,
    task: BackgroundTask,
}

impl NodeCredentialReaper {
    /// Creates a reaper draining `registry`, with its own metrics.
    #[must_use]
    pub fn new(registry: Arc<NodeCredentialRegistry>, config: NodeReaperConfig) -> Self {
        Self::with_metrics(registry, config, Arc::new(ReaperMetrics::new()))
    }

    /// Creates a reaper that records into shared metrics.
    #[must_use]
    pub fn with_metrics(
        registry: Arc<NodeCredentialRegistry>,
        config: NodeReaperConfig,
        metrics: Arc<ReaperMetrics>,
    ) -> Self {
        Self { registry, config, metrics, task: BackgroundTask::new("node_credential_reaper") }
    }

    /// Returns the registry this reaper drains.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeCredentialRegistry> {
        &self.registry
    }

    /// Returns the reaper configuration.
    #[must_use]
    pub fn config(&self) -> &NodeReaperConfig {
        &self.config
    }

    /// Returns the metrics this reaper records into.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ReaperMetrics> {
        &self.metrics
    }

    /// Starts the periodic cycle. See
    /// [`StaleKeyReaper::start`](crate::StaleKeyReaper::start); the gate
    /// behaves identically and is independent of the other reaper's.
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
    pub async fn run_cycle(&self, store: &dyn ClusterStore) -> NodeReapReport {
        self.run_cycle_at(store, Utc::now()).await
    }

    /// Runs one cycle as if the current time were `now`.
    ///
    /// `now` stamps state transitions and drives eviction.
    #[tracing::instrument(
        name = "run_cycle",
        skip(self, store),
        fields(reaper = "node_credentials", namespace = %self.config.namespace())
    )]
    pub async fn run_cycle_at(&self, store: &dyn ClusterStore, now: DateTime<Utc>) -> NodeReapReport {
        let pending = self.registry.snapshot_pending();
        let mut report = NodeReapReport { pending: pending.len(), ..NodeReapReport::default() };

        for node in pending {
            let credential = self.config.credential_name(&node.name);
            self.metrics.record_delete_attempt();

            match delete_credential(store, self.config.namespace(), &credential).await {
                Ok(()) => {
                    tracing::info!(
                        audit.action = "delete_node_credential",
                        audit.resource = %qualified_name(self.config.namespace(), &credential),
                        audit.result = "success",
                        node = %node.name,
                        node_id = %node.node_id,
                        "audit_event"
                    );
                    self.registry.record_delete_success(&node.name, &node.node_id, now);
                    self.metrics.record_delete_success();
                    report.deleted.push(node.name);
                },
                Err(err) if err.is_not_found() => {
                    tracing::warn!(node = %node.name, credential = %credential, "node credential already absent");
                    self.registry.record_delete_success(&node.name, &node.node_id, now);
                    self.metrics.record_delete_already_absent();
                    report.already_absent.push(node.name);
                },
                Err(err) => {
                    let kind = ReaperErrorKind::from(&err);
                    tracing::warn!(
                        node = %node.name,
                        credential = %credential,
                        error = %err,
                        kind = kind.as_str(),
                        attempt = node.attempts.saturating_add(1),
                        "failed to delete node credential"
                    );
                    self.metrics.record_delete_failure();
                    let abandoned = self.registry.record_delete_failure(
                        &node.name,
                        &node.node_id,
                        now,
                        self.config.max_delete_attempts(),
                    );
                    if abandoned {
                        tracing::warn!(
                            node = %node.name,
                            credential = %credential,
                            attempts = self.config.max_delete_attempts(),
                            "giving up on node credential"
                        );
                        self.metrics.record_abandoned();
                        report.abandoned.push(node.name.clone());
                    }
                    report.failed.push((node.name, kind));
                },
            }
        }

        report.evicted = self.registry.evict_expired(now, self.config.retention());
        if report.evicted > 0 {
            self.metrics.record_evicted(report.evicted);
        }
        self.metrics.record_node_cycle();

        if report.pending > 0 || report.evicted > 0 {
            tracing::info!(
                pending = report.pending,
                deleted = report.deleted.len(),
                already_absent = report.already_absent.len(),
                failed = report.failed.len(),
                abandoned = report.abandoned.len(),
                evicted = report.evicted,
                "node credential cycle complete"
            );
        }
        report
    }
}

async fn delete_credential(store: &dyn ClusterStore, namespace: &str, name: &str) -> StorageResult<()> {
    fail_point!("node-reaper-before-delete", |_| {
        Err(credential_gc_store::StorageError::internal("injected failure before credential delete"))
    });
    store.delete(namespace, name).await
}
