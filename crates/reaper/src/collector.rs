//! One-stop wiring of the registry, both reapers, and the admission check.

use std::sync::Arc;

use credential_gc_store::ClusterStore;
use tokio_util::sync::CancellationToken;

use crate::{
    admission::RemovedNodeAdmission,
    config::CollectorConfig,
    error::ConfigError,
    metrics::{ReaperMetrics, ReaperMetricsSnapshot},
    node_credentials::NodeCredentialReaper,
    registry::NodeCredentialRegistry,
    stale_keys::StaleKeyReaper,
};

/// Owns every credential garbage-collection component of one control-plane
/// process.
///
/// The reapers share one [`ReaperMetrics`] and the node reaper and
/// admission check share one [`NodeCredentialRegistry`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use credential_gc::{CollectorConfig, CredentialCollector};
/// use credential_gc_store::{ClusterStore, MemoryClusterStore};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), credential_gc::ConfigError> {
/// let collector = CredentialCollector::new(CollectorConfig::default())?;
/// let store: Arc<dyn ClusterStore> = Arc::new(MemoryClusterStore::new());
/// let cancel = CancellationToken::new();
///
/// collector.start(&cancel, store);
///
/// // Node-removal detector:
/// collector.registry().register_removed_node("worker-7", "4f1c");
///
/// // Token verification path:
/// assert!(collector.admission().check("worker-7").is_err());
///
/// cancel.cancel();
/// collector.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CredentialCollector {
    config: CollectorConfig,
    registry: Arc<NodeCredentialRegistry>,
    metrics: Arc<ReaperMetrics>,
    key_reaper: Arc<StaleKeyReaper>,
    node_reaper: Arc<NodeCredentialReaper>,
    admission: RemovedNodeAdmission,
}

impl CredentialCollector {
    /// Builds every component from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: CollectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(NodeCredentialRegistry::new());
        let metrics = Arc::new(ReaperMetrics::new());
        let key_reaper =
            Arc::new(StaleKeyReaper::with_metrics(config.keys().clone(), Arc::clone(&metrics)));
        let node_reaper = Arc::new(NodeCredentialReaper::with_metrics(
            Arc::clone(&registry),
            config.nodes().clone(),
            Arc::clone(&metrics),
        ));
        let admission =
            RemovedNodeAdmission::new(Arc::clone(&registry), config.admission_log_interval());

        Ok(Self { config, registry, metrics, key_reaper, node_reaper, admission })
    }

    /// Starts both reapers against `store`.
    ///
    /// Returns `true` if at least one reaper was started by this call.
    ///
    /// Returns `false` when called outside a Tokio runtime, leaving the
    /// instance startable from within one.
    pub fn start(&self, cancel: &CancellationToken, store: Arc<dyn ClusterStore>) -> bool {
        let keys = self.key_reaper.start(cancel, Arc::clone(&store));
        let nodes = self.node_reaper.start(cancel, store);
        keys || nodes
    }

    /// Stops both reapers and waits for in-flight cycles.
    pub async fn shutdown(&self) {
        tokio::join!(self.key_reaper.shutdown(), self.node_reaper.shutdown());
    }

    /// Returns the configuration the collector was built from.
    #[must_use]
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Returns the removed-node registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeCredentialRegistry> {
        &self.registry
    }

    /// Returns the stale-key reaper.
    #[must_use]
    pub fn key_reaper(&self) -> &Arc<StaleKeyReaper> {
        &self.key_reaper
    }

    /// Returns the node-credential reaper.
    #[must_use]
    pub fn node_reaper(&self) -> &Arc<NodeCredentialReaper> {
        &self.node_reaper
    }

    /// Returns the admission check for the token verification path.
    #[must_use]
    pub fn admission(&self) -> &RemovedNodeAdmission {
        &self.admission
    }

    /// Returns the combined counters of both reapers.
    #[must_use]
    pub fn metrics(&self) -> ReaperMetricsSnapshot {
        self.metrics.snapshot()
    }
}
