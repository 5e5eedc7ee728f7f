//! Rejection of credentials presented by removed nodes.
//!
//! A removed node may keep retrying authentication with a credential it
//! still holds. [`RemovedNodeAdmission`] turns a registry hit into an
//! [`AdmissionError`] and rate-limits the matching warning to one per node
//! per interval, reporting how many rejections were suppressed in between.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{error::AdmissionError, registry::NodeCredentialRegistry};

/// Log-state entries older than the interval are dropped once the map
/// reaches this size.
const LOG_STATE_PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct LogState {
    last_logged: Instant,
    suppressed: u64,
}

/// Admission check for the token verification path.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use credential_gc::{AdmissionError, NodeCredentialRegistry, RemovedNodeAdmission};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Arc::new(NodeCredentialRegistry::new());
/// let admission = RemovedNodeAdmission::new(Arc::clone(&registry), Duration::from_secs(60));
///
/// assert!(admission.check("worker-1").is_ok());
///
/// registry.register_removed_node("worker-1", "abc");
/// assert!(matches!(admission.check("worker-1"), Err(AdmissionError::NodeRemoved { .. })));
/// # }
/// ```
#[derive(Debug)]
pub struct RemovedNodeAdmission {
    registry: Arc<NodeCredentialRegistry>,
    log_interval: Duration,
    log_state: Mutex<HashMap<String, LogState>>,
    rejections: AtomicU64,
}

impl RemovedNodeAdmission {
    /// Creates a check over `registry` that warns at most once per node per
    /// `log_interval`.
    #[must_use]
    pub fn new(registry: Arc<NodeCredentialRegistry>, log_interval: Duration) -> Self {
        Self {
            registry,
            log_interval,
            log_state: Mutex::new(HashMap::new()),
            rejections: AtomicU64::new(0),
        }
    }

    /// Rejects `node` if it has been removed from the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NodeRemoved`] with the identifier recorded at
    /// removal.
    pub fn check(&self, node: &str) -> Result<(), AdmissionError> {
        let Some(node_id) = self.registry.is_node_removed(node) else {
            return Ok(());
        };

        self.rejections.fetch_add(1, Ordering::Relaxed);
        if let Some(suppressed) = self.take_log_slot(node) {
            tracing::warn!(
                node,
                node_id = %node_id,
                suppressed,
                "rejected credential of removed node"
            );
        }
        Err(AdmissionError::NodeRemoved { node: node.to_owned(), node_id })
    }

    /// Total rejections since creation.
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Returns `Some(suppressed)` if a warning for `node` is due now, where
    /// `suppressed` counts rejections not logged since the previous warning.
    fn take_log_slot(&self, node: &str) -> Option<u64> {
        let now = Instant::now();
        let mut state = self.log_state.lock();

        if let Some(entry) = state.get_mut(node) {
            if now.duration_since(entry.last_logged) < self.log_interval {
                entry.suppressed += 1;
                return None;
            }
            let suppressed = entry.suppressed;
            *entry = LogState { last_logged: now, suppressed: 0 };
            return Some(suppressed);
        }

        if state.len() >= LOG_STATE_PRUNE_THRESHOLD {
            let interval = self.log_interval;
            state.retain(|_, entry| now.duration_since(entry.last_logged) < interval);
        }
        state.insert(node.to_owned(), LogState { last_logged: now, suppressed: 0 });
        Some(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn admission(interval: Duration) -> (Arc<NodeCredentialRegistry>, RemovedNodeAdmission) {
        let registry = Arc::new(NodeCredentialRegistry::new());
        let admission = RemovedNodeAdmission::new(Arc::clone(&registry), interval);
        (registry, admission)
    }

    #[tokio::test]
    async fn test_live_node_admitted() {
        let (_registry, admission) = admission(Duration::from_secs(60));

        assert!(admission.check("worker-1").is_ok());
        assert_eq!(admission.rejections(), 0);
    }

    #[tokio::test]
    async fn test_removed_node_rejected_with_identifier() {
        let (registry, admission) = admission(Duration::from_secs(60));
        registry.register_removed_node("worker-1", "abc");

        let err = admission.check("worker-1").unwrap_err();

        assert_eq!(err, AdmissionError::NodeRemoved { node: "worker-1".into(), node_id: "abc".into() });
        assert_eq!(admission.rejections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_rate_limited_per_node() {
        let (_registry, admission) = admission(Duration::from_secs(60));

        assert_eq!(admission.take_log_slot("a"), Some(0));
        assert_eq!(admission.take_log_slot("a"), None);
        assert_eq!(admission.take_log_slot("a"), None);
        assert_eq!(admission.take_log_slot("b"), Some(0), "other nodes log independently");

        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(admission.take_log_slot("a"), Some(2));
        assert_eq!(admission.take_log_slot("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_state_pruned_when_large() {
        let (_registry, admission) = admission(Duration::from_secs(1));
        for i in 0..LOG_STATE_PRUNE_THRESHOLD {
            admission.take_log_slot(&format!("node-{i}"));
        }

        tokio::time::advance(Duration::from_secs(2)).await;
        admission.take_log_slot("fresh");

        assert_eq!(admission.log_state.lock().len(), 1);
    }
}
