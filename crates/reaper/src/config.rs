//! Reaper configuration.
//!
//! Every struct deserializes from any serde format (durations in humantime
//! notation such as `"15m"` or `"24h"`), rejects unknown fields, and can be
//! built in code through a validating builder:
//!
//! ```
//! use std::time::Duration;
//!
//! use credential_gc::NodeReaperConfig;
//!
//! let config = NodeReaperConfig::builder()
//!     .interval(Duration::from_secs(60))
//!     .max_delete_attempts(10)
//!     .build()?;
//! assert_eq!(config.credential_name("worker-1"), "node-password-worker-1");
//! # Ok::<(), credential_gc::ConfigError>(())
//! ```
//!
//! Deserialized values bypass the builder, so callers loading configuration
//! from a file should call `validate()` on the result.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default interval between stale-key cycles (1 hour).
pub const DEFAULT_KEY_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default age past which a signing key is stale (24 hours).
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between node-credential cycles (15 minutes).
pub const DEFAULT_NODE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default namespace holding both the key record and node credentials.
pub const DEFAULT_NAMESPACE: &str = "kube-system";

/// Default name of the signing-key record.
pub const DEFAULT_KEY_RECORD_NAME: &str = "k3s-service-account-token-keys";

/// Default prefix of per-node credential records.
pub const DEFAULT_CREDENTIAL_PREFIX: &str = "node-password-";

/// Default number of failed deletes before a node is abandoned
/// (one day of retries at the default interval).
pub const DEFAULT_MAX_DELETE_ATTEMPTS: u32 = 96;

/// Default time a cleaned or abandoned node stays in the registry.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default minimum spacing of rejection warnings per node.
pub const DEFAULT_ADMISSION_LOG_INTERVAL: Duration = Duration::from_secs(60);

fn default_key_interval() -> Duration {
    DEFAULT_KEY_INTERVAL
}

fn default_stale_threshold() -> Duration {
    DEFAULT_STALE_THRESHOLD
}

fn default_node_interval() -> Duration {
    DEFAULT_NODE_INTERVAL
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

fn default_key_record_name() -> String {
    DEFAULT_KEY_RECORD_NAME.to_owned()
}

fn default_credential_prefix() -> String {
    DEFAULT_CREDENTIAL_PREFIX.to_owned()
}

fn default_max_delete_attempts() -> u32 {
    DEFAULT_MAX_DELETE_ATTEMPTS
}

fn default_retention() -> Duration {
    DEFAULT_RETENTION
}

fn default_admission_log_interval() -> Duration {
    DEFAULT_ADMISSION_LOG_INTERVAL
}

fn require_positive(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::MustBePositive { field, value: format!("{value:?}") });
    }
    Ok(())
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty { field });
    }
    Ok(())
}

/// Configuration for [`StaleKeyReaper`](crate::StaleKeyReaper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyReaperConfig {
    /// Time between cycles.
    #[serde(with = "humantime_serde", default = "default_key_interval")]
    pub(crate) interval: Duration,

    /// Keys strictly older than this are removed.
    #[serde(with = "humantime_serde", default = "default_stale_threshold")]
    pub(crate) stale_threshold: Duration,

    /// Namespace of the signing-key record.
    #[serde(default = "default_namespace")]
    pub(crate) namespace: String,

    /// Name of the signing-key record.
    #[serde(default = "default_key_record_name")]
    pub(crate) record_name: String,
}

impl Default for KeyReaperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_KEY_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            namespace: default_namespace(),
            record_name: default_key_record_name(),
        }
    }
}

#[bon::bon]
impl KeyReaperConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `interval` or `stale_threshold` is zero, or
    /// if `namespace` or `record_name` is empty.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_KEY_INTERVAL)] interval: Duration,
        #[builder(default = DEFAULT_STALE_THRESHOLD)] stale_threshold: Duration,
        #[builder(into, default = DEFAULT_NAMESPACE.to_owned())] namespace: String,
        #[builder(into, default = DEFAULT_KEY_RECORD_NAME.to_owned())] record_name: String,
    ) -> Result<Self, ConfigError> {
        let config = Self { interval, stale_threshold, namespace, record_name };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("interval", self.interval)?;
        require_positive("stale_threshold", self.stale_threshold)?;
        require_non_empty("namespace", &self.namespace)?;
        require_non_empty("record_name", &self.record_name)
    }

    /// Returns the time between cycles.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the staleness threshold.
    #[must_use]
    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Returns the namespace of the signing-key record.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the name of the signing-key record.
    #[must_use]
    pub fn record_name(&self) -> &str {
        &self.record_name
    }
}

/// Configuration for [`NodeCredentialReaper`](crate::NodeCredentialReaper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeReaperConfig {
    /// Time between cycles.
    #[serde(with = "humantime_serde", default = "default_node_interval")]
    pub(crate) interval: Duration,

    /// Namespace of the per-node credential records.
    #[serde(default = "default_namespace")]
    pub(crate) namespace: String,

    /// Record name prefix; the node name is appended.
    #[serde(default = "default_credential_prefix")]
    pub(crate) credential_prefix: String,

    /// Failed deletes tolerated before the node is abandoned.
    #[serde(default = "default_max_delete_attempts")]
    pub(crate) max_delete_attempts: u32,

    /// How long cleaned entries stay visible before eviction.
    #[serde(with = "humantime_serde", default = "default_retention")]
    pub(crate) retention: Duration,
}

impl Default for NodeReaperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_NODE_INTERVAL,
            namespace: default_namespace(),
            credential_prefix: default_credential_prefix(),
            max_delete_attempts: DEFAULT_MAX_DELETE_ATTEMPTS,
            retention: DEFAULT_RETENTION,
        }
    }
}

#[bon::bon]
impl NodeReaperConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `interval` or `retention` is zero
    /// - `max_delete_attempts` is zero
    /// - `namespace` or `credential_prefix` is empty
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_NODE_INTERVAL)] interval: Duration,
        #[builder(into, default = DEFAULT_NAMESPACE.to_owned())] namespace: String,
        #[builder(into, default = DEFAULT_CREDENTIAL_PREFIX.to_owned())] credential_prefix: String,
        #[builder(default = DEFAULT_MAX_DELETE_ATTEMPTS)] max_delete_attempts: u32,
        #[builder(default = DEFAULT_RETENTION)] retention: Duration,
    ) -> Result<Self, ConfigError> {
        let config =
            Self { interval, namespace, credential_prefix, max_delete_attempts, retention };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("interval", self.interval)?;
        require_non_empty("namespace", &self.namespace)?;
        require_non_empty("credential_prefix", &self.credential_prefix)?;
        if self.max_delete_attempts == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_delete_attempts",
                min: "1".into(),
                value: "0".into(),
            });
        }
        require_positive("retention", self.retention)
    }

    /// Returns the credential record name for a node.
    #[must_use]
    pub fn credential_name(&self, node: &str) -> String {
        format!("{}{node}", self.credential_prefix)
    }

    /// Returns the time between cycles.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the namespace of the credential records.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the credential record name prefix.
    #[must_use]
    pub fn credential_prefix(&self) -> &str {
        &self.credential_prefix
    }

    /// Returns the failed-delete cap.
    #[must_use]
    pub fn max_delete_attempts(&self) -> u32 {
        self.max_delete_attempts
    }

    /// Returns the retention of cleaned registry entries.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }
}

/// Configuration for [`CredentialCollector`](crate::CredentialCollector).
///
/// ```
/// use credential_gc::CollectorConfig;
///
/// let config: CollectorConfig = serde_json::from_str(
///     r#"{ "keys": { "stale_threshold": "12h" }, "nodes": { "interval": "5m" } }"#,
/// )?;
/// config.validate()?;
/// assert_eq!(config.keys().stale_threshold().as_secs(), 12 * 60 * 60);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// Stale-key reaper settings.
    #[serde(default)]
    #[builder(default)]
    pub(crate) keys: KeyReaperConfig,

    /// Node-credential reaper settings.
    #[serde(default)]
    #[builder(default)]
    pub(crate) nodes: NodeReaperConfig,

    /// Minimum spacing of rejection warnings for the same node.
    #[serde(with = "humantime_serde", default = "default_admission_log_interval")]
    #[builder(default = DEFAULT_ADMISSION_LOG_INTERVAL)]
    pub(crate) admission_log_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            keys: KeyReaperConfig::default(),
            nodes: NodeReaperConfig::default(),
            admission_log_interval: DEFAULT_ADMISSION_LOG_INTERVAL,
        }
    }
}

impl CollectorConfig {
    /// Validates both reaper sections.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keys.validate()?;
        self.nodes.validate()
    }

    /// Returns the stale-key reaper settings.
    #[must_use]
    pub fn keys(&self) -> &KeyReaperConfig {
        &self.keys
    }

    /// Returns the node-credential reaper settings.
    #[must_use]
    pub fn nodes(&self) -> &NodeReaperConfig {
        &self.nodes
    }

    /// Returns the minimum spacing of rejection warnings.
    #[must_use]
    pub fn admission_log_interval(&self) -> Duration {
        self.admission_log_interval
    }
}
