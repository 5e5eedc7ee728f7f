//! Background garbage collection of cluster credentials.
//!
//! Two independent reapers keep credential material from outliving its use:
//!
//! - [`StaleKeyReaper`] periodically prunes signing keys whose embedded issue timestamp is older
//!   than a threshold from the shared key record, writing back under optimistic concurrency.
//! - [`NodeCredentialReaper`] periodically deletes the per-node credential record of every node
//!   listed in the [`NodeCredentialRegistry`].
//!
//! The registry also answers the token verification path, directly through
//! [`NodeCredentialRegistry::is_node_removed`] or through the rate-limited
//! [`RemovedNodeAdmission`] check. [`CredentialCollector`] wires all of it
//! together.
//!
//! # Architecture
//!
//! ```text
//!   node-removal detector            token verification
//!             │                               │
//!             ▼                               ▼
//! ┌────────────────────────┐   ┌──────────────────────┐
//! │ NodeCredentialRegistry │◄──│ RemovedNodeAdmission │
//! └───────────┬────────────┘   └──────────────────────┘
//!             │ snapshot_pending
//!             ▼
//! ┌────────────────────────┐   ┌──────────────────────┐
//! │  NodeCredentialReaper  │   │    StaleKeyReaper    │
//! └───────────┬────────────┘   └──────────┬───────────┘
//!             │ delete                    │ get / update(version)
//!             ▼                           ▼
//! ┌───────────────────────────────────────────────────┐
//! │          ClusterStore (credential-gc-store)       │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! Each reaper is started at most once per instance: the first
//! `start` spawns its loop and returns `true`, every later call returns
//! `false`. Loops stop when the caller's [`CancellationToken`] is cancelled
//! or the reaper is shut down. Store errors never stop a loop; they are
//! logged, counted in [`ReaperMetrics`], and retried on the next tick.
//!
//! # Feature Flags
//!
//! - **`failpoints`**: compiles the `key-reaper-before-write` and `node-reaper-before-delete` fail
//!   points (see the `fail` crate) into the reapers.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![deny(unsafe_code)]

pub mod admission;
pub mod collector;
pub mod config;
pub mod error;
pub mod key_name;
pub mod metrics;
pub mod node_credentials;
pub mod registry;
pub mod stale_keys;
mod task;

pub use admission::RemovedNodeAdmission;
pub use collector::CredentialCollector;
pub use config::{CollectorConfig, KeyReaperConfig, NodeReaperConfig};
pub use error::{AdmissionError, ConfigError, ReaperErrorKind};
pub use key_name::{ParsedKeyName, is_stale, parse_key_name};
pub use metrics::{ReaperMetrics, ReaperMetricsSnapshot};
pub use node_credentials::{NodeCredentialReaper, NodeReapReport};
pub use registry::{CleanupState, NodeCredentialRegistry, RemovedNode, RemovedNodeEntry};
pub use stale_keys::{KeyReapOutcome, KeyReapReport, StaleKeyReaper};
