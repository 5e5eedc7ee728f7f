//! Cluster configuration store abstraction for credential garbage collection.
//!
//! The reapers in `credential-gc` never talk to the control plane directly.
//! They go through [`ClusterStore`], a three-call slice of the control-plane
//! API (read a versioned record, write it back under an optimistic-concurrency
//! check, delete by name), plus a `create` used by bootstrap code and tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────────┐
//! │   StaleKeyReaper     │   │  NodeCredentialReaper    │
//! │ get → prune → update │   │  delete node-password-*  │
//! └──────────┬───────────┘   └────────────┬─────────────┘
//!            │                            │
//!            ▼                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              ClusterStore (this crate)               │
//! │      get · create · update(version) · delete         │
//! ├──────────────────────────┬───────────────────────────┤
//! │   MemoryClusterStore     │  control-plane adapter    │
//! │   (testing)              │  (provided by the host)   │
//! └──────────────────────────┴───────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. A stale version token is
//! always [`StorageError::Conflict`]; a missing record is always
//! [`StorageError::NotFound`].
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (assertion macros, [`FailingStore`](testutil::FailingStore),
//!   [`CountingStore`](testutil::CountingStore), fixture builders) and the `conformance` suite.

#![deny(unsafe_code)]

#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod memory;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod types;

pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryClusterStore;
pub use store::ClusterStore;
pub use types::{ConfigRecord, RecordData, ResourceVersion, qualified_name};
pub use zeroize::Zeroizing;
