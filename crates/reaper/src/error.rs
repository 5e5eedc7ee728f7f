//! Error types for configuration, admission checks, and cycle reporting.

use credential_gc_store::StorageError;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric or duration field is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted value, rendered for display.
        min: String,
        /// The rejected value, rendered for display.
        value: String,
    },

    /// A duration that must be non-zero is zero.
    #[error("{field} must be positive, got {value}")]
    MustBePositive {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value, rendered for display.
        value: String,
    },

    /// A required string field is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Rejection returned to the token verification path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AdmissionError {
    /// The node presenting the credential has been removed from the cluster.
    #[error("Node {node} (ID: {node_id}) has been removed from the cluster")]
    NodeRemoved {
        /// Name of the removed node.
        node: String,
        /// Identifier recorded at removal.
        node_id: String,
    },
}

/// Classification of a [`StorageError`], carried in cycle reports and metrics.
///
/// Reports are plain data (`Clone`, `Eq`), so they keep the kind of the
/// failure rather than the error itself; the full error is logged where it
/// occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaperErrorKind {
    /// The record was not found.
    NotFound,
    /// The version token was stale (concurrent writer).
    Conflict,
    /// Connection or network error.
    Connection,
    /// The store client timed out.
    Timeout,
    /// Record encoding or decoding failed.
    Serialization,
    /// Any other store error.
    Other,
}

impl ReaperErrorKind {
    /// Short, stable label for structured log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Serialization => "serialization",
            Self::Other => "other",
        }
    }
}

impl From<&StorageError> for ReaperErrorKind {
    fn from(err: &StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound,
            StorageError::Conflict => Self::Conflict,
            StorageError::Connection { .. } => Self::Connection,
            StorageError::Timeout => Self::Timeout,
            StorageError::Serialization { .. } => Self::Serialization,
            _ => Self::Other,
        }
    }
}
