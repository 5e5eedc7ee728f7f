//! Signing-key entry names and the staleness predicate.
//!
//! Entries of the signing-key record are named `<kid>-<timestamp>`, where the
//! timestamp is RFC 3339 and the key id may itself contain dashes:
//!
//! ```text
//! sa-key-2025-06-01T00:00:00Z
//! └─┬──┘ └────────┬─────────┘
//!   kid       issued_at
//! ```
//!
//! The timestamp is the longest suffix following a `-` that parses as
//! RFC 3339. Names without such a suffix, or with an empty key id, are
//! unparseable and are never considered stale.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// A successfully parsed signing-key entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKeyName<'a> {
    /// Logical key id preceding the timestamp.
    pub kid: &'a str,
    /// Issue time carried in the name.
    pub issued_at: DateTime<Utc>,
}

/// Splits an entry name into its key id and trailing timestamp.
///
/// Returns `None` for names that do not carry a trailing RFC 3339 timestamp
/// or whose key id would be empty.
///
/// # Examples
///
/// ```
/// use credential_gc::parse_key_name;
///
/// let parsed = parse_key_name("sa-key-2023-01-01T00:00:00Z").expect("parseable");
/// assert_eq!(parsed.kid, "sa-key");
///
/// assert!(parse_key_name("sa-key-malformed").is_none());
/// ```
#[must_use]
pub fn parse_key_name(name: &str) -> Option<ParsedKeyName<'_>> {
    // Leftmost separator first, so the first match is the longest suffix.
    name.match_indices('-').find_map(|(idx, _)| {
        let kid = &name[..idx];
        if kid.is_empty() {
            return None;
        }
        let issued_at = DateTime::parse_from_rfc3339(&name[idx + 1..]).ok()?;
        Some(ParsedKeyName { kid, issued_at: issued_at.with_timezone(&Utc) })
    })
}

/// Returns `true` if a key issued at `issued_at` is older than `threshold`
/// at `now`.
///
/// The comparison is strict: a key whose age equals the threshold is kept.
/// Keys dated in the future are never stale.
#[must_use]
pub fn is_stale(issued_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(issued_at) > threshold
}
