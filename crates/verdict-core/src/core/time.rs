// crates/verdict-core/src/core/time.rs
// ============================================================================
// Module: Verdict Time Model
// Description: Canonical timestamp representation for logs and snapshots.
// Purpose: Provide deterministic, replayable time values across Verdict records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Verdict embeds explicit time values in execution logs, version snapshots,
//! and reload results to keep replay deterministic. The core engine never
//! reads wall-clock time directly; hosts supply timestamps through the
//! [`crate::interfaces::Clock`] seam.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in Verdict logs and snapshot records.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }

    /// Renders the timestamp as an RFC3339 string when it carries wall-clock time.
    ///
    /// Logical timestamps render as `logical:<value>` to stay unambiguous in
    /// log output.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        match self {
            Self::UnixMillis(millis) => {
                let nanos = i128::from(*millis) * 1_000_000;
                OffsetDateTime::from_unix_timestamp_nanos(nanos)
                    .ok()
                    .and_then(|datetime| datetime.format(&Rfc3339).ok())
                    .unwrap_or_else(|| format!("unix_millis:{millis}"))
            }
            Self::Logical(value) => format!("logical:{value}"),
        }
    }
}
