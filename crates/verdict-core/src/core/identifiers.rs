// crates/verdict-core/src/core/identifiers.rs
// ============================================================================
// Module: Verdict Identifiers
// Description: Canonical opaque identifiers for rules, rulesets, and tests.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Verdict.
//! Identifiers are opaque and serialize as numbers or strings on the wire.
//! Numeric identifiers enforce non-zero, 1-based invariants at construction
//! boundaries; string identifiers apply no normalization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Numeric Identifiers
// ============================================================================

/// Ruleset identifier assigned by the authoritative store.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulesetId(NonZeroU64);

impl RulesetId {
    /// Creates a new ruleset identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a ruleset identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RulesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

// ============================================================================
// SECTION: String Identifiers
// ============================================================================

/// Declares an opaque string identifier newtype with the shared accessors.
macro_rules! string_identifier {
    ($(#[$outer:meta])* $name:ident) => {
        $(#[$outer])*
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` when the identifier is empty or whitespace-only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_identifier! {
    /// Rule identifier stable across rule versions.
    RuleId
}

string_identifier! {
    /// Condition identifier referenced by rule condition sets.
    ConditionId
}

string_identifier! {
    /// Attribute identifier naming a fact-record key.
    AttributeId
}

string_identifier! {
    /// A/B test identifier.
    TestId
}

string_identifier! {
    /// Consumer identity used for per-rule usage attribution.
    ConsumerId
}

string_identifier! {
    /// Execution identifier assigned to one evaluation.
    ExecutionId
}

string_identifier! {
    /// Correlation identifier threaded through a request for tracing.
    CorrelationId
}
