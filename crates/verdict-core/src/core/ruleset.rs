// crates/verdict-core/src/core/ruleset.rs
// ============================================================================
// Module: Verdict Ruleset Model
// Description: Ruleset and actionset-entry records.
// Purpose: Define the evaluation unit owning rules and pattern lookups.
// Dependencies: crate::core::{identifiers, rule}, serde, serde_json
// ============================================================================

//! ## Overview
//! A ruleset is the unit of evaluation: it owns its rules and its actionset
//! (the map from a concatenated per-rule action pattern to a recommendation).
//! Ownership is arena-style — actionset entries reference the ruleset by
//! identifier, never by back-pointer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RulesetId;
use crate::core::rule::RuleStatus;

// ============================================================================
// SECTION: Ruleset Record
// ============================================================================

/// Named collection of rules plus an actionset, evaluated as a unit.
///
/// # Invariants
/// - `name` is unique across rulesets.
/// - At most one active ruleset per tenant carries `is_default = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetRecord {
    /// Ruleset identifier.
    pub id: RulesetId,
    /// Unique ruleset name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Version label assigned by the management surface.
    pub version: String,
    /// Lifecycle status.
    pub status: RuleStatus,
    /// Optional tenant scope.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Marks the ruleset selected when an evaluation names none.
    #[serde(default)]
    pub is_default: bool,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RulesetRecord {
    /// Returns `true` when the ruleset is live and eligible for evaluation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }
}

// ============================================================================
// SECTION: Actionset Entries
// ============================================================================

/// One actionset entry: a pattern key mapped to a recommendation.
///
/// # Invariants
/// - `(ruleset_id, pattern_key)` is unique.
/// - `pattern_key` is compared to evaluation pattern results by exact string
///   equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsetEntry {
    /// Owning ruleset.
    pub ruleset_id: RulesetId,
    /// Exact-match pattern key (e.g. `"YYY"`, `"Y--"`).
    pub pattern_key: String,
    /// Recommendation returned when the pattern matches.
    pub action_recommendation: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}
