// crates/verdict-core/src/core/rule.rs
// ============================================================================
// Module: Verdict Rule Model
// Description: Rule, condition, and attribute records with operator enums.
// Purpose: Define the declarative rule shapes accepted by the compiler.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! Rule records arrive from the authoritative store or a config source in one
//! of two shapes: *structured* (condition references plus a boolean mode) or
//! *flat* (an inline attribute/operator/constant triple). The compiler
//! resolves both into prepared predicates; records here stay declarative.
//!
//! Operator strings are bit-exact for store and wire compatibility: no
//! aliases, no case folding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AttributeId;
use crate::core::identifiers::ConditionId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RulesetId;

// ============================================================================
// SECTION: Lifecycle Status
// ============================================================================

/// Rule and ruleset lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and store matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Authored but not yet servable.
    Draft,
    /// Live and eligible for evaluation.
    Active,
    /// Temporarily disabled.
    Inactive,
    /// Superseded; kept for reference.
    Deprecated,
    /// Retired and hidden from listings.
    Archived,
}

impl RuleStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Deprecated => "deprecated",
            Self::Archived => "archived",
        }
    }
}

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Condition operator set.
///
/// # Invariants
/// - Exactly these eleven wire strings exist; store rows and wire payloads
///   use them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Canonicalized string equality.
    Equal,
    /// Canonicalized string inequality.
    NotEqual,
    /// Numeric greater-than with string coercion.
    GreaterThan,
    /// Numeric greater-than-or-equal with string coercion.
    GreaterThanOrEqual,
    /// Numeric less-than with string coercion.
    LessThan,
    /// Numeric less-than-or-equal with string coercion.
    LessThanOrEqual,
    /// Membership in a list-typed operand.
    In,
    /// Non-membership in a list-typed operand.
    NotIn,
    /// Inclusive two-endpoint numeric range.
    Range,
    /// Substring for strings, element-of for lists.
    Contains,
    /// Regular-expression match over the canonicalized fact value.
    Regex,
}

impl ConditionOperator {
    /// Returns the stable wire label for the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThan => "less_than",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Range => "range",
            Self::Contains => "contains",
            Self::Regex => "regex",
        }
    }

    /// Returns `true` when the operator requires a list-typed operand.
    #[must_use]
    pub const fn takes_list_operand(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Range)
    }
}

/// Boolean combinator for complex rules.
///
/// # Invariants
/// - Variants are stable for serialization and store matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanMode {
    /// Every condition must hold.
    And,
    /// At least one condition must hold.
    Or,
}

// ============================================================================
// SECTION: Condition References
// ============================================================================

/// Normalized condition references for a structured rule.
///
/// Rule records carry condition references as raw JSON exactly as the store
/// or config source holds them; the compiler normalizes that JSON into this
/// shape (and rewrites flat rules into it). New writes canonicalize on this
/// form at the store boundary.
///
/// # Invariants
/// - `Simple` names exactly one condition; `Complex` names one or more
///   combined by a single mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionRefs {
    /// Single condition reference.
    Simple {
        /// Referenced condition identifier.
        item: ConditionId,
    },
    /// Ordered condition references combined by one boolean mode.
    Complex {
        /// Referenced condition identifiers in evaluation order.
        items: Vec<ConditionId>,
        /// Boolean combinator applied between every pair.
        mode: BooleanMode,
    },
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Reusable atomic condition.
///
/// # Invariants
/// - `condition_id` is unique within the condition set.
/// - For list operators the `constant` encodes a JSON-serialized list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRecord {
    /// Condition identifier.
    pub condition_id: ConditionId,
    /// Human-readable condition name.
    pub condition_name: String,
    /// Fact-record key the condition reads.
    pub attribute: AttributeId,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Comparison constant (JSON list encoding for list operators).
    pub constant: String,
}

/// Inline condition triple carried by a flat-shaped rule.
///
/// # Invariants
/// - All three fields describe one atomic comparison; `message` is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatCondition {
    /// Fact-record key the rule reads.
    pub attribute: AttributeId,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Comparison constant.
    pub constant: String,
    /// Advisory message attached to the rule.
    #[serde(default)]
    pub message: Option<String>,
}

/// Declarative rule record.
///
/// # Invariants
/// - Exactly one of `conditions` (structured shape) or `flat` (inline shape)
///   should be populated; the compiler rejects records carrying neither.
/// - `rule_point >= 0` and `weight >= 0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Numeric store row identifier (0 when the record never hit the store).
    #[serde(default)]
    pub row_id: i64,
    /// Rule identifier stable across versions.
    pub rule_id: RuleId,
    /// Human-readable rule name.
    pub rule_name: String,
    /// Owning ruleset.
    pub ruleset_id: RulesetId,
    /// Structured condition references as raw JSON (normalized by the
    /// compiler into [`ConditionRefs`]).
    #[serde(default)]
    pub conditions: Option<Value>,
    /// Inline condition triple for flat-shaped records.
    #[serde(flatten)]
    pub flat: Option<FlatCondition>,
    /// Points awarded on match, before weighting.
    pub rule_point: u32,
    /// Weight multiplier applied to `rule_point`.
    pub weight: f64,
    /// Evaluation order; lower runs earlier.
    pub priority: i32,
    /// Action token or template emitted on match.
    pub action_result: String,
    /// Lifecycle status.
    pub status: RuleStatus,
    /// Version label assigned by the management surface.
    #[serde(default)]
    pub version: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RuleRecord {
    /// Returns the points contributed on match: `rule_point × weight`.
    #[must_use]
    pub fn calculated_points(&self) -> f64 {
        f64::from(self.rule_point) * self.weight
    }
}

// ============================================================================
// SECTION: Attributes
// ============================================================================

/// Semantic type of a fact attribute.
///
/// # Invariants
/// - Variants are stable for serialization and store matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// UTF-8 string.
    String,
    /// Floating-point number.
    Number,
    /// Whole number.
    Integer,
    /// Boolean flag.
    Boolean,
    /// Calendar date.
    Date,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

/// Fact descriptor: the key a fact record uses and a condition references.
///
/// # Invariants
/// - `attribute_id` is unique and stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Attribute identifier.
    pub attribute_id: AttributeId,
    /// Human-readable attribute name.
    pub name: String,
    /// Semantic value type.
    pub data_type: AttributeKind,
    /// Lifecycle status.
    pub status: RuleStatus,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn operator_wire_strings_are_exact() {
        let rendered = serde_json::to_value(ConditionOperator::GreaterThanOrEqual).ok();
        assert_eq!(rendered, Some(json!("greater_than_or_equal")));
        let parsed: Result<ConditionOperator, _> = serde_json::from_value(json!("not_in"));
        assert_eq!(parsed.ok(), Some(ConditionOperator::NotIn));
    }

    #[test]
    fn operator_rejects_aliases() {
        let parsed: Result<ConditionOperator, _> = serde_json::from_value(json!("EQUAL"));
        assert!(parsed.is_err());
        let parsed: Result<ConditionOperator, _> = serde_json::from_value(json!("=="));
        assert!(parsed.is_err());
    }

    #[test]
    fn condition_refs_parse_both_shapes() {
        let simple: Result<ConditionRefs, _> = serde_json::from_value(json!({"item": "cond-1"}));
        assert!(matches!(simple, Ok(ConditionRefs::Simple { .. })));
        let complex: Result<ConditionRefs, _> =
            serde_json::from_value(json!({"items": ["cond-1", "cond-2"], "mode": "and"}));
        assert!(matches!(complex, Ok(ConditionRefs::Complex { .. })));
    }

    #[test]
    fn calculated_points_is_point_times_weight() {
        let Some(ruleset_id) = RulesetId::from_raw(1) else {
            return;
        };
        let rule = RuleRecord {
            row_id: 1,
            rule_id: RuleId::new("r-1"),
            rule_name: "rule one".to_string(),
            ruleset_id,
            conditions: None,
            flat: None,
            rule_point: 20,
            weight: 1.5,
            priority: 1,
            action_result: "Y".to_string(),
            status: RuleStatus::Active,
            version: "1.0".to_string(),
            tags: None,
            metadata: None,
        };
        assert!((rule.calculated_points() - 30.0).abs() < f64::EPSILON);
    }
}
