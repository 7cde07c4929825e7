// crates/verdict-providers/src/normalize/tests.rs
// ============================================================================
// Module: Normalization Unit Tests
// Description: Unit coverage for loose-document normalization.
// Purpose: Ensure legacy aliases and both rule shapes normalize correctly.
// Dependencies: verdict-providers
// ============================================================================

//! ## Overview
//! Covers alias acceptance (`rulename`, `rulepoint`, `result`, `equation`),
//! flat-shape detection, and pattern-map normalization.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::json;
use verdict_core::ConditionOperator;
use verdict_core::RulesetId;

use super::normalize_condition;
use super::normalize_patterns;
use super::normalize_rule;
use super::normalize_rules_set;

/// Returns the fixture ruleset identifier.
fn ruleset() -> RulesetId {
    RulesetId::from_raw(1).expect("nonzero")
}

// ============================================================================
// SECTION: Rules
// ============================================================================

#[test]
fn structured_rule_with_legacy_aliases_normalizes() {
    let value = json!({
        "rulename": "Rule1",
        "type": "simple",
        "priority": 2,
        "conditions": {"item": "cond1"},
        "rulepoint": 10,
        "weight": 1.5,
        "result": "Y",
    });
    let rule = normalize_rule(&value, ruleset()).expect("normalize");
    assert_eq!(rule.rule_name, "Rule1");
    assert_eq!(rule.rule_id.as_str(), "Rule1");
    assert_eq!(rule.rule_point, 10);
    assert_eq!(rule.weight, 1.5);
    assert_eq!(rule.priority, 2);
    assert_eq!(rule.action_result, "Y");
    assert!(rule.conditions.is_some());
    assert!(rule.flat.is_none());
}

#[test]
fn flat_rule_normalizes_its_inline_triple() {
    let value = json!({
        "rule_name": "AgeGate",
        "attribute": "age",
        "condition": "greater_than",
        "constant": "18",
        "message": "adults only",
        "rule_point": 5,
        "weight": 1.0,
        "priority": 1,
        "action_result": "Y",
    });
    let rule = normalize_rule(&value, ruleset()).expect("normalize");
    let flat = rule.flat.expect("flat shape");
    assert_eq!(flat.attribute.as_str(), "age");
    assert_eq!(flat.operator, ConditionOperator::GreaterThan);
    assert_eq!(flat.constant, "18");
    assert_eq!(flat.message.as_deref(), Some("adults only"));
    assert!(rule.conditions.is_none());
}

#[test]
fn unknown_operator_is_rejected() {
    let value = json!({
        "rule_name": "Bad",
        "attribute": "age",
        "condition": ">>",
        "constant": "18",
    });
    assert!(normalize_rule(&value, ruleset()).is_err());
}

#[test]
fn nameless_rule_is_rejected() {
    assert!(normalize_rule(&json!({"priority": 1}), ruleset()).is_err());
}

#[test]
fn rules_set_requires_the_list_key() {
    assert!(normalize_rules_set(&json!({}), ruleset()).is_err());
    let document = json!({"rules_set": [{"rulename": "R", "conditions": {"item": "c"}}]});
    let rules = normalize_rules_set(&document, ruleset()).expect("normalize");
    assert_eq!(rules.len(), 1);
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

#[test]
fn condition_accepts_the_equation_alias() {
    let value = json!({
        "condition_id": "cond1",
        "condition_name": "open status",
        "attribute": "status",
        "equation": "equal",
        "constant": "open",
    });
    let condition = normalize_condition(&value).expect("normalize");
    assert_eq!(condition.operator, ConditionOperator::Equal);
    assert_eq!(condition.attribute.as_str(), "status");
}

#[test]
fn condition_without_attribute_is_rejected() {
    let value = json!({"condition_id": "cond1", "equation": "equal"});
    assert!(normalize_condition(&value).is_err());
}

// ============================================================================
// SECTION: Patterns
// ============================================================================

#[test]
fn patterns_map_normalizes_to_actionset_entries() {
    let document = json!({"patterns": {"YY": "APPROVE", "Y-": "REVIEW"}});
    let mut entries = normalize_patterns(&document, ruleset()).expect("normalize");
    entries.sort_by(|left, right| left.pattern_key.cmp(&right.pattern_key));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].pattern_key, "Y-");
    assert_eq!(entries[0].action_recommendation, "REVIEW");
}

#[test]
fn non_string_recommendations_are_rejected() {
    let document = json!({"patterns": {"YY": 5}});
    assert!(normalize_patterns(&document, ruleset()).is_err());
}
