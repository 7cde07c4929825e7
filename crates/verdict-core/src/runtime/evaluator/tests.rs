// crates/verdict-core/src/runtime/evaluator/tests.rs
// ============================================================================
// Module: Evaluator Unit Tests
// Description: Unit coverage for all eleven operators and fault containment.
// Purpose: Ensure comparisons coerce, contain faults, and never panic.
// Dependencies: verdict-core
// ============================================================================

//! ## Overview
//! Covers operator semantics (numeric coercion, inclusive ranges, substring
//! and element containment, regex), boolean composition, and the fault
//! values emitted for missing attributes and malformed patterns.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::core::AttributeId;
use crate::core::BooleanMode;
use crate::core::ConditionOperator;
use crate::core::FactMap;

use super::Comparison;
use super::EvalFault;
use super::Operand;
use super::Predicate;
use super::evaluate_comparison;
use super::evaluate_predicate;

/// Builds a fact map from a JSON object literal.
fn facts(value: Value) -> FactMap {
    match value {
        Value::Object(map) => map,
        _ => FactMap::new(),
    }
}

/// Builds a scalar comparison.
fn scalar(attribute: &str, operator: ConditionOperator, constant: &str) -> Comparison {
    Comparison {
        attribute: AttributeId::new(attribute),
        operator,
        operand: Operand::Scalar(constant.to_string()),
    }
}

/// Builds a list comparison.
fn listed(attribute: &str, operator: ConditionOperator, entries: Value) -> Comparison {
    let Value::Array(entries) = entries else {
        return scalar(attribute, operator, "");
    };
    Comparison {
        attribute: AttributeId::new(attribute),
        operator,
        operand: Operand::List(entries),
    }
}

// ============================================================================
// SECTION: Operator Semantics
// ============================================================================

#[test]
fn equal_compares_canonical_text() -> Result<(), EvalFault> {
    let data = facts(json!({"status": "open", "count": 5}));
    assert!(evaluate_comparison(&scalar("status", ConditionOperator::Equal, "open"), &data)?);
    assert!(evaluate_comparison(&scalar("count", ConditionOperator::Equal, "5"), &data)?);
    assert!(!evaluate_comparison(&scalar("status", ConditionOperator::Equal, "closed"), &data)?);
    Ok(())
}

#[test]
fn not_equal_negates_equality() -> Result<(), EvalFault> {
    let data = facts(json!({"status": "open"}));
    assert!(evaluate_comparison(&scalar("status", ConditionOperator::NotEqual, "closed"), &data)?);
    Ok(())
}

#[test]
fn numeric_comparisons_coerce_numeric_strings() -> Result<(), EvalFault> {
    let data = facts(json!({"priority": "15", "score": 3.5}));
    assert!(evaluate_comparison(&scalar("priority", ConditionOperator::GreaterThan, "10"), &data)?);
    assert!(evaluate_comparison(
        &scalar("priority", ConditionOperator::GreaterThanOrEqual, "15"),
        &data
    )?);
    assert!(evaluate_comparison(&scalar("score", ConditionOperator::LessThan, "4"), &data)?);
    assert!(evaluate_comparison(&scalar("score", ConditionOperator::LessThanOrEqual, "3.5"), &data)?);
    Ok(())
}

#[test]
fn non_numeric_operand_on_numeric_comparison_is_false_not_fault() -> Result<(), EvalFault> {
    let data = facts(json!({"priority": "high"}));
    assert!(!evaluate_comparison(&scalar("priority", ConditionOperator::GreaterThan, "10"), &data)?);
    let data = facts(json!({"priority": 5}));
    assert!(!evaluate_comparison(&scalar("priority", ConditionOperator::GreaterThan, "soon"), &data)?);
    Ok(())
}

#[test]
fn membership_checks_canonical_elements() -> Result<(), EvalFault> {
    let data = facts(json!({"tier": "gold", "code": 7}));
    assert!(evaluate_comparison(
        &listed("tier", ConditionOperator::In, json!(["silver", "gold"])),
        &data
    )?);
    assert!(evaluate_comparison(
        &listed("code", ConditionOperator::In, json!([7, 9])),
        &data
    )?);
    assert!(evaluate_comparison(
        &listed("tier", ConditionOperator::NotIn, json!(["bronze"])),
        &data
    )?);
    Ok(())
}

#[test]
fn range_is_inclusive_on_both_endpoints() -> Result<(), EvalFault> {
    let data = facts(json!({"age": 18}));
    let comparison = listed("age", ConditionOperator::Range, json!([18, 65]));
    assert!(evaluate_comparison(&comparison, &data)?);
    let data = facts(json!({"age": 65}));
    assert!(evaluate_comparison(&comparison, &data)?);
    let data = facts(json!({"age": 66}));
    assert!(!evaluate_comparison(&comparison, &data)?);
    Ok(())
}

#[test]
fn contains_is_substring_for_strings_and_element_for_lists() -> Result<(), EvalFault> {
    let data = facts(json!({"title": "urgent: review", "labels": ["bug", "p1"]}));
    assert!(evaluate_comparison(&scalar("title", ConditionOperator::Contains, "urgent"), &data)?);
    assert!(evaluate_comparison(&scalar("labels", ConditionOperator::Contains, "p1"), &data)?);
    assert!(!evaluate_comparison(&scalar("labels", ConditionOperator::Contains, "p2"), &data)?);
    Ok(())
}

#[test]
fn regex_matches_canonical_text() -> Result<(), EvalFault> {
    let data = facts(json!({"email": "ops@example.com"}));
    assert!(evaluate_comparison(
        &scalar("email", ConditionOperator::Regex, r"^[a-z]+@example\.com$"),
        &data
    )?);
    Ok(())
}

// ============================================================================
// SECTION: Fault Containment
// ============================================================================

#[test]
fn missing_attribute_reports_available_keys() {
    let data = facts(json!({"status": "open", "priority": "15"}));
    let err = evaluate_comparison(&scalar("ghost", ConditionOperator::Equal, "x"), &data)
        .expect_err("expected missing-attribute fault");
    assert_eq!(err.code(), "ATTRIBUTE_NOT_FOUND");
    let EvalFault::MissingAttribute { attribute, available } = err else {
        panic!("wrong fault kind");
    };
    assert_eq!(attribute, "ghost");
    assert!(available.contains(&"status".to_string()));
    assert!(available.contains(&"priority".to_string()));
}

#[test]
fn malformed_regex_is_a_fault_not_a_silent_false() {
    let data = facts(json!({"email": "x"}));
    let err = evaluate_comparison(&scalar("email", ConditionOperator::Regex, "("), &data)
        .expect_err("expected regex fault");
    assert_eq!(err.code(), "REGEX_INVALID");
}

// ============================================================================
// SECTION: Boolean Composition
// ============================================================================

#[test]
fn and_mode_requires_every_clause() -> Result<(), EvalFault> {
    let data = facts(json!({"status": "open", "age": 20}));
    let predicate = Predicate {
        clauses: vec![
            scalar("status", ConditionOperator::Equal, "open"),
            scalar("age", ConditionOperator::GreaterThan, "18"),
        ],
        mode: BooleanMode::And,
    };
    assert!(evaluate_predicate(&predicate, &data)?);
    let data = facts(json!({"status": "open", "age": 10}));
    assert!(!evaluate_predicate(&predicate, &data)?);
    Ok(())
}

#[test]
fn or_mode_requires_any_clause() -> Result<(), EvalFault> {
    let data = facts(json!({"status": "closed", "age": 20}));
    let predicate = Predicate {
        clauses: vec![
            scalar("status", ConditionOperator::Equal, "open"),
            scalar("age", ConditionOperator::GreaterThan, "18"),
        ],
        mode: BooleanMode::Or,
    };
    assert!(evaluate_predicate(&predicate, &data)?);
    Ok(())
}
