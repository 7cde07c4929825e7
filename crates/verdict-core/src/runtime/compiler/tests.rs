// crates/verdict-core/src/runtime/compiler/tests.rs
// ============================================================================
// Module: Compiler Unit Tests
// Description: Unit coverage for rule shape resolution and lowering.
// Purpose: Ensure the full compile failure taxonomy is reachable and
//          prepared lists sort deterministically.
// Dependencies: verdict-core
// ============================================================================

//! ## Overview
//! Exercises both accepted rule shapes, each compile error code, and the
//! priority-ordering and purity guarantees of batch compilation.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::json;

use crate::core::AttributeId;
use crate::core::ConditionId;
use crate::core::ConditionOperator;
use crate::core::ConditionRecord;
use crate::core::FlatCondition;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::RuleStatus;
use crate::core::RulesetId;

use super::CompileError;
use super::compile_rule;
use super::compile_rules;
use super::rules_fingerprint;

/// Returns the shared ruleset identifier for fixtures.
fn ruleset() -> RulesetId {
    RulesetId::from_raw(1).expect("nonzero")
}

/// Builds a condition fixture.
fn condition(
    id: &str,
    attribute: &str,
    operator: ConditionOperator,
    constant: &str,
) -> ConditionRecord {
    ConditionRecord {
        condition_id: ConditionId::new(id),
        condition_name: format!("{id} name"),
        attribute: AttributeId::new(attribute),
        operator,
        constant: constant.to_string(),
    }
}

/// Builds a structured rule fixture.
fn structured_rule(rule_id: &str, priority: i32, conditions: serde_json::Value) -> RuleRecord {
    RuleRecord {
        row_id: 1,
        rule_id: RuleId::new(rule_id),
        rule_name: format!("{rule_id} name"),
        ruleset_id: ruleset(),
        conditions: Some(conditions),
        flat: None,
        rule_point: 10,
        weight: 1.0,
        priority,
        action_result: "Y".to_string(),
        status: RuleStatus::Active,
        version: "1.0".to_string(),
        tags: None,
        metadata: None,
    }
}

/// Builds a flat rule fixture.
fn flat_rule(
    rule_id: &str,
    attribute: &str,
    operator: ConditionOperator,
    constant: &str,
) -> RuleRecord {
    RuleRecord {
        flat: Some(FlatCondition {
            attribute: AttributeId::new(attribute),
            operator,
            constant: constant.to_string(),
            message: Some("inline".to_string()),
        }),
        conditions: None,
        ..structured_rule(rule_id, 1, json!({}))
    }
}

/// Asserts that compiling the rule fails with the given code.
fn assert_code(rule: &RuleRecord, conditions: &[ConditionRecord], code: &str) {
    match compile_rule(rule, conditions) {
        Ok(_) => panic!("unexpected compile success, wanted {code}"),
        Err(err) => assert_eq!(err.error_code(), code),
    }
}

// ============================================================================
// SECTION: Shape Resolution
// ============================================================================

#[test]
fn simple_rule_compiles_to_single_clause() -> Result<(), CompileError> {
    let conditions = [condition("c1", "status", ConditionOperator::Equal, "open")];
    let rule = structured_rule("r1", 1, json!({"item": "c1"}));
    let prepared = compile_rule(&rule, &conditions)?;
    assert_eq!(prepared.predicate.clauses.len(), 1);
    assert_eq!(prepared.predicate.clauses[0].attribute.as_str(), "status");
    Ok(())
}

#[test]
fn complex_rule_compiles_all_clauses_in_order() -> Result<(), CompileError> {
    let conditions = [
        condition("c1", "status", ConditionOperator::Equal, "open"),
        condition("c2", "age", ConditionOperator::GreaterThan, "18"),
    ];
    let rule = structured_rule("r1", 1, json!({"items": ["c1", "c2"], "mode": "and"}));
    let prepared = compile_rule(&rule, &conditions)?;
    assert_eq!(prepared.predicate.clauses.len(), 2);
    assert_eq!(prepared.predicate.clauses[1].attribute.as_str(), "age");
    Ok(())
}

#[test]
fn flat_rule_resolves_to_existing_condition() -> Result<(), CompileError> {
    let conditions = [condition("c9", "status", ConditionOperator::Equal, "open")];
    let rule = flat_rule("r1", "status", ConditionOperator::Equal, "open");
    let prepared = compile_rule(&rule, &conditions)?;
    assert_eq!(prepared.predicate.clauses[0].attribute.as_str(), "status");
    Ok(())
}

#[test]
fn flat_rule_without_matching_condition_names_the_triple() {
    let conditions = [condition("c9", "status", ConditionOperator::Equal, "open")];
    let rule = flat_rule("r1", "status", ConditionOperator::Equal, "closed");
    let err = compile_rule(&rule, &conditions).expect_err("expected CONDITION_NOT_FOUND");
    assert_eq!(err.error_code(), "CONDITION_NOT_FOUND");
    let message = err.to_string();
    assert!(message.contains("r1 name"));
    assert!(message.contains("closed"));
}

// ============================================================================
// SECTION: Failure Taxonomy
// ============================================================================

#[test]
fn blank_rule_is_rejected() {
    let mut rule = structured_rule("", 1, json!({"item": "c1"}));
    rule.rule_name = String::new();
    assert_code(&rule, &[], "RULE_EMPTY");
}

#[test]
fn mixed_shapes_are_rejected() {
    let mut rule = structured_rule("r1", 1, json!({"item": "c1"}));
    rule.flat = Some(FlatCondition {
        attribute: AttributeId::new("status"),
        operator: ConditionOperator::Equal,
        constant: "open".to_string(),
        message: None,
    });
    assert_code(&rule, &[], "RULE_INVALID_TYPE");
}

#[test]
fn non_object_conditions_are_rejected() {
    let rule = structured_rule("r1", 1, json!(["c1"]));
    assert_code(&rule, &[], "RULE_INVALID_CONDITIONS");
}

#[test]
fn missing_item_is_rejected() {
    let rule = structured_rule("r1", 1, json!({}));
    assert_code(&rule, &[], "RULE_MISSING_CONDITION_ITEM");
}

#[test]
fn mode_without_items_is_rejected() {
    let rule = structured_rule("r1", 1, json!({"mode": "and"}));
    assert_code(&rule, &[], "RULE_MISSING_CONDITIONS_ITEMS");
}

#[test]
fn empty_items_are_rejected() {
    let rule = structured_rule("r1", 1, json!({"items": [], "mode": "and"}));
    assert_code(&rule, &[], "RULE_EMPTY_CONDITIONS");
}

#[test]
fn items_without_mode_are_rejected() {
    let rule = structured_rule("r1", 1, json!({"items": ["c1"]}));
    assert_code(&rule, &[], "RULE_MISSING_MODE");
}

#[test]
fn unresolved_structured_reference_is_rejected() {
    let rule = structured_rule("r1", 1, json!({"item": "ghost"}));
    assert_code(&rule, &[], "CONDITION_NOT_FOUND");
}

#[test]
fn blank_flat_condition_is_rejected() {
    let rule = flat_rule("r1", "status", ConditionOperator::Equal, "   ");
    assert_code(&rule, &[], "CONDITION_EMPTY");
}

#[test]
fn malformed_list_operand_is_rejected() {
    let conditions = [condition("c1", "tier", ConditionOperator::In, "gold")];
    let rule = structured_rule("r1", 1, json!({"item": "c1"}));
    assert_code(&rule, &conditions, "RULE_INVALID_CONDITIONS");
}

#[test]
fn range_operand_requires_two_endpoints() {
    let conditions = [condition("c1", "age", ConditionOperator::Range, "[1, 2, 3]")];
    let rule = structured_rule("r1", 1, json!({"item": "c1"}));
    assert_code(&rule, &conditions, "RULE_INVALID_CONDITIONS");
}

// ============================================================================
// SECTION: Ordering and Purity
// ============================================================================

#[test]
fn batch_compilation_sorts_by_priority_with_stable_ties() -> Result<(), CompileError> {
    let conditions = [condition("c1", "status", ConditionOperator::Equal, "open")];
    let rules = [
        structured_rule("r-late", 5, json!({"item": "c1"})),
        structured_rule("r-tie-first", 2, json!({"item": "c1"})),
        structured_rule("r-tie-second", 2, json!({"item": "c1"})),
        structured_rule("r-early", 1, json!({"item": "c1"})),
    ];
    let prepared = compile_rules(&rules, &conditions)?;
    let order: Vec<&str> = prepared.iter().map(|rule| rule.rule_id.as_str()).collect();
    assert_eq!(order, ["r-early", "r-tie-first", "r-tie-second", "r-late"]);
    Ok(())
}

#[test]
fn fingerprint_ignores_insertion_order() {
    let first = [
        structured_rule("r1", 1, json!({"item": "c1"})),
        structured_rule("r2", 2, json!({"item": "c1"})),
    ];
    let second = [
        structured_rule("r2", 2, json!({"item": "c1"})),
        structured_rule("r1", 1, json!({"item": "c1"})),
    ];
    let left = rules_fingerprint(&first).map(|digest| digest.as_str().to_string());
    let right = rules_fingerprint(&second).map(|digest| digest.as_str().to_string());
    assert_eq!(left.ok(), right.ok());
}
