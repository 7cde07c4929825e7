// crates/verdict-core/src/runtime/template/tests.rs
// ============================================================================
// Module: Template Unit Tests
// Description: Unit coverage for FEEL-subset action templates.
// Purpose: Ensure substitution, joining, and fault restoration behave per
//          the public contract.
// Dependencies: verdict-core
// ============================================================================

//! ## Overview
//! Covers plain-token passthrough, variable substitution with missing keys,
//! `string join` argument parsing with quoted separators, and the
//! two-argument join policy.

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

use crate::core::FactMap;

use super::expand;
use super::is_template;

/// Builds a fact map from a JSON object literal.
fn facts(value: Value) -> FactMap {
    match value {
        Value::Object(map) => map,
        _ => FactMap::new(),
    }
}

// ============================================================================
// SECTION: Detection and Passthrough
// ============================================================================

#[test]
fn plain_tokens_pass_through() {
    let data = facts(json!({"can": "wood"}));
    assert!(!is_template("Y"));
    assert_eq!(expand("Y", &data), "Y");
    assert_eq!(expand("APPROVE", &data), "APPROVE");
}

// ============================================================================
// SECTION: Variable Substitution
// ============================================================================

#[test]
fn variables_substitute_fact_values() {
    let data = facts(json!({"can": "wood", "count": 3}));
    assert_eq!(expand("{can}", &data), "wood");
    assert_eq!(expand("{count}", &data), "3");
    assert_eq!(expand("tier-{can}", &data), "tier-wood");
}

#[test]
fn missing_variables_substitute_empty() {
    let data = facts(json!({"can": "wood"}));
    assert_eq!(expand("{ghost}", &data), "");
    assert_eq!(expand("a{ghost}b", &data), "ab");
}

#[test]
fn unclosed_brace_is_preserved() {
    let data = facts(json!({"can": "wood"}));
    assert_eq!(expand("{can", &data), "{can");
}

// ============================================================================
// SECTION: String Join
// ============================================================================

#[test]
fn three_argument_join_uses_the_separator() {
    let data = facts(json!({"can": "wood", "chi": "water"}));
    assert_eq!(expand(r#"string join({can}, "-", {chi})"#, &data), "wood-water");
}

#[test]
fn five_argument_join_joins_every_value() {
    let data = facts(json!({"a": "x", "b": "y", "c": "z"}));
    assert_eq!(expand(r#"string join({a}, " ", {b}, " ", {c})"#, &data), "x y z");
}

#[test]
fn two_argument_join_returns_the_first_value() {
    let data = facts(json!({"can": "wood"}));
    assert_eq!(expand(r#"string join({can}, "-")"#, &data), "wood");
}

#[test]
fn separators_with_commas_stay_quoted() {
    let data = facts(json!({"a": "x", "b": "y"}));
    assert_eq!(expand(r#"string join({a}, ", ", {b})"#, &data), "x, y");
}

#[test]
fn empty_values_are_skipped_by_join() {
    let data = facts(json!({"a": "x"}));
    assert_eq!(expand(r#"string join({a}, "-", {ghost})"#, &data), "x");
}
