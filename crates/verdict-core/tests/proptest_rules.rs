// crates/verdict-core/tests/proptest_rules.rs
// ============================================================================
// Module: Rule Property-Based Tests
// Description: Property tests for compilation purity and evaluator totality.
// Purpose: Detect panics and ordering drift across wide input ranges.
// ============================================================================

//! Property-based tests for compiler and evaluator invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;
use verdict_core::ConditionOperator;
use verdict_core::ConditionRecord;
use verdict_core::FactMap;
use verdict_core::RuleRecord;
use verdict_core::RuleStatus;
use verdict_core::RulesetId;
use verdict_core::core::hashing;
use verdict_core::runtime::compile_rules;
use verdict_core::runtime::compiler::Comparison;
use verdict_core::runtime::compiler::Operand;
use verdict_core::runtime::evaluator::evaluate_comparison;
use verdict_core::runtime::rules_fingerprint;

/// Builds a condition fixture.
fn condition(id: &str) -> ConditionRecord {
    ConditionRecord {
        condition_id: id.into(),
        condition_name: id.to_string(),
        attribute: "status".into(),
        operator: ConditionOperator::Equal,
        constant: "open".to_string(),
    }
}

/// Builds a structured rule fixture with the given priority.
fn rule(rule_id: &str, priority: i32) -> RuleRecord {
    RuleRecord {
        row_id: 1,
        rule_id: rule_id.into(),
        rule_name: rule_id.to_string(),
        ruleset_id: RulesetId::from_raw(1).expect("nonzero"),
        conditions: Some(json!({"item": "c1"})),
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

/// Strategy for JSON scalar and shallow-list fact values.
fn fact_value_strategy() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| Value::Number(v.into())),
        any::<f64>()
            .prop_filter("finite", |v| v.is_finite())
            .prop_map(|v| serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)),
        ".*".prop_map(Value::String),
    ];
    prop_oneof![
        scalar.clone(),
        prop::collection::vec(scalar, 0 .. 4).prop_map(Value::Array),
    ]
}

/// Strategy for the full operator set.
fn operator_strategy() -> impl Strategy<Value = ConditionOperator> {
    prop_oneof![
        Just(ConditionOperator::Equal),
        Just(ConditionOperator::NotEqual),
        Just(ConditionOperator::GreaterThan),
        Just(ConditionOperator::GreaterThanOrEqual),
        Just(ConditionOperator::LessThan),
        Just(ConditionOperator::LessThanOrEqual),
        Just(ConditionOperator::In),
        Just(ConditionOperator::NotIn),
        Just(ConditionOperator::Range),
        Just(ConditionOperator::Contains),
        Just(ConditionOperator::Regex),
    ]
}

proptest! {
    /// The evaluator is total: any operator applied to any scalar fact and
    /// scalar operand yields a value, never a panic.
    #[test]
    fn evaluator_never_panics(
        operator in operator_strategy(),
        fact in fact_value_strategy(),
        operand in ".*",
    ) {
        let mut facts = FactMap::new();
        facts.insert("field".to_string(), fact);
        let comparison = Comparison {
            attribute: "field".into(),
            operator,
            operand: Operand::Scalar(operand),
        };
        let _ = evaluate_comparison(&comparison, &facts);
    }

    /// Identical comparisons on identical facts are deterministic.
    #[test]
    fn evaluation_is_deterministic(
        operator in operator_strategy(),
        fact in fact_value_strategy(),
        operand in ".*",
    ) {
        let mut facts = FactMap::new();
        facts.insert("field".to_string(), fact);
        let comparison = Comparison {
            attribute: "field".into(),
            operator,
            operand: Operand::Scalar(operand),
        };
        let first = evaluate_comparison(&comparison, &facts);
        let second = evaluate_comparison(&comparison, &facts);
        prop_assert_eq!(first, second);
    }

    /// Batch compilation re-establishes priority order regardless of the
    /// insertion order of the input records.
    #[test]
    fn compilation_order_is_priority_pure(priorities in prop::collection::vec(-100_i32 .. 100, 1 .. 12)) {
        let conditions = [condition("c1")];
        let rules: Vec<RuleRecord> = priorities
            .iter()
            .enumerate()
            .map(|(index, priority)| rule(&format!("r{index}"), *priority))
            .collect();
        let mut reversed = rules.clone();
        reversed.reverse();

        let forward = compile_rules(&rules, &conditions).expect("compile");
        let backward = compile_rules(&reversed, &conditions).expect("compile");

        let forward_priorities: Vec<i32> = forward.iter().map(|r| r.priority).collect();
        let backward_priorities: Vec<i32> = backward.iter().map(|r| r.priority).collect();
        prop_assert_eq!(&forward_priorities, &backward_priorities);
        let mut sorted = forward_priorities.clone();
        sorted.sort_unstable();
        prop_assert_eq!(forward_priorities, sorted);

        let forward_print = rules_fingerprint(&rules).expect("fingerprint");
        let backward_print = rules_fingerprint(&reversed).expect("fingerprint");
        prop_assert_eq!(forward_print.as_str(), backward_print.as_str());
    }

    /// Assignment buckets always land in `0..100` and are stable.
    #[test]
    fn assignment_buckets_are_stable(key in ".*") {
        let first = hashing::stable_bucket(&key);
        let second = hashing::stable_bucket(&key);
        prop_assert!(first < 100);
        prop_assert_eq!(first, second);
    }
}
