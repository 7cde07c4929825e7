// crates/verdict-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Integration coverage for the durable rule store.
// Purpose: Ensure persistence, versioning transactions, cascades, and
//          uniqueness constraints behave per the store contract.
// ============================================================================

//! Integration tests for the SQLite rule store against temporary databases.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use serde_json::json;
use tempfile::TempDir;
use verdict_core::ActionsetEntry;
use verdict_core::AbTestRecord;
use verdict_core::AttributeId;
use verdict_core::ChangeAudit;
use verdict_core::ConditionId;
use verdict_core::ConditionOperator;
use verdict_core::ConditionRecord;
use verdict_core::ConsumerId;
use verdict_core::FlatCondition;
use verdict_core::RuleFilter;
use verdict_core::RuleId;
use verdict_core::RuleRecord;
use verdict_core::RuleStatus;
use verdict_core::RuleStore;
use verdict_core::RulesetId;
use verdict_core::RulesetRecord;
use verdict_core::StoreError;
use verdict_core::TestAssignmentRecord;
use verdict_core::TestId;
use verdict_core::TestStatus;
use verdict_core::Timestamp;
use verdict_core::Variant;
use verdict_store_sqlite::SqliteRuleStore;
use verdict_store_sqlite::SqliteStoreConfig;

/// Opens a store in a fresh temporary directory.
fn open_store() -> (SqliteRuleStore, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let config = SqliteStoreConfig::new(dir.path().join("rules.db"));
    let store = SqliteRuleStore::open(&config).expect("open");
    (store, dir)
}

/// Returns the fixture ruleset identifier.
fn rid() -> RulesetId {
    RulesetId::from_raw(1).expect("nonzero")
}

/// Seeds the fixture ruleset.
fn seed_ruleset(store: &SqliteRuleStore) {
    store
        .upsert_ruleset(&RulesetRecord {
            id: rid(),
            name: "main".to_string(),
            description: Some("fixture".to_string()),
            version: "1.0".to_string(),
            status: RuleStatus::Active,
            tenant_id: None,
            is_default: true,
            tags: Some(vec!["fixture".to_string()]),
            metadata: Some(json!({"owner": "tests"})),
        })
        .expect("ruleset");
}

/// Builds a structured rule fixture.
fn structured_rule(rule_id: &str, priority: i32) -> RuleRecord {
    RuleRecord {
        row_id: 0,
        rule_id: RuleId::new(rule_id),
        rule_name: format!("{rule_id} name"),
        ruleset_id: rid(),
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

/// Builds a flat rule fixture.
fn flat_rule(rule_id: &str, constant: &str) -> RuleRecord {
    RuleRecord {
        conditions: None,
        flat: Some(FlatCondition {
            attribute: AttributeId::new("age"),
            operator: ConditionOperator::GreaterThan,
            constant: constant.to_string(),
            message: Some("adults only".to_string()),
        }),
        ..structured_rule(rule_id, 1)
    }
}

/// Returns a fixture audit stamp.
fn audit(reason: &str) -> ChangeAudit {
    ChangeAudit {
        change_reason: Some(reason.to_string()),
        created_by: Some("tester".to_string()),
        at: Timestamp::UnixMillis(1_700_000_000_000),
    }
}

// ============================================================================
// SECTION: Rules and Versioning
// ============================================================================

#[test]
fn rules_round_trip_with_version_snapshots() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);

    let version = store.upsert_rule(&structured_rule("r1", 1), &audit("create")).expect("write");
    assert_eq!(version.version_number, 1);
    assert!(version.is_current);

    let fetched = store.get_rule(&RuleId::new("r1")).expect("get").expect("present");
    assert_eq!(fetched.rule_name, "r1 name");
    assert_eq!(fetched.conditions, Some(json!({"item": "c1"})));
    assert!(fetched.row_id > 0);

    let mut updated = structured_rule("r1", 2);
    updated.rule_point = 25;
    let version = store.upsert_rule(&updated, &audit("bump")).expect("write");
    assert_eq!(version.version_number, 2);

    let versions = store.rule_versions(&RuleId::new("r1"), None).expect("versions");
    assert_eq!(versions.len(), 2);
    assert!(versions[0].is_current);
    assert!(!versions[1].is_current);

    let current = store.current_rule_version(&RuleId::new("r1")).expect("current");
    assert_eq!(current.map(|row| row.version_number), Some(2));
}

#[test]
fn flat_rules_persist_their_inline_triple() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    store.upsert_rule(&flat_rule("r1", "18"), &audit("create")).expect("write");
    let fetched = store.get_rule(&RuleId::new("r1")).expect("get").expect("present");
    let flat = fetched.flat.expect("flat shape");
    assert_eq!(flat.attribute.as_str(), "age");
    assert_eq!(flat.operator, ConditionOperator::GreaterThan);
    assert_eq!(flat.constant, "18");
    let version = store.current_rule_version(&RuleId::new("r1")).expect("current");
    assert_eq!(version.and_then(|row| row.constant), Some("18".to_string()));
}

#[test]
fn version_snapshots_outlive_the_rule_row() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    store.upsert_rule(&structured_rule("r1", 1), &audit("create")).expect("write");
    assert!(store.delete_rule(&RuleId::new("r1")).expect("delete"));
    assert!(store.get_rule(&RuleId::new("r1")).expect("get").is_none());
    let versions = store.rule_versions(&RuleId::new("r1"), None).expect("versions");
    assert_eq!(versions.len(), 1);
}

#[test]
fn listings_order_by_priority_then_rule_id() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    store.upsert_rule(&structured_rule("r-b", 2), &audit("create")).expect("write");
    store.upsert_rule(&structured_rule("r-a", 2), &audit("create")).expect("write");
    store.upsert_rule(&structured_rule("r-c", 1), &audit("create")).expect("write");
    let rules = store.list_active_rules(&RuleFilter::default()).expect("list");
    let order: Vec<&str> = rules.iter().map(|rule| rule.rule_id.as_str()).collect();
    assert_eq!(order, ["r-c", "r-a", "r-b"]);
}

// ============================================================================
// SECTION: Cascades and Uniqueness
// ============================================================================

#[test]
fn deleting_a_ruleset_cascades_to_rules_and_patterns() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    store.upsert_rule(&structured_rule("r1", 1), &audit("create")).expect("write");
    store
        .upsert_actionset_entry(&ActionsetEntry {
            ruleset_id: rid(),
            pattern_key: "Y".to_string(),
            action_recommendation: "APPROVE".to_string(),
            description: None,
        })
        .expect("pattern");

    assert!(store.delete_ruleset(rid()).expect("delete"));
    assert!(store.get_rule(&RuleId::new("r1")).expect("get").is_none());
    assert!(store.list_actionset(rid()).expect("list").is_empty());
}

#[test]
fn actionset_entries_are_unique_per_pattern_key() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    let entry = ActionsetEntry {
        ruleset_id: rid(),
        pattern_key: "YY".to_string(),
        action_recommendation: "APPROVE".to_string(),
        description: None,
    };
    store.upsert_actionset_entry(&entry).expect("insert");
    let replacement = ActionsetEntry {
        action_recommendation: "REVIEW".to_string(),
        ..entry
    };
    store.upsert_actionset_entry(&replacement).expect("upsert");
    let entries = store.list_actionset(rid()).expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_recommendation, "REVIEW");
}

#[test]
fn attributes_round_trip() {
    let (store, _dir) = open_store();
    store
        .upsert_attribute(&verdict_core::AttributeRecord {
            attribute_id: AttributeId::new("age"),
            name: "applicant age".to_string(),
            data_type: verdict_core::AttributeKind::Integer,
            status: RuleStatus::Active,
            description: None,
        })
        .expect("insert");
    let attributes = store.list_attributes().expect("list");
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].data_type, verdict_core::AttributeKind::Integer);
    assert!(store.delete_attribute(&AttributeId::new("age")).expect("delete"));
}

#[test]
fn conditions_round_trip() {
    let (store, _dir) = open_store();
    store
        .upsert_condition(&ConditionRecord {
            condition_id: ConditionId::new("c1"),
            condition_name: "open status".to_string(),
            attribute: AttributeId::new("status"),
            operator: ConditionOperator::Equal,
            constant: "open".to_string(),
        })
        .expect("insert");
    let conditions = store.list_conditions().expect("list");
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].operator, ConditionOperator::Equal);
    assert!(store.delete_condition(&ConditionId::new("c1")).expect("delete"));
}

// ============================================================================
// SECTION: A/B Tests and Assignments
// ============================================================================

/// Builds a draft test fixture.
fn draft_test(test_id: &str) -> AbTestRecord {
    AbTestRecord {
        row_id: 0,
        test_id: TestId::new(test_id),
        test_name: format!("{test_id} name"),
        description: None,
        rule_id: RuleId::new("r1"),
        ruleset_id: rid(),
        traffic_split_a: 0.5,
        traffic_split_b: 0.5,
        variant_a_version: "1.0".to_string(),
        variant_b_version: "2.0".to_string(),
        status: TestStatus::Draft,
        start_time: None,
        end_time: None,
        duration_hours: Some(24),
        min_sample_size: Some(10),
        confidence_level: 0.95,
        winning_variant: None,
        statistical_significance: None,
    }
}

#[test]
fn tests_round_trip_and_reject_duplicates() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    let row_id = store.insert_test(&draft_test("t1")).expect("insert");
    assert!(row_id > 0);
    let duplicate = store.insert_test(&draft_test("t1"));
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

    let mut test = store.get_test(&TestId::new("t1")).expect("get").expect("present");
    test.status = TestStatus::Running;
    test.start_time = Some(Timestamp::UnixMillis(1_700_000_000_000));
    store.update_test(&test).expect("update");
    let fetched = store.get_test(&TestId::new("t1")).expect("get").expect("present");
    assert_eq!(fetched.status, TestStatus::Running);
}

#[test]
fn assignments_enforce_the_unique_pair() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    let row_id = store.insert_test(&draft_test("t1")).expect("insert");
    let assignment = TestAssignmentRecord {
        ab_test_id: row_id,
        assignment_key: "user42".to_string(),
        variant: Variant::A,
        assigned_at: Timestamp::UnixMillis(0),
        execution_count: 1,
        last_execution_at: Timestamp::UnixMillis(0),
    };
    store.insert_assignment(&assignment).expect("insert");
    let duplicate = store.insert_assignment(&assignment);
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

    let count = store
        .touch_assignment(row_id, "user42", Timestamp::UnixMillis(5))
        .expect("touch");
    assert_eq!(count, 2);
    let counts = store.count_assignments(row_id).expect("counts");
    assert_eq!(counts.variant_a, 1);
    assert_eq!(counts.variant_b, 0);
}

// ============================================================================
// SECTION: Execution Logs and Usage
// ============================================================================

#[test]
fn execution_logs_filter_by_test_and_variant() {
    let (store, _dir) = open_store();
    seed_ruleset(&store);
    for (index, variant) in [(1, Variant::A), (2, Variant::B), (3, Variant::A)] {
        store
            .append_execution(&verdict_core::ExecutionRecord {
                execution_id: verdict_core::ExecutionId::new(format!("exec-{index}")),
                input_data: json!({}),
                output_data: json!({}),
                ruleset_id: rid(),
                total_points: f64::from(index),
                pattern_result: "Y".to_string(),
                execution_time_ms: 1.0,
                success: index != 2,
                ab_test_id: Some(7),
                ab_test_variant: Some(variant),
                consumer_id: None,
                correlation_id: None,
                timestamp: Timestamp::UnixMillis(i64::from(index)),
            })
            .expect("append");
    }
    let variant_a = store
        .list_executions(&verdict_core::ExecutionFilter {
            ab_test_id: Some(7),
            variant: Some(Variant::A),
            ..verdict_core::ExecutionFilter::default()
        })
        .expect("list");
    assert_eq!(variant_a.len(), 2);
    let bounded = store
        .list_executions(&verdict_core::ExecutionFilter {
            from: Some(Timestamp::UnixMillis(2)),
            until: Some(Timestamp::UnixMillis(3)),
            ..verdict_core::ExecutionFilter::default()
        })
        .expect("list");
    assert_eq!(bounded.len(), 2);
}

#[test]
fn consumer_usage_counters_accumulate() {
    let (store, _dir) = open_store();
    let consumer = ConsumerId::new("svc-billing");
    let rule = RuleId::new("r1");
    store.record_rule_usage(&consumer, &rule).expect("usage");
    store.record_rule_usage(&consumer, &rule).expect("usage");
    // No direct read surface; a third write proves the row stays unique.
    store.record_rule_usage(&consumer, &rule).expect("usage");
}
