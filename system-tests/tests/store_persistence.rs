// system-tests/tests/store_persistence.rs
// ============================================================================
// Module: Store Persistence Tests
// Description: Durability coverage across store reopen.
// Purpose: Ensure rules, versions, and assignments survive process restart.
// ============================================================================

//! Seeds a database, reopens it cold, and drives a fresh registry and
//! engine assembly from the persisted state.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use verdict_core::ActionsetEntry;
use verdict_core::ChangeAudit;
use verdict_core::ConditionId;
use verdict_core::ConditionOperator;
use verdict_core::ConditionRecord;
use verdict_core::EvaluationRequest;
use verdict_core::FactMap;
use verdict_core::NoopTelemetry;
use verdict_core::NullExecutionSink;
use verdict_core::RuleId;
use verdict_core::RuleRecord;
use verdict_core::RuleStatus;
use verdict_core::RuleStore;
use verdict_core::RulesetId;
use verdict_core::RulesetRecord;
use verdict_core::SystemClock;
use verdict_core::Timestamp;
use verdict_core::runtime::ExecutionEngine;
use verdict_core::runtime::HotReloadController;
use verdict_core::runtime::ReloadConfig;
use verdict_core::runtime::ReloadOptions;
use verdict_core::runtime::RuleRegistry;
use verdict_store_sqlite::SqliteRuleStore;
use verdict_store_sqlite::SqliteStoreConfig;

/// Builds a fact map from a JSON object literal.
fn facts(value: serde_json::Value) -> FactMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => FactMap::new(),
    }
}

#[test]
fn seeded_state_survives_a_cold_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let config = SqliteStoreConfig::new(dir.path().join("verdict.db"));
    let ruleset_id = RulesetId::from_raw(1).expect("nonzero");

    // First process: seed and drop.
    {
        let store = SqliteRuleStore::open(&config).expect("open");
        store
            .upsert_ruleset(&RulesetRecord {
                id: ruleset_id,
                name: "main".to_string(),
                description: None,
                version: "1.0".to_string(),
                status: RuleStatus::Active,
                tenant_id: None,
                is_default: true,
                tags: None,
                metadata: None,
            })
            .expect("ruleset");
        store
            .upsert_condition(&ConditionRecord {
                condition_id: ConditionId::new("c-open"),
                condition_name: "open status".to_string(),
                attribute: "status".into(),
                operator: ConditionOperator::Equal,
                constant: "open".to_string(),
            })
            .expect("condition");
        store
            .upsert_actionset_entry(&ActionsetEntry {
                ruleset_id,
                pattern_key: "Y".to_string(),
                action_recommendation: "APPROVE".to_string(),
                description: None,
            })
            .expect("actionset");
        store
            .upsert_rule(
                &RuleRecord {
                    row_id: 0,
                    rule_id: RuleId::new("r1"),
                    rule_name: "r1 name".to_string(),
                    ruleset_id,
                    conditions: Some(json!({"item": "c-open"})),
                    flat: None,
                    rule_point: 10,
                    weight: 1.0,
                    priority: 1,
                    action_result: "Y".to_string(),
                    status: RuleStatus::Active,
                    version: "1.0".to_string(),
                    tags: None,
                    metadata: None,
                },
                &ChangeAudit {
                    change_reason: Some("seed".to_string()),
                    created_by: None,
                    at: Timestamp::UnixMillis(0),
                },
            )
            .expect("rule");
    }

    // Second process: reopen cold and serve evaluations.
    let store: Arc<dyn RuleStore> =
        Arc::new(SqliteRuleStore::open(&config).expect("reopen"));
    let registry = Arc::new(RuleRegistry::default());
    let controller = HotReloadController::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::new(SystemClock),
        Arc::new(NoopTelemetry),
        ReloadConfig {
            auto_reload_enabled: false,
            reload_interval_seconds: 1,
            validation_enabled: true,
        },
    );
    let result = controller
        .reload(&ReloadOptions {
            validate: true,
            ..ReloadOptions::default()
        })
        .expect("reload");
    assert_eq!(result.rules_loaded, 1);
    assert_eq!(result.rulesets_loaded, 1);

    let versions = store.rule_versions(&RuleId::new("r1"), None).expect("versions");
    assert_eq!(versions.len(), 1);

    let engine = ExecutionEngine::new(
        registry,
        store,
        Arc::new(NullExecutionSink),
        Arc::new(SystemClock),
        Arc::new(NoopTelemetry),
        None,
    );
    let outcome = engine
        .evaluate(&EvaluationRequest {
            data: facts(json!({"status": "open"})),
            ..EvaluationRequest::default()
        })
        .expect("evaluate");
    assert_eq!(outcome.action_recommendation.as_deref(), Some("APPROVE"));
    assert_eq!(outcome.total_points, 10.0);
}
