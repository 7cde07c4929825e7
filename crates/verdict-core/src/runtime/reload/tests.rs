// crates/verdict-core/src/runtime/reload/tests.rs
// ============================================================================
// Module: Hot-Reload Unit Tests
// Description: Unit coverage for reload validation, swaps, and monitoring.
// Purpose: Ensure invalid candidates abort reloads atomically and the
//          monitor reacts to store deltas.
// Dependencies: verdict-core
// ============================================================================

//! ## Overview
//! Drives the controller over the in-memory store: successful reloads swap
//! the registry, validation failures aggregate every invalid rule and leave
//! the previous snapshot authoritative, and the monitor worker reloads on
//! an active-rule delta.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde_json::json;

use crate::core::ActionsetEntry;
use crate::core::AttributeId;
use crate::core::ConditionId;
use crate::core::ConditionOperator;
use crate::core::ConditionRecord;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::RuleStatus;
use crate::core::RulesetId;
use crate::core::RulesetRecord;
use crate::core::Timestamp;
use crate::interfaces::ChangeAudit;
use crate::interfaces::Clock;
use crate::interfaces::NoopTelemetry;
use crate::interfaces::RuleStore;
use crate::interfaces::SourceKind;
use crate::runtime::memstore::InMemoryRuleStore;
use crate::runtime::registry::RuleRegistry;

use super::HotReloadController;
use super::ReloadConfig;
use super::ReloadError;
use super::ReloadOptions;

/// Fixed clock for deterministic stamps.
struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::UnixMillis(1_700_000_000_000)
    }
}

/// Builds a controller over fresh collaborators.
fn controller(
    config: ReloadConfig,
) -> (Arc<HotReloadController>, Arc<RuleRegistry>, Arc<InMemoryRuleStore>) {
    let registry = Arc::new(RuleRegistry::default());
    let store = Arc::new(InMemoryRuleStore::new());
    let controller = Arc::new(HotReloadController::new(
        Arc::clone(&registry),
        Arc::clone(&store) as Arc<dyn RuleStore>,
        Arc::new(FixedClock),
        Arc::new(NoopTelemetry),
        config,
    ));
    (controller, registry, store)
}

/// Seeds a ruleset, one condition, and one rule referencing it.
fn seed(store: &Arc<InMemoryRuleStore>, condition_id: &str) {
    let ruleset_id = RulesetId::from_raw(1).expect("nonzero");
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
            condition_id: ConditionId::new("c1"),
            condition_name: "open status".to_string(),
            attribute: AttributeId::new("status"),
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
    seed_rule(store, "r1", condition_id);
}

/// Seeds one structured rule referencing the given condition.
fn seed_rule(store: &Arc<InMemoryRuleStore>, rule_id: &str, condition_id: &str) {
    store
        .upsert_rule(
            &RuleRecord {
                row_id: 0,
                rule_id: RuleId::new(rule_id),
                rule_name: format!("{rule_id} name"),
                ruleset_id: RulesetId::from_raw(1).expect("nonzero"),
                conditions: Some(json!({"item": condition_id})),
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
                change_reason: None,
                created_by: None,
                at: Timestamp::UnixMillis(0),
            },
        )
        .expect("rule");
}

// ============================================================================
// SECTION: Reload Semantics
// ============================================================================

#[test]
fn full_reload_populates_the_registry() -> Result<(), ReloadError> {
    let (controller, registry, store) = controller(ReloadConfig::default());
    seed(&store, "c1");
    let result = controller.reload(&ReloadOptions {
        validate: true,
        ..ReloadOptions::default()
    })?;
    assert_eq!(result.status, "success");
    assert_eq!(result.rules_loaded, 1);
    assert_eq!(result.rulesets_loaded, 1);
    assert_eq!(result.reload_count, 1);
    let snapshot = registry.evaluation_snapshot(None).expect("snapshot");
    assert_eq!(snapshot.prepared.len(), 1);
    assert_eq!(snapshot.actionset.get("Y").map(String::as_str), Some("APPROVE"));
    Ok(())
}

#[test]
fn validation_failure_aborts_and_preserves_the_snapshot() -> Result<(), ReloadError> {
    let (controller, registry, store) = controller(ReloadConfig::default());
    seed(&store, "c1");
    controller.reload(&ReloadOptions {
        validate: true,
        ..ReloadOptions::default()
    })?;
    let version_before = registry.version();

    // A new rule referencing a missing condition poisons the candidate set.
    seed_rule(&store, "r-broken", "MISSING_COND");
    let err = controller
        .reload(&ReloadOptions {
            validate: true,
            ..ReloadOptions::default()
        })
        .expect_err("validation failure");
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    let ReloadError::Validation { failures } = &err else {
        panic!("wrong error kind");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "r-broken name");
    assert!(failures[0].1.message.contains("MISSING_COND"));

    // Previous snapshot stays authoritative.
    assert_eq!(registry.version(), version_before);
    let snapshot = registry.evaluation_snapshot(None).expect("snapshot");
    assert_eq!(snapshot.prepared.len(), 1);

    let status = controller.status();
    assert_eq!(status.last_reload_status, "error");
    assert!(status.last_reload_error.is_some());
    Ok(())
}

#[test]
fn scoped_rule_reload_updates_only_that_rule() -> Result<(), ReloadError> {
    let (controller, registry, store) = controller(ReloadConfig::default());
    seed(&store, "c1");
    seed_rule(&store, "r2", "c1");
    controller.reload(&ReloadOptions::default())?;
    assert_eq!(registry.list_rules(None).len(), 2);

    let result = controller.reload_rule(RuleId::new("r1"))?;
    assert_eq!(result.rules_loaded, 1);
    // The scoped reload leaves the sibling rule cached.
    assert_eq!(registry.list_rules(None).len(), 2);
    Ok(())
}

// ============================================================================
// SECTION: Read-Only Validation
// ============================================================================

#[test]
fn validate_from_store_reports_per_rule_outcomes() -> Result<(), ReloadError> {
    let (controller, registry, store) = controller(ReloadConfig::default());
    seed(&store, "c1");
    seed_rule(&store, "r-broken", "MISSING_COND");
    let report = controller.validate_from_source(None)?;
    assert!(!report.is_valid);
    assert_eq!(report.summary.total_rules, 2);
    assert_eq!(report.summary.invalid_rules, 1);
    assert_eq!(report.source_type, SourceKind::Database);
    let broken = report
        .rules
        .iter()
        .find(|outcome| outcome.rule_name == "r-broken name")
        .expect("broken entry");
    assert!(broken.errors[0].message.contains("MISSING_COND"));
    // Validation never touches the registry.
    assert_eq!(registry.version(), 0);
    Ok(())
}

// ============================================================================
// SECTION: Monitoring
// ============================================================================

#[test]
fn monitor_reloads_on_an_active_rule_delta() {
    let (controller, registry, store) = controller(ReloadConfig {
        auto_reload_enabled: true,
        reload_interval_seconds: 1,
        validation_enabled: true,
    });
    seed(&store, "c1");
    controller.start();
    let deadline = Instant::now() + Duration::from_secs(10);
    while registry.evaluation_snapshot(None).is_none() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }
    controller.stop();
    let snapshot = registry.evaluation_snapshot(None).expect("monitor reload");
    assert_eq!(snapshot.prepared.len(), 1);
    assert!(!controller.status().monitoring_active);
}

#[test]
fn start_twice_and_stop_without_start_are_no_ops() {
    let (controller, _registry, _store) = controller(ReloadConfig {
        auto_reload_enabled: false,
        reload_interval_seconds: 1,
        validation_enabled: true,
    });
    controller.stop();
    controller.start();
    controller.start();
    assert!(controller.status().monitoring_active);
    controller.stop();
    assert!(!controller.status().monitoring_active);
}
