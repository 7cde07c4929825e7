// system-tests/src/harness.rs
// ============================================================================
// Module: Verdict System Test Harness
// Description: Wires the full platform over a temporary SQLite store.
// Purpose: Give scenario tests one seeded, production-shaped assembly.
// Dependencies: tempfile, verdict crates
// ============================================================================

//! ## Overview
//! The harness assembles the platform the way a host process would: a
//! durable SQLite store, the in-memory registry, the hot-reload controller,
//! the A/B router, version control, and the execution engine wired to a
//! buffered execution-log writer. Seeding goes through the same store
//! surface the management plane uses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use verdict_core::ActionsetEntry;
use verdict_core::ConditionId;
use verdict_core::ConditionOperator;
use verdict_core::ConditionRecord;
use verdict_core::FactMap;
use verdict_core::NoopTelemetry;
use verdict_core::RuleId;
use verdict_core::RuleRecord;
use verdict_core::RuleStatus;
use verdict_core::RuleStore;
use verdict_core::RulesetId;
use verdict_core::RulesetRecord;
use verdict_core::SystemClock;
use verdict_core::runtime::AbTestRouter;
use verdict_core::runtime::ExecutionEngine;
use verdict_core::runtime::HotReloadController;
use verdict_core::runtime::ReloadConfig;
use verdict_core::runtime::RuleRegistry;
use verdict_core::runtime::VersionControl;
use verdict_core::runtime::versioning::write_rule_versioned;
use verdict_store_sqlite::BufferedLogWriter;
use verdict_store_sqlite::SqliteRuleStore;
use verdict_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Full-platform assembly over one temporary database.
pub struct Platform {
    /// Durable store.
    pub store: Arc<SqliteRuleStore>,
    /// In-memory registry.
    pub registry: Arc<RuleRegistry>,
    /// Hot-reload controller.
    pub controller: Arc<HotReloadController>,
    /// A/B router.
    pub router: Arc<AbTestRouter>,
    /// Version control.
    pub versions: VersionControl,
    /// Execution engine.
    pub engine: ExecutionEngine,
    /// Buffered execution-log writer.
    pub log_writer: Arc<BufferedLogWriter>,
    /// Owning temp directory; dropping it deletes the database.
    _dir: TempDir,
}

impl Platform {
    /// Builds the platform over a fresh temporary database.
    ///
    /// # Panics
    ///
    /// Panics when the temporary store cannot be created; system tests treat
    /// that as an environment failure.
    #[must_use]
    #[allow(clippy::panic, clippy::expect_used, reason = "Harness setup fails loudly.")]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = SqliteStoreConfig::new(dir.path().join("verdict.db"));
        let store = Arc::new(SqliteRuleStore::open(&config).expect("open store"));
        let store_dyn: Arc<dyn RuleStore> = Arc::<SqliteRuleStore>::clone(&store);
        let telemetry = Arc::new(NoopTelemetry);
        let clock = Arc::new(SystemClock);
        let registry = Arc::new(RuleRegistry::new(telemetry.clone()));
        let controller = Arc::new(HotReloadController::new(
            Arc::clone(&registry),
            Arc::clone(&store_dyn),
            clock.clone(),
            telemetry.clone(),
            ReloadConfig {
                auto_reload_enabled: false,
                reload_interval_seconds: 1,
                validation_enabled: true,
            },
        ));
        let router = Arc::new(AbTestRouter::new(
            Arc::clone(&store_dyn),
            clock.clone(),
            telemetry.clone(),
        ));
        let versions = VersionControl::new(Arc::clone(&store_dyn), clock.clone());
        let log_writer = Arc::new(BufferedLogWriter::spawn(
            Arc::clone(&store_dyn),
            256,
            telemetry.clone(),
        ));
        let engine = ExecutionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&store_dyn),
            Arc::<BufferedLogWriter>::clone(&log_writer),
            clock,
            telemetry,
            Some(Arc::clone(&router)),
        );
        Self {
            store,
            registry,
            controller,
            router,
            versions,
            engine,
            log_writer,
            _dir: dir,
        }
    }

    /// Returns the fixture ruleset identifier.
    ///
    /// # Panics
    ///
    /// Never; the raw value is non-zero.
    #[must_use]
    #[allow(clippy::expect_used, reason = "Constant is non-zero.")]
    pub fn ruleset_id() -> RulesetId {
        RulesetId::from_raw(1).expect("nonzero")
    }

    /// Seeds the fixture ruleset with an actionset.
    ///
    /// # Panics
    ///
    /// Panics on store failures; system tests treat those as fatal.
    #[allow(clippy::expect_used, reason = "Harness seeding fails loudly.")]
    pub fn seed_ruleset(&self, actionset: &[(&str, &str)]) {
        self.store
            .upsert_ruleset(&RulesetRecord {
                id: Self::ruleset_id(),
                name: "main".to_string(),
                description: None,
                version: "1.0".to_string(),
                status: RuleStatus::Active,
                tenant_id: None,
                is_default: true,
                tags: None,
                metadata: None,
            })
            .expect("seed ruleset");
        for (pattern_key, action) in actionset {
            self.store
                .upsert_actionset_entry(&ActionsetEntry {
                    ruleset_id: Self::ruleset_id(),
                    pattern_key: (*pattern_key).to_string(),
                    action_recommendation: (*action).to_string(),
                    description: None,
                })
                .expect("seed actionset");
        }
    }

    /// Seeds one reusable condition.
    ///
    /// # Panics
    ///
    /// Panics on store failures; system tests treat those as fatal.
    #[allow(clippy::expect_used, reason = "Harness seeding fails loudly.")]
    pub fn seed_condition(
        &self,
        condition_id: &str,
        attribute: &str,
        operator: ConditionOperator,
        constant: &str,
    ) {
        self.store
            .upsert_condition(&ConditionRecord {
                condition_id: ConditionId::new(condition_id),
                condition_name: format!("{condition_id} name"),
                attribute: attribute.into(),
                operator,
                constant: constant.to_string(),
            })
            .expect("seed condition");
    }

    /// Seeds one structured rule referencing a condition.
    ///
    /// # Panics
    ///
    /// Panics on store failures; system tests treat those as fatal.
    #[allow(clippy::expect_used, reason = "Harness seeding fails loudly.")]
    pub fn seed_rule(
        &self,
        rule_id: &str,
        priority: i32,
        condition_id: &str,
        rule_point: u32,
        weight: f64,
        action_result: &str,
    ) {
        let store: Arc<dyn RuleStore> = Arc::<SqliteRuleStore>::clone(&self.store);
        let clock: Arc<dyn verdict_core::Clock> = Arc::new(SystemClock);
        write_rule_versioned(
            &store,
            &clock,
            &RuleRecord {
                row_id: 0,
                rule_id: RuleId::new(rule_id),
                rule_name: format!("{rule_id} name"),
                ruleset_id: Self::ruleset_id(),
                conditions: Some(json!({"item": condition_id})),
                flat: None,
                rule_point,
                weight,
                priority,
                action_result: action_result.to_string(),
                status: RuleStatus::Active,
                version: "1.0".to_string(),
                tags: None,
                metadata: None,
            },
            Some("seed"),
            Some("harness"),
        )
        .expect("seed rule");
    }

    /// Builds a fact map from a JSON object literal.
    #[must_use]
    pub fn facts(value: Value) -> FactMap {
        match value {
            Value::Object(map) => map,
            _ => FactMap::new(),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}
