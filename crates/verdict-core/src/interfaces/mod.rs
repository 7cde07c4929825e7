// crates/verdict-core/src/interfaces/mod.rs
// ============================================================================
// Module: Verdict Interfaces
// Description: Backend-agnostic interfaces for storage, clocks, logging, and
//              telemetry.
// Purpose: Define the contract surfaces used by the Verdict runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Verdict integrates with external systems without
//! embedding backend-specific details. The runtime receives every
//! collaborator by injection; global-getter conveniences are a host concern,
//! not part of this contract. Store implementations must make each operation
//! atomic and must treat compound operations (`upsert_rule`,
//! `apply_rollback`) as single transactions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AbTestRecord;
use crate::core::ActionsetEntry;
use crate::core::AttributeId;
use crate::core::AttributeRecord;
use crate::core::ConditionId;
use crate::core::ConditionRecord;
use crate::core::ConsumerId;
use crate::core::ConsumerRecord;
use crate::core::ExecutionRecord;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::RuleVersionRecord;
use crate::core::RulesetId;
use crate::core::RulesetRecord;
use crate::core::TestAssignmentRecord;
use crate::core::TestId;
use crate::core::TestStatus;
use crate::core::Timestamp;
use crate::core::Variant;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Rule store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages avoid embedding raw fact data.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Store I/O error.
    #[error("rule store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("rule store corruption: {0}")]
    Corrupt(String),
    /// Store data is invalid.
    #[error("rule store invalid data: {0}")]
    Invalid(String),
    /// A uniqueness constraint rejected the write.
    #[error("rule store conflict: {0}")]
    Conflict(String),
    /// The referenced row does not exist.
    #[error("rule store missing row: {0}")]
    Missing(String),
    /// Store backend reported an error.
    #[error("rule store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Filter applied when listing active rules.
///
/// # Invariants
/// - `rule_id` narrows to one rule; `ruleset_id` to one ruleset; both unset
///   selects every active rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {
    /// Narrow to one rule.
    #[serde(default)]
    pub rule_id: Option<RuleId>,
    /// Narrow to one ruleset.
    #[serde(default)]
    pub ruleset_id: Option<RulesetId>,
}

/// Filter applied when listing active rulesets.
///
/// # Invariants
/// - Unset fields do not constrain the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetFilter {
    /// Narrow to one ruleset.
    #[serde(default)]
    pub ruleset_id: Option<RulesetId>,
    /// Narrow to one tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Filter applied when listing A/B tests.
///
/// # Invariants
/// - Unset fields do not constrain the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFilter {
    /// Narrow to tests targeting one rule.
    #[serde(default)]
    pub rule_id: Option<RuleId>,
    /// Narrow to one lifecycle status.
    #[serde(default)]
    pub status: Option<TestStatus>,
    /// Maximum number of tests to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Filter applied when querying execution logs.
///
/// # Invariants
/// - Time bounds are inclusive; unset fields do not constrain the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFilter {
    /// Narrow to one A/B test row.
    #[serde(default)]
    pub ab_test_id: Option<i64>,
    /// Narrow to one variant.
    #[serde(default)]
    pub variant: Option<Variant>,
    /// Inclusive lower time bound.
    #[serde(default)]
    pub from: Option<Timestamp>,
    /// Inclusive upper time bound.
    #[serde(default)]
    pub until: Option<Timestamp>,
    /// Maximum number of records to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Mutation Context
// ============================================================================

/// Audit metadata attached to a rule mutation.
///
/// # Invariants
/// - `at` stamps the version snapshot the mutation produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAudit {
    /// Reason recorded on the version snapshot.
    pub change_reason: Option<String>,
    /// Author of the change.
    pub created_by: Option<String>,
    /// Mutation time.
    pub at: Timestamp,
}

/// Atomic rollback instruction built by version control.
///
/// # Invariants
/// - `backup` snapshots the pre-rollback rule state and must receive the
///   next version number.
/// - `restored` carries the target version's fields onto the live rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPlan {
    /// Rule being rolled back.
    pub rule_id: RuleId,
    /// Version number being restored.
    pub target_version: u32,
    /// Pre-rollback backup snapshot to insert.
    pub backup: RuleVersionRecord,
    /// Rule record with the target version's fields applied.
    pub restored: RuleRecord,
}

/// Per-variant assignment counts for one test.
///
/// # Invariants
/// - Counts reflect distinct assignment rows, not execution counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCounts {
    /// Distinct assignments routed to variant A.
    pub variant_a: u64,
    /// Distinct assignments routed to variant B.
    pub variant_b: u64,
}

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Authoritative, passive rule store.
///
/// Every operation is atomic and durable. Compound operations are single
/// transactions: `upsert_rule` spans the rule write and its version
/// snapshot; `apply_rollback` spans the backup snapshot, the rule update,
/// and the `is_current` flip.
pub trait RuleStore: Send + Sync {
    /// Lists active rules under the filter, ordered by ascending priority
    /// then rule identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_active_rules(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, StoreError>;

    /// Lists active rulesets under the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_active_rulesets(
        &self,
        filter: &RulesetFilter,
    ) -> Result<Vec<RulesetRecord>, StoreError>;

    /// Lists every condition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_conditions(&self) -> Result<Vec<ConditionRecord>, StoreError>;

    /// Lists the actionset entries owned by one ruleset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_actionset(&self, ruleset_id: RulesetId) -> Result<Vec<ActionsetEntry>, StoreError>;

    /// Loads one rule by identifier, regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_rule(&self, rule_id: &RuleId) -> Result<Option<RuleRecord>, StoreError>;

    /// Loads one ruleset by unique name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_ruleset_by_name(&self, name: &str) -> Result<Option<RulesetRecord>, StoreError>;

    /// Snapshots the set of active rule identifiers (change detection).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn active_rule_ids(&self) -> Result<BTreeSet<RuleId>, StoreError>;

    /// Writes a rule and, in the same transaction, inserts its version
    /// snapshot (`version_number = max + 1`, `is_current = true`, prior
    /// snapshots flipped to not-current).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_rule(
        &self,
        record: &RuleRecord,
        audit: &ChangeAudit,
    ) -> Result<RuleVersionRecord, StoreError>;

    /// Deletes a rule row; version snapshots outlive it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_rule(&self, rule_id: &RuleId) -> Result<bool, StoreError>;

    /// Inserts or updates a ruleset; returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_ruleset(&self, record: &RulesetRecord) -> Result<RulesetId, StoreError>;

    /// Deletes a ruleset, cascading to its rules and actionset entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_ruleset(&self, ruleset_id: RulesetId) -> Result<bool, StoreError>;

    /// Inserts or updates a condition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_condition(&self, record: &ConditionRecord) -> Result<(), StoreError>;

    /// Deletes a condition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_condition(&self, condition_id: &ConditionId) -> Result<bool, StoreError>;

    /// Inserts or updates an attribute descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_attribute(&self, record: &AttributeRecord) -> Result<(), StoreError>;

    /// Lists every attribute descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_attributes(&self) -> Result<Vec<AttributeRecord>, StoreError>;

    /// Deletes an attribute descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_attribute(&self, attribute_id: &AttributeId) -> Result<bool, StoreError>;

    /// Inserts or updates an actionset entry, unique per
    /// `(ruleset_id, pattern_key)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_actionset_entry(&self, entry: &ActionsetEntry) -> Result<(), StoreError>;

    /// Deletes an actionset entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_actionset_entry(
        &self,
        ruleset_id: RulesetId,
        pattern_key: &str,
    ) -> Result<bool, StoreError>;

    /// Inserts or updates a consumer identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_consumer(&self, record: &ConsumerRecord) -> Result<(), StoreError>;

    /// Deletes a consumer identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_consumer(&self, consumer_id: &ConsumerId) -> Result<bool, StoreError>;

    /// Increments the `(consumer, rule)` usage counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn record_rule_usage(
        &self,
        consumer_id: &ConsumerId,
        rule_id: &RuleId,
    ) -> Result<(), StoreError>;

    /// Lists version snapshots newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn rule_versions(
        &self,
        rule_id: &RuleId,
        limit: Option<usize>,
    ) -> Result<Vec<RuleVersionRecord>, StoreError>;

    /// Loads one version snapshot by number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn rule_version(
        &self,
        rule_id: &RuleId,
        version_number: u32,
    ) -> Result<Option<RuleVersionRecord>, StoreError>;

    /// Loads one version snapshot by version label.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn rule_version_by_label(
        &self,
        rule_id: &RuleId,
        label: &str,
    ) -> Result<Option<RuleVersionRecord>, StoreError>;

    /// Loads the snapshot currently marked `is_current`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn current_rule_version(
        &self,
        rule_id: &RuleId,
    ) -> Result<Option<RuleVersionRecord>, StoreError>;

    /// Applies a rollback plan in one transaction, re-verifying that the
    /// target version still exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Missing`] when the target version or rule row
    /// vanished, or [`StoreError`] when the transaction fails.
    fn apply_rollback(&self, plan: &RollbackPlan) -> Result<RuleRecord, StoreError>;

    /// Inserts a new A/B test; returns its row identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the test identifier exists, or
    /// [`StoreError`] when the write fails.
    fn insert_test(&self, record: &AbTestRecord) -> Result<i64, StoreError>;

    /// Updates an existing A/B test.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_test(&self, record: &AbTestRecord) -> Result<(), StoreError>;

    /// Deletes an A/B test and its assignments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_test(&self, test_id: &TestId) -> Result<bool, StoreError>;

    /// Loads one A/B test by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_test(&self, test_id: &TestId) -> Result<Option<AbTestRecord>, StoreError>;

    /// Lists A/B tests under the filter, newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_tests(&self, filter: &TestFilter) -> Result<Vec<AbTestRecord>, StoreError>;

    /// Loads one sticky assignment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_assignment(
        &self,
        ab_test_row: i64,
        assignment_key: &str,
    ) -> Result<Option<TestAssignmentRecord>, StoreError>;

    /// Inserts a first-time assignment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `(ab_test_id, assignment_key)`
    /// already exists, or [`StoreError`] when the write fails.
    fn insert_assignment(&self, record: &TestAssignmentRecord) -> Result<(), StoreError>;

    /// Increments an assignment's execution count; returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Missing`] when the assignment does not exist,
    /// or [`StoreError`] when the write fails.
    fn touch_assignment(
        &self,
        ab_test_row: i64,
        assignment_key: &str,
        at: Timestamp,
    ) -> Result<u64, StoreError>;

    /// Counts distinct assignments per variant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn count_assignments(&self, ab_test_row: i64) -> Result<AssignmentCounts, StoreError>;

    /// Appends one execution record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Queries execution records under the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;
}

// ============================================================================
// SECTION: Execution Sink
// ============================================================================

/// Fire-and-forget sink for execution-log records.
///
/// Appends must never block or fail the evaluation path; implementations may
/// buffer, batch, and shed load (dropping oldest entries first).
pub trait ExecutionSink: Send + Sync {
    /// Accepts one execution record for eventual persistence.
    fn append(&self, record: ExecutionRecord);

    /// Returns the number of records shed under backpressure.
    fn dropped_count(&self) -> u64 {
        0
    }
}

/// Sink that discards every record; useful for dry deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExecutionSink;

impl ExecutionSink for NullExecutionSink {
    fn append(&self, _record: ExecutionRecord) {}
}

// ============================================================================
// SECTION: Config Sources
// ============================================================================

/// Config source errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source I/O error.
    #[error("config source io error: {0}")]
    Io(String),
    /// Source document failed to parse or normalize.
    #[error("config source invalid data: {0}")]
    Invalid(String),
    /// Source rejected the requested location.
    #[error("config source access error: {0}")]
    Access(String),
}

/// Source label reported by validation surfaces for observability.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Authoritative relational store.
    Database,
    /// File-backed configuration document.
    File,
    /// In-memory configuration.
    Inline,
}

impl SourceKind {
    /// Returns the stable label for the source kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::File => "file",
            Self::Inline => "inline",
        }
    }
}

/// Narrow configuration-source abstraction over files, memory, or stores.
///
/// Implementations return already-normalized records; callers never see the
/// backing representation.
pub trait ConfigSource: Send + Sync {
    /// Returns the source kind label for observability.
    fn kind(&self) -> SourceKind;

    /// Reads the rule set.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the document cannot be read or parsed.
    fn read_rules_set(&self) -> Result<Vec<RuleRecord>, SourceError>;

    /// Reads the condition set.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the document cannot be read or parsed.
    fn read_conditions_set(&self) -> Result<Vec<ConditionRecord>, SourceError>;

    /// Reads the actionset pattern map.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the document cannot be read or parsed.
    fn read_patterns(&self) -> Result<Vec<ActionsetEntry>, SourceError>;

    /// Reads a raw JSON document by key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the document cannot be read or parsed.
    fn read_json(&self, key: &str) -> Result<serde_json::Value, SourceError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock seam; the runtime never reads system time directly.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// System wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::UnixMillis(millis)
    }
}

// ============================================================================
// SECTION: Telemetry
// ============================================================================

/// Engine counter metrics.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineMetric {
    /// Completed evaluations.
    Evaluations,
    /// Rules matched across evaluations.
    RulesMatched,
    /// Per-rule evaluation faults recovered as `"-"` tokens.
    RuleFaults,
    /// Completed registry reloads.
    Reloads,
    /// Failed registry reloads.
    ReloadFailures,
    /// Subscriber notifications dropped on full channels.
    DroppedNotifications,
    /// Execution-log entries shed under backpressure.
    DroppedLogEntries,
    /// A/B assignment races resolved through the unique constraint.
    AssignmentConflicts,
    /// Subscriber callbacks that panicked and were isolated.
    SubscriberPanics,
}

impl EngineMetric {
    /// Returns a stable label for the metric.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evaluations => "evaluations",
            Self::RulesMatched => "rules_matched",
            Self::RuleFaults => "rule_faults",
            Self::Reloads => "reloads",
            Self::ReloadFailures => "reload_failures",
            Self::DroppedNotifications => "dropped_notifications",
            Self::DroppedLogEntries => "dropped_log_entries",
            Self::AssignmentConflicts => "assignment_conflicts",
            Self::SubscriberPanics => "subscriber_panics",
        }
    }
}

/// Warning payload describing one contained per-rule evaluation fault.
///
/// # Invariants
/// - `available_keys` lists the fact map's keys at fault time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFaultWarning {
    /// Faulting rule name.
    pub rule_name: String,
    /// Stable fault code.
    pub code: &'static str,
    /// Narrative fault detail (missing symbol, regex error, ...).
    pub detail: String,
    /// Keys present in the fact map when the fault occurred.
    pub available_keys: Vec<String>,
}

/// Thin observability interface for engine counters and warnings.
///
/// Intentionally dependency-light so hosts can plug in their metrics and
/// logging stacks without redesign. All methods default to no-ops.
pub trait EngineTelemetry: Send + Sync {
    /// Records a counter increment.
    fn record(&self, metric: EngineMetric, value: u64) {
        let _ = (metric, value);
    }

    /// Reports a contained per-rule evaluation fault.
    fn rule_fault(&self, warning: &RuleFaultWarning) {
        let _ = warning;
    }

    /// Reports a recoverable warning with a stable code.
    fn note(&self, code: &'static str, detail: &str) {
        let _ = (code, detail);
    }
}

/// Telemetry sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl EngineTelemetry for NoopTelemetry {}
