// crates/verdict-core/src/core/lifecycle.rs
// ============================================================================
// Module: Verdict Lifecycle Model
// Description: Version snapshots, A/B tests, assignments, and consumers.
// Purpose: Define the records backing rollback, variant routing, and usage
//          attribution.
// Dependencies: crate::core::{identifiers, rule, time}, serde
// ============================================================================

//! ## Overview
//! Lifecycle records capture how rules change over time. Version snapshots
//! are immutable per-`rule_id` rows supporting diff and rollback; A/B tests
//! route evaluations between two rule versions with sticky, hash-derived
//! assignments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ConsumerId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RulesetId;
use crate::core::identifiers::TestId;
use crate::core::rule::ConditionOperator;
use crate::core::rule::RuleStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Version Snapshots
// ============================================================================

/// Immutable snapshot of one rule at one point in time.
///
/// # Invariants
/// - `version_number` is strictly increasing per `rule_id`.
/// - Exactly one snapshot per `rule_id` has `is_current = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVersionRecord {
    /// Rule identifier the snapshot belongs to.
    pub rule_id: RuleId,
    /// Strictly increasing version number within the rule.
    pub version_number: u32,
    /// Rule name at snapshot time.
    pub rule_name: String,
    /// Inline condition attribute at snapshot time, when flat-shaped.
    #[serde(default)]
    pub attribute: Option<String>,
    /// Inline condition operator at snapshot time, when flat-shaped.
    #[serde(default)]
    pub condition: Option<ConditionOperator>,
    /// Inline condition constant at snapshot time, when flat-shaped.
    #[serde(default)]
    pub constant: Option<String>,
    /// Advisory message at snapshot time.
    #[serde(default)]
    pub message: Option<String>,
    /// Weight multiplier at snapshot time.
    pub weight: f64,
    /// Points at snapshot time.
    pub rule_point: u32,
    /// Priority at snapshot time.
    pub priority: i32,
    /// Action token or template at snapshot time.
    pub action_result: String,
    /// Lifecycle status at snapshot time.
    pub status: RuleStatus,
    /// Version label at snapshot time.
    pub version: String,
    /// Owning ruleset at snapshot time.
    pub ruleset_id: RulesetId,
    /// Marks the snapshot currently materialized in the live rule.
    pub is_current: bool,
    /// Reason recorded for the change that produced this snapshot.
    #[serde(default)]
    pub change_reason: Option<String>,
    /// Author of the change.
    #[serde(default)]
    pub created_by: Option<String>,
    /// Snapshot creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: A/B Tests
// ============================================================================

/// A/B test lifecycle status.
///
/// # Invariants
/// - Transitions follow `draft → running → completed`; no other edges exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Configured but not yet routing traffic.
    Draft,
    /// Actively routing traffic.
    Running,
    /// Stopped; assignments are frozen.
    Completed,
}

impl TestStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

/// A/B variant label.
///
/// # Invariants
/// - `A` is the control variant, `B` the treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Control variant.
    A,
    /// Treatment variant.
    B,
}

impl Variant {
    /// Returns the stable wire label for the variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// A/B test definition routing one rule between two versions.
///
/// # Invariants
/// - `|traffic_split_a + traffic_split_b − 1| < 0.01`.
/// - `confidence_level` lies in `(0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestRecord {
    /// Numeric store row identifier (0 when the record never hit the store).
    #[serde(default)]
    pub row_id: i64,
    /// Unique test identifier.
    pub test_id: TestId,
    /// Human-readable test name.
    pub test_name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Rule under test.
    pub rule_id: RuleId,
    /// Ruleset scope for the test.
    pub ruleset_id: RulesetId,
    /// Traffic share routed to variant A, in `[0, 1]`.
    pub traffic_split_a: f64,
    /// Traffic share routed to variant B, in `[0, 1]`.
    pub traffic_split_b: f64,
    /// Rule version label served to variant A.
    pub variant_a_version: String,
    /// Rule version label served to variant B.
    pub variant_b_version: String,
    /// Lifecycle status.
    pub status: TestStatus,
    /// Test start time.
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    /// Test end time.
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    /// Planned duration in hours.
    #[serde(default)]
    pub duration_hours: Option<u32>,
    /// Minimum per-variant sample size before results are trusted.
    #[serde(default)]
    pub min_sample_size: Option<u64>,
    /// Statistical confidence level in `(0, 1]`.
    pub confidence_level: f64,
    /// Declared winner, when the test has been decided.
    #[serde(default)]
    pub winning_variant: Option<Variant>,
    /// Persisted significance estimate, when computed at stop time.
    #[serde(default)]
    pub statistical_significance: Option<f64>,
}

/// Sticky assignment of one key to one variant.
///
/// # Invariants
/// - `(ab_test_id, assignment_key)` is unique; an assignment is never
///   reassigned while the test is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAssignmentRecord {
    /// Owning test row identifier.
    pub ab_test_id: i64,
    /// Assignment key (user, session, correlation, or derived hash).
    pub assignment_key: String,
    /// Assigned variant.
    pub variant: Variant,
    /// Assignment time.
    pub assigned_at: Timestamp,
    /// Number of evaluations served under this assignment.
    pub execution_count: u64,
    /// Most recent evaluation time under this assignment.
    pub last_execution_at: Timestamp,
}

// ============================================================================
// SECTION: Consumers
// ============================================================================

/// Opaque consumer identity used for per-rule usage attribution.
///
/// # Invariants
/// - `consumer_id` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    /// Consumer identifier.
    pub consumer_id: ConsumerId,
    /// Human-readable consumer name.
    pub name: String,
    /// Lifecycle status.
    pub status: RuleStatus,
}
