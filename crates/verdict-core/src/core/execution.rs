// crates/verdict-core/src/core/execution.rs
// ============================================================================
// Module: Verdict Execution Model
// Description: Evaluation requests, results, and execution-log records.
// Purpose: Define the engine's input/output surface and its append-only log.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! One evaluation turns a fact map into a weighted score, a positional
//! action pattern, and an optional recommendation. Dry runs add per-rule
//! outcome entries and skip the execution log entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::ConsumerId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::RulesetId;
use crate::core::identifiers::TestId;
use crate::core::lifecycle::Variant;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Fact Map
// ============================================================================

/// Input fact record: string keys mapped to JSON scalars or lists.
pub type FactMap = Map<String, Value>;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// One evaluation request as received from the transport edge.
///
/// # Invariants
/// - `data` may be empty; a missing payload is rejected upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvaluationRequest {
    /// Ruleset name; the default-selection rule applies when absent.
    #[serde(default)]
    pub ruleset_name: Option<String>,
    /// Input fact record.
    pub data: FactMap,
    /// A/B test to consult for variant routing.
    #[serde(default)]
    pub ab_test_id: Option<TestId>,
    /// Explicit assignment key overriding derivation from `data`.
    #[serde(default)]
    pub assignment_key: Option<String>,
    /// Consumer identity for usage attribution.
    #[serde(default)]
    pub consumer_id: Option<ConsumerId>,
    /// Correlation identifier threaded into the execution log.
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    /// When set, the evaluation produces no execution-log side effect.
    #[serde(default)]
    pub dry_run: bool,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Per-rule outcome entry reported on dry runs.
///
/// # Invariants
/// - `points` is zero when `would_match` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunEntry {
    /// Rule name.
    pub rule_name: String,
    /// Whether the rule's predicate matched the fact map.
    pub would_match: bool,
    /// Points the rule would contribute.
    pub points: f64,
}

/// Result of one evaluation.
///
/// # Invariants
/// - `pattern_result` concatenates per-rule tokens in ascending priority
///   order; `rules_matched <= rules_executed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Execution identifier assigned to this evaluation.
    pub execution_id: ExecutionId,
    /// Sum of `rule_point × weight` over matched rules.
    pub total_points: f64,
    /// Concatenated per-rule action tokens in priority order.
    pub pattern_result: String,
    /// Recommendation from the actionset, when the pattern matched exactly.
    pub action_recommendation: Option<String>,
    /// Number of rules evaluated.
    pub rules_executed: usize,
    /// Number of rules that matched.
    pub rules_matched: usize,
    /// Wall-clock evaluation duration in milliseconds.
    pub execution_time_ms: f64,
    /// Registry version observed by this evaluation.
    pub registry_version: u64,
    /// A/B test consulted, when variant routing applied.
    #[serde(default)]
    pub ab_test_id: Option<TestId>,
    /// Variant served, when variant routing applied.
    #[serde(default)]
    pub ab_test_variant: Option<Variant>,
    /// Per-rule outcome entries; populated only on dry runs.
    #[serde(default)]
    pub dry_run_entries: Option<Vec<DryRunEntry>>,
}

/// Summary of one batch evaluation.
///
/// # Invariants
/// - `total == succeeded + failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of inputs in the batch.
    pub total: usize,
    /// Number of inputs that evaluated successfully.
    pub succeeded: usize,
    /// Number of inputs that failed validation or resolution.
    pub failed: usize,
}

// ============================================================================
// SECTION: Execution Log
// ============================================================================

/// Append-only record of one completed evaluation.
///
/// # Invariants
/// - Records are never updated after append; queries filter by time range
///   and by `(ab_test_id, variant)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Input fact record as evaluated.
    pub input_data: Value,
    /// Serialized evaluation result.
    pub output_data: Value,
    /// Ruleset that served the evaluation.
    pub ruleset_id: RulesetId,
    /// Total weighted points.
    pub total_points: f64,
    /// Concatenated action pattern.
    pub pattern_result: String,
    /// Evaluation duration in milliseconds.
    pub execution_time_ms: f64,
    /// Whether the evaluation completed without an engine error.
    pub success: bool,
    /// A/B test row identifier, when variant routing applied.
    #[serde(default)]
    pub ab_test_id: Option<i64>,
    /// Variant served, when variant routing applied.
    #[serde(default)]
    pub ab_test_variant: Option<Variant>,
    /// Consumer identity, when provided by the request.
    #[serde(default)]
    pub consumer_id: Option<ConsumerId>,
    /// Correlation identifier, when provided by the request.
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    /// Record timestamp.
    pub timestamp: Timestamp,
}
