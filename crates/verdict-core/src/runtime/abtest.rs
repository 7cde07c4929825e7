// crates/verdict-core/src/runtime/abtest.rs
// ============================================================================
// Module: Verdict A/B Test Router
// Description: Deterministic variant assignment and test lifecycle control.
// Purpose: Route evaluations between two rule versions with sticky,
//          hash-derived assignments and significance estimation.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Variant assignment is a pure function of `(test_id, assignment_key)`: the
//! SHA-256 digest of `"{test_id}:{assignment_key}"` truncated to 128 bits,
//! taken modulo 100, and compared against `floor(100 × traffic_split_a)`.
//! Once a sticky assignment row exists it is never reassigned while the test
//! runs; races between two first-time assignments resolve through the
//! store's unique constraint — the loser re-reads the winner's row.
//!
//! Significance preserves the original estimator for behavioral parity:
//! `p = exp(−χ²/2) / sqrt(2π·χ²)` over the 2×2 variant × success table,
//! reported as `1 − p`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::AbTestRecord;
use crate::core::ErrorReport;
use crate::core::FactMap;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RulesetId;
use crate::core::TestAssignmentRecord;
use crate::core::TestId;
use crate::core::TestStatus;
use crate::core::Timestamp;
use crate::core::Variant;
use crate::core::hashing;
use crate::interfaces::Clock;
use crate::interfaces::EngineMetric;
use crate::interfaces::EngineTelemetry;
use crate::interfaces::ExecutionFilter;
use crate::interfaces::RuleStore;
use crate::interfaces::StoreError;
use crate::interfaces::TestFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tolerance applied to the traffic-split sum invariant.
const SPLIT_SUM_TOLERANCE: f64 = 0.01;

/// Fact keys consulted, in priority order, to derive an assignment key.
const ASSIGNMENT_KEY_PRIORITY: [&str; 4] =
    ["user_id", "session_id", "correlation_id", "customer_id"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A/B router errors.
///
/// # Invariants
/// - Codes are stable; lifecycle violations name the current status.
#[derive(Debug, Error)]
pub enum AbTestError {
    /// Test identifier is blank.
    #[error("test id cannot be empty")]
    EmptyTestId,
    /// Test name is blank.
    #[error("test name cannot be empty")]
    EmptyTestName,
    /// Rule identifier is blank.
    #[error("rule id cannot be empty")]
    EmptyRuleId,
    /// A traffic split lies outside `[0, 1]`.
    #[error("traffic splits must lie between 0 and 1")]
    InvalidTrafficSplit,
    /// Traffic splits do not sum to 1 within tolerance.
    #[error("traffic splits must sum to 1.0")]
    SplitSumMismatch,
    /// Confidence level lies outside `(0, 1]`.
    #[error("confidence level must lie in (0, 1]")]
    InvalidConfidenceLevel,
    /// Test identifier already exists.
    #[error("test `{test_id}` already exists")]
    TestExists {
        /// Conflicting test identifier.
        test_id: TestId,
    },
    /// Test does not exist.
    #[error("test `{test_id}` not found")]
    TestNotFound {
        /// Missing test identifier.
        test_id: TestId,
    },
    /// Lifecycle transition requires draft status.
    #[error("test `{test_id}` is not draft (current: {current})")]
    TestNotDraft {
        /// Test identifier.
        test_id: TestId,
        /// Current status label.
        current: &'static str,
    },
    /// Lifecycle transition requires running status.
    #[error("test `{test_id}` is not running (current: {current})")]
    TestNotRunning {
        /// Test identifier.
        test_id: TestId,
        /// Current status label.
        current: &'static str,
    },
    /// Winning variant label is not `A` or `B`.
    #[error("invalid winning variant")]
    InvalidWinningVariant,
    /// Store operation failed.
    #[error("a/b store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl Reportable for AbTestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTestId => "TEST_ID_EMPTY",
            Self::EmptyTestName => "TEST_NAME_EMPTY",
            Self::EmptyRuleId => "RULE_ID_EMPTY",
            Self::InvalidTrafficSplit => "INVALID_TRAFFIC_SPLIT",
            Self::SplitSumMismatch => "TRAFFIC_SPLIT_SUM_ERROR",
            Self::InvalidConfidenceLevel => "INVALID_CONFIDENCE_LEVEL",
            Self::TestExists { .. } => "TEST_ID_EXISTS",
            Self::TestNotFound { .. } => "TEST_NOT_FOUND",
            Self::TestNotDraft { .. } => "TEST_NOT_DRAFT",
            Self::TestNotRunning { .. } => "TEST_NOT_RUNNING",
            Self::InvalidWinningVariant => "INVALID_WINNING_VARIANT",
            Self::Store(_) => "ASSIGNMENT_ERROR",
        }
    }

    fn to_report(&self) -> ErrorReport {
        let error_type = match self {
            Self::Store(_) => "configuration",
            _ => "validation",
        };
        ErrorReport::new(error_type, self.to_string(), self.error_code())
    }
}

// ============================================================================
// SECTION: Test Specification
// ============================================================================

/// Parameters for creating one A/B test.
///
/// # Invariants
/// - Validated by [`AbTestRouter::create_test`] before any store write.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpec {
    /// Unique test identifier.
    pub test_id: TestId,
    /// Human-readable test name.
    pub test_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Rule under test.
    pub rule_id: RuleId,
    /// Ruleset scope.
    pub ruleset_id: RulesetId,
    /// Traffic share for variant A.
    pub traffic_split_a: f64,
    /// Traffic share for variant B.
    pub traffic_split_b: f64,
    /// Rule version label served to variant A.
    pub variant_a_version: String,
    /// Rule version label served to variant B.
    pub variant_b_version: String,
    /// Planned duration in hours.
    pub duration_hours: Option<u32>,
    /// Minimum per-variant sample size.
    pub min_sample_size: Option<u64>,
    /// Statistical confidence level in `(0, 1]`.
    pub confidence_level: f64,
}

/// Variant resolution handed back to the execution engine.
///
/// # Invariants
/// - `version_label` belongs to the resolved `variant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedVariant {
    /// Test row identifier for execution-log tagging.
    pub test_row: i64,
    /// Test identifier.
    pub test_id: TestId,
    /// Rule the test targets.
    pub rule_id: RuleId,
    /// Assigned variant.
    pub variant: Variant,
    /// Rule version label the variant serves.
    pub version_label: String,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Aggregated execution metrics for one variant.
///
/// # Invariants
/// - Averages are zero when `total_executions` is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantMetrics {
    /// Executions logged under the variant.
    pub total_executions: u64,
    /// Executions flagged successful.
    pub successful_executions: u64,
    /// Executions flagged failed.
    pub failed_executions: u64,
    /// Success ratio in `[0, 1]`.
    pub success_rate: f64,
    /// Mean execution time in milliseconds.
    pub avg_execution_time_ms: f64,
    /// Mean total points.
    pub avg_total_points: f64,
}

/// Per-variant section of a metrics report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantReport {
    /// Rule version label the variant serves.
    pub version: String,
    /// Configured traffic share.
    pub traffic_split: f64,
    /// Distinct sticky assignments.
    pub assignments: u64,
    /// Aggregated execution metrics.
    pub metrics: VariantMetrics,
}

/// Full metrics report for one test.
///
/// # Invariants
/// - `sample_size_met` requires both variants to reach `min_sample_size`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestMetrics {
    /// Test identifier.
    pub test_id: TestId,
    /// Current lifecycle status.
    pub status: TestStatus,
    /// Control variant section.
    pub variant_a: VariantReport,
    /// Treatment variant section.
    pub variant_b: VariantReport,
    /// Significance estimate (`1 − p`), when computable.
    pub statistical_significance: Option<f64>,
    /// Declared winner, when decided.
    pub winning_variant: Option<Variant>,
    /// Configured minimum per-variant sample size.
    pub min_sample_size: Option<u64>,
    /// Configured confidence level.
    pub confidence_level: f64,
    /// Whether both variants reached the minimum sample size.
    pub sample_size_met: bool,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// A/B test router over the authoritative store.
///
/// # Invariants
/// - Assignments are deterministic per `(test_id, assignment_key)`.
pub struct AbTestRouter {
    /// Authoritative store.
    store: Arc<dyn RuleStore>,
    /// Wall-clock seam.
    clock: Arc<dyn Clock>,
    /// Telemetry sink.
    telemetry: Arc<dyn EngineTelemetry>,
}

impl AbTestRouter {
    /// Creates a router over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RuleStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn EngineTelemetry>,
    ) -> Self {
        Self {
            store,
            clock,
            telemetry,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Validates and creates a draft test.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] on invalid parameters, a duplicate test
    /// identifier, or a store failure.
    pub fn create_test(&self, spec: &TestSpec) -> Result<AbTestRecord, AbTestError> {
        if spec.test_id.is_blank() {
            return Err(AbTestError::EmptyTestId);
        }
        if spec.test_name.trim().is_empty() {
            return Err(AbTestError::EmptyTestName);
        }
        if spec.rule_id.is_blank() {
            return Err(AbTestError::EmptyRuleId);
        }
        if !(0.0 ..= 1.0).contains(&spec.traffic_split_a)
            || !(0.0 ..= 1.0).contains(&spec.traffic_split_b)
        {
            return Err(AbTestError::InvalidTrafficSplit);
        }
        if (spec.traffic_split_a + spec.traffic_split_b - 1.0).abs() > SPLIT_SUM_TOLERANCE {
            return Err(AbTestError::SplitSumMismatch);
        }
        if spec.confidence_level <= 0.0 || spec.confidence_level > 1.0 {
            return Err(AbTestError::InvalidConfidenceLevel);
        }
        let mut record = AbTestRecord {
            row_id: 0,
            test_id: spec.test_id.clone(),
            test_name: spec.test_name.clone(),
            description: spec.description.clone(),
            rule_id: spec.rule_id.clone(),
            ruleset_id: spec.ruleset_id,
            traffic_split_a: spec.traffic_split_a,
            traffic_split_b: spec.traffic_split_b,
            variant_a_version: spec.variant_a_version.clone(),
            variant_b_version: spec.variant_b_version.clone(),
            status: TestStatus::Draft,
            start_time: None,
            end_time: None,
            duration_hours: spec.duration_hours,
            min_sample_size: spec.min_sample_size,
            confidence_level: spec.confidence_level,
            winning_variant: None,
            statistical_significance: None,
        };
        match self.store.insert_test(&record) {
            Ok(row_id) => {
                record.row_id = row_id;
                Ok(record)
            }
            Err(StoreError::Conflict(_)) => Err(AbTestError::TestExists {
                test_id: spec.test_id.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Starts a draft test and stamps its window.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the test is missing, not draft, or the
    /// store write fails.
    pub fn start_test(&self, test_id: &TestId) -> Result<AbTestRecord, AbTestError> {
        let mut test = self.require_test(test_id)?;
        if test.status != TestStatus::Draft {
            return Err(AbTestError::TestNotDraft {
                test_id: test_id.clone(),
                current: test.status.as_str(),
            });
        }
        let now = self.clock.now();
        test.status = TestStatus::Running;
        test.start_time = Some(now);
        test.end_time = test.duration_hours.and_then(|hours| add_hours(now, hours));
        self.store.update_test(&test)?;
        Ok(test)
    }

    /// Stops a running test, optionally declaring a winner.
    ///
    /// When a winner is declared, the significance estimate from accumulated
    /// execution tallies is computed and persisted on the test.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the test is missing, not running, or the
    /// store write fails.
    pub fn stop_test(
        &self,
        test_id: &TestId,
        winning_variant: Option<Variant>,
    ) -> Result<AbTestRecord, AbTestError> {
        let mut test = self.require_test(test_id)?;
        if test.status != TestStatus::Running {
            return Err(AbTestError::TestNotRunning {
                test_id: test_id.clone(),
                current: test.status.as_str(),
            });
        }
        test.status = TestStatus::Completed;
        test.end_time = Some(self.clock.now());
        test.winning_variant = winning_variant;
        if winning_variant.is_some() {
            let metrics = self.metrics_for(&test)?;
            test.statistical_significance = metrics.statistical_significance;
        }
        self.store.update_test(&test)?;
        Ok(test)
    }

    /// Deletes a draft test.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the test is missing, not draft, or the
    /// store delete fails.
    pub fn delete_test(&self, test_id: &TestId) -> Result<(), AbTestError> {
        let test = self.require_test(test_id)?;
        if test.status != TestStatus::Draft {
            return Err(AbTestError::TestNotDraft {
                test_id: test_id.clone(),
                current: test.status.as_str(),
            });
        }
        self.store.delete_test(test_id)?;
        Ok(())
    }

    /// Loads one test by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the identifier is blank or the store
    /// query fails.
    pub fn get_test(&self, test_id: &TestId) -> Result<Option<AbTestRecord>, AbTestError> {
        if test_id.is_blank() {
            return Err(AbTestError::EmptyTestId);
        }
        Ok(self.store.get_test(test_id)?)
    }

    /// Lists tests under the filter.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the store query fails.
    pub fn list_tests(&self, filter: &TestFilter) -> Result<Vec<AbTestRecord>, AbTestError> {
        Ok(self.store.list_tests(filter)?)
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    /// Returns the deterministic bucket variant for `(test, key)`.
    #[must_use]
    pub fn bucket_variant(test_id: &TestId, assignment_key: &str, traffic_split_a: f64) -> Variant {
        let bucket = hashing::stable_bucket(&format!("{test_id}:{assignment_key}"));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "Split point is clamped into [0, 100] before the cast."
        )]
        let split_point = (traffic_split_a.clamp(0.0, 1.0) * 100.0).floor() as u8;
        if bucket < split_point { Variant::A } else { Variant::B }
    }

    /// Assigns a key to a variant, creating or touching the sticky row.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the test is missing, not running on a
    /// first-time assignment, or the store fails.
    pub fn assign_variant(
        &self,
        test_id: &TestId,
        assignment_key: &str,
    ) -> Result<Variant, AbTestError> {
        let test = self.require_test(test_id)?;
        self.assign_with_test(&test, assignment_key)
    }

    /// Assigns against an already-loaded test record.
    fn assign_with_test(
        &self,
        test: &AbTestRecord,
        assignment_key: &str,
    ) -> Result<Variant, AbTestError> {
        let now = self.clock.now();
        if let Some(existing) = self.store.get_assignment(test.row_id, assignment_key)? {
            self.store.touch_assignment(test.row_id, assignment_key, now)?;
            return Ok(existing.variant);
        }
        if test.status != TestStatus::Running {
            return Err(AbTestError::TestNotRunning {
                test_id: test.test_id.clone(),
                current: test.status.as_str(),
            });
        }
        let variant = Self::bucket_variant(&test.test_id, assignment_key, test.traffic_split_a);
        let record = TestAssignmentRecord {
            ab_test_id: test.row_id,
            assignment_key: assignment_key.to_string(),
            variant,
            assigned_at: now,
            execution_count: 1,
            last_execution_at: now,
        };
        match self.store.insert_assignment(&record) {
            Ok(()) => Ok(variant),
            Err(StoreError::Conflict(_)) => {
                // Lost a first-time race; the winner's row is authoritative.
                self.telemetry.record(EngineMetric::AssignmentConflicts, 1);
                let winner = self
                    .store
                    .get_assignment(test.row_id, assignment_key)?
                    .map(|row| row.variant)
                    .unwrap_or(variant);
                self.store.touch_assignment(test.row_id, assignment_key, now)?;
                Ok(winner)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Derives an assignment key from a fact map.
    ///
    /// Priority: `user_id`, `session_id`, `correlation_id`, `customer_id`,
    /// then a stable hash of the canonicalized fact map. Empty fact maps
    /// yield `None`.
    #[must_use]
    pub fn assignment_key_from_facts(facts: &FactMap) -> Option<String> {
        if facts.is_empty() {
            return None;
        }
        for key in ASSIGNMENT_KEY_PRIORITY {
            if let Some(value) = facts.get(key)
                && !value.is_null()
            {
                let text = crate::runtime::evaluator::canonical_text(value);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        hashing::derived_assignment_key(&Value::Object(facts.clone())).ok()
    }

    /// Resolves the routed variant for one evaluation, when applicable.
    ///
    /// A missing or non-running test, or an underivable assignment key,
    /// disables routing for the evaluation rather than failing it.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] only on store failures.
    pub fn route(
        &self,
        test_id: &TestId,
        explicit_key: Option<&str>,
        facts: &FactMap,
    ) -> Result<Option<RoutedVariant>, AbTestError> {
        let Some(test) = self.store.get_test(test_id)? else {
            self.telemetry.note("AB_TEST_NOT_FOUND", test_id.as_str());
            return Ok(None);
        };
        if test.status != TestStatus::Running {
            self.telemetry.note("AB_TEST_NOT_RUNNING", test_id.as_str());
            return Ok(None);
        }
        let derived;
        let key = match explicit_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => match Self::assignment_key_from_facts(facts) {
                Some(value) => {
                    derived = value;
                    derived.as_str()
                }
                None => {
                    self.telemetry.note("AB_ASSIGNMENT_KEY_UNAVAILABLE", test_id.as_str());
                    return Ok(None);
                }
            },
        };
        let variant = self.assign_with_test(&test, key)?;
        let version_label = match variant {
            Variant::A => test.variant_a_version.clone(),
            Variant::B => test.variant_b_version.clone(),
        };
        Ok(Some(RoutedVariant {
            test_row: test.row_id,
            test_id: test.test_id,
            rule_id: test.rule_id,
            variant,
            version_label,
        }))
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Builds the metrics report for one test.
    ///
    /// # Errors
    ///
    /// Returns [`AbTestError`] when the test is missing or a store query
    /// fails.
    pub fn get_test_metrics(&self, test_id: &TestId) -> Result<TestMetrics, AbTestError> {
        let test = self.require_test(test_id)?;
        self.metrics_for(&test)
    }

    /// Builds the metrics report for an already-loaded test record.
    fn metrics_for(&self, test: &AbTestRecord) -> Result<TestMetrics, AbTestError> {
        let counts = self.store.count_assignments(test.row_id)?;
        let metrics_a = self.variant_metrics(test.row_id, Variant::A)?;
        let metrics_b = self.variant_metrics(test.row_id, Variant::B)?;
        let statistical_significance = significance(&metrics_a, &metrics_b);
        let minimum = test.min_sample_size.unwrap_or(0);
        Ok(TestMetrics {
            test_id: test.test_id.clone(),
            status: test.status,
            variant_a: VariantReport {
                version: test.variant_a_version.clone(),
                traffic_split: test.traffic_split_a,
                assignments: counts.variant_a,
                metrics: metrics_a,
            },
            variant_b: VariantReport {
                version: test.variant_b_version.clone(),
                traffic_split: test.traffic_split_b,
                assignments: counts.variant_b,
                metrics: metrics_b,
            },
            statistical_significance,
            winning_variant: test.winning_variant,
            min_sample_size: test.min_sample_size,
            confidence_level: test.confidence_level,
            sample_size_met: counts.variant_a >= minimum && counts.variant_b >= minimum,
        })
    }

    /// Aggregates execution-log tallies for one variant.
    fn variant_metrics(
        &self,
        test_row: i64,
        variant: Variant,
    ) -> Result<VariantMetrics, AbTestError> {
        let records = self.store.list_executions(&ExecutionFilter {
            ab_test_id: Some(test_row),
            variant: Some(variant),
            ..ExecutionFilter::default()
        })?;
        let total = records.len() as u64;
        let successful = records.iter().filter(|record| record.success).count() as u64;
        let (time_sum, points_sum) = records.iter().fold((0.0_f64, 0.0_f64), |acc, record| {
            (acc.0 + record.execution_time_ms, acc.1 + record.total_points)
        });
        #[allow(
            clippy::cast_precision_loss,
            reason = "Tallies stay far below the f64 integer range."
        )]
        let denominator = if total == 0 { 1.0 } else { total as f64 };
        #[allow(
            clippy::cast_precision_loss,
            reason = "Tallies stay far below the f64 integer range."
        )]
        let success_rate = if total == 0 { 0.0 } else { successful as f64 / denominator };
        Ok(VariantMetrics {
            total_executions: total,
            successful_executions: successful,
            failed_executions: total - successful,
            success_rate,
            avg_execution_time_ms: if total == 0 { 0.0 } else { time_sum / denominator },
            avg_total_points: if total == 0 { 0.0 } else { points_sum / denominator },
        })
    }

    /// Loads a test or fails with `TEST_NOT_FOUND`.
    fn require_test(&self, test_id: &TestId) -> Result<AbTestRecord, AbTestError> {
        if test_id.is_blank() {
            return Err(AbTestError::EmptyTestId);
        }
        self.store.get_test(test_id)?.ok_or_else(|| AbTestError::TestNotFound {
            test_id: test_id.clone(),
        })
    }
}

// ============================================================================
// SECTION: Significance
// ============================================================================

/// Estimates `1 − p` from the 2×2 variant × success contingency table.
///
/// Returns `None` when either variant has no executions or the statistic is
/// degenerate.
#[must_use]
pub fn significance(variant_a: &VariantMetrics, variant_b: &VariantMetrics) -> Option<f64> {
    if variant_a.total_executions == 0 || variant_b.total_executions == 0 {
        return None;
    }
    #[allow(
        clippy::cast_precision_loss,
        reason = "Tallies stay far below the f64 integer range."
    )]
    let observed = [
        variant_a.successful_executions as f64,
        variant_a.failed_executions as f64,
        variant_b.successful_executions as f64,
        variant_b.failed_executions as f64,
    ];
    let row_totals = [observed[0] + observed[1], observed[2] + observed[3]];
    let col_totals = [observed[0] + observed[2], observed[1] + observed[3]];
    let grand_total: f64 = observed.iter().sum();
    if grand_total <= 0.0 {
        return None;
    }
    let mut chi_square = 0.0;
    for (index, actual) in observed.iter().enumerate() {
        let expected = row_totals[index / 2] * col_totals[index % 2] / grand_total;
        if expected > 0.0 {
            chi_square += (actual - expected).powi(2) / expected;
        }
    }
    if chi_square <= 0.0 {
        return None;
    }
    let p_value = (-chi_square / 2.0).exp() / (2.0 * std::f64::consts::PI * chi_square).sqrt();
    Some(1.0 - p_value)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Adds whole hours to a wall-clock timestamp.
fn add_hours(timestamp: Timestamp, hours: u32) -> Option<Timestamp> {
    let millis = timestamp.as_unix_millis()?;
    let delta = i64::from(hours).checked_mul(3_600_000)?;
    Some(Timestamp::UnixMillis(millis.checked_add(delta)?))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
