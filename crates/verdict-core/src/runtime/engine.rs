// crates/verdict-core/src/runtime/engine.rs
// ============================================================================
// Module: Verdict Execution Engine
// Description: Evaluates fact maps against the registry's prepared rules.
// Purpose: Produce weighted scores, positional action patterns, and
//          recommendations with contained per-rule faults.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The hot path never compiles: prepared rules come from the registry as one
//! coherent snapshot, and rule iteration is strictly by ascending priority
//! (ties keep registry insertion order). A matched rule emits its action
//! token — after template expansion — and contributes
//! `rule_point × weight`; a non-match or contained fault emits `"-"`.
//! The concatenated tokens form the pattern result looked up exactly in the
//! resolved ruleset's actionset; a missing entry yields a null
//! recommendation, not an error.
//!
//! Execution-log appends are fire-and-forget through the sink; dry runs
//! produce no log side effect.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::DryRunEntry;
use crate::core::ErrorReport;
use crate::core::EvaluationRequest;
use crate::core::EvaluationResult;
use crate::core::ExecutionId;
use crate::core::ExecutionRecord;
use crate::core::FactMap;
use crate::core::Reportable;
use crate::core::execution::BatchSummary;
use crate::interfaces::Clock;
use crate::interfaces::EngineMetric;
use crate::interfaces::EngineTelemetry;
use crate::interfaces::ExecutionSink;
use crate::interfaces::RuleFaultWarning;
use crate::interfaces::RuleStore;
use crate::interfaces::StoreError;
use crate::runtime::abtest::AbTestError;
use crate::runtime::abtest::AbTestRouter;
use crate::runtime::abtest::RoutedVariant;
use crate::runtime::compiler;
use crate::runtime::compiler::PreparedRule;
use crate::runtime::evaluator;
use crate::runtime::registry::EvaluationSnapshot;
use crate::runtime::registry::RuleRegistry;
use crate::runtime::template;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Token emitted for a non-matching or faulted rule.
pub const NO_MATCH_TOKEN: &str = "-";

/// Request keys stripped from loose JSON payloads before evaluation.
const CONTROL_KEYS: [&str; 5] =
    ["dry_run", "batch", "action", "max_workers", "ruleset_name"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution engine errors.
///
/// # Invariants
/// - Codes are stable; per-rule evaluator faults never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input payload is absent or not an object.
    #[error("input data must be a JSON object: {detail}")]
    InvalidInput {
        /// What was malformed.
        detail: String,
    },
    /// No ruleset resolved from the selector.
    #[error("no ruleset resolved for selector `{selector}`")]
    RulesetNotFound {
        /// Requested selector (`<default>` when none was named).
        selector: String,
    },
    /// A/B routing failed on a store fault.
    #[error("a/b routing failed: {0}")]
    Routing(#[from] AbTestError),
    /// Store operation failed.
    #[error("rule store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl Reportable for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "DATA_INVALID_TYPE",
            Self::RulesetNotFound { .. } => "RULESET_NOT_FOUND",
            Self::Routing(inner) => inner.error_code(),
            Self::Store(_) => "RULE_STORE_ERROR",
        }
    }

    fn to_report(&self) -> ErrorReport {
        let error_type = match self {
            Self::InvalidInput { .. } | Self::RulesetNotFound { .. } => "validation",
            Self::Routing(_) | Self::Store(_) => "configuration",
        };
        ErrorReport::new(error_type, self.to_string(), self.error_code())
    }
}

// ============================================================================
// SECTION: Batch Types
// ============================================================================

/// Outcome of one batch item.
///
/// # Invariants
/// - Exactly one of `result` and `error` is populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemOutcome {
    /// Position within the batch.
    pub index: usize,
    /// Evaluation result on success.
    pub result: Option<EvaluationResult>,
    /// Error report on failure.
    pub error: Option<ErrorReport>,
}

/// Outcome of one batch evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Per-item outcomes in input order.
    pub items: Vec<BatchItemOutcome>,
    /// Batch summary tallies.
    pub summary: BatchSummary,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Rule execution engine over injected collaborators.
///
/// # Invariants
/// - Every evaluation observes exactly one registry snapshot.
pub struct ExecutionEngine {
    /// In-memory rule registry.
    registry: Arc<RuleRegistry>,
    /// Authoritative store (A/B versions, usage counters).
    store: Arc<dyn RuleStore>,
    /// Execution-log sink.
    sink: Arc<dyn ExecutionSink>,
    /// Wall-clock seam.
    clock: Arc<dyn Clock>,
    /// Telemetry sink.
    telemetry: Arc<dyn EngineTelemetry>,
    /// Optional A/B router.
    router: Option<Arc<AbTestRouter>>,
    /// Execution identifier sequence.
    execution_seq: AtomicU64,
}

impl ExecutionEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<RuleRegistry>,
        store: Arc<dyn RuleStore>,
        sink: Arc<dyn ExecutionSink>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn EngineTelemetry>,
        router: Option<Arc<AbTestRouter>>,
    ) -> Self {
        Self {
            registry,
            store,
            sink,
            clock,
            telemetry,
            router,
            execution_seq: AtomicU64::new(0),
        }
    }

    /// Evaluates a loose JSON payload as received from the transport edge.
    ///
    /// The payload must be an object. A `data` key selects the typed request
    /// shape; otherwise the object itself is the fact map with control keys
    /// (`dry_run`, `ruleset_name`, ...) stripped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] with code `DATA_INVALID_TYPE`
    /// when the payload is not an object, plus any error from
    /// [`Self::evaluate`].
    pub fn evaluate_json(&self, payload: &Value) -> Result<EvaluationResult, EngineError> {
        let Value::Object(object) = payload else {
            return Err(EngineError::InvalidInput {
                detail: format!("got {}", json_kind(payload)),
            });
        };
        if object.contains_key("data") {
            let request: EvaluationRequest =
                serde_json::from_value(payload.clone()).map_err(|err| {
                    EngineError::InvalidInput {
                        detail: err.to_string(),
                    }
                })?;
            return self.evaluate(&request);
        }
        let dry_run = object.get("dry_run").and_then(Value::as_bool).unwrap_or(false);
        let ruleset_name = object
            .get("ruleset_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let data: FactMap = object
            .iter()
            .filter(|(key, _)| !CONTROL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.evaluate(&EvaluationRequest {
            ruleset_name,
            data,
            dry_run,
            ..EvaluationRequest::default()
        })
    }

    /// Evaluates one request against the registry snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the ruleset cannot be resolved or a
    /// collaborator store fault occurs; per-rule evaluation faults are
    /// contained as `"-"` tokens.
    pub fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResult, EngineError> {
        let started = Instant::now();
        let snapshot = self
            .registry
            .evaluation_snapshot(request.ruleset_name.as_deref())
            .ok_or_else(|| EngineError::RulesetNotFound {
                selector: request
                    .ruleset_name
                    .clone()
                    .unwrap_or_else(|| "<default>".to_string()),
            })?;

        let routed = self.resolve_variant(request)?;
        let prepared = self.substituted_rules(&snapshot, routed.as_ref())?;

        let mut pattern = String::new();
        let mut total_points = 0.0_f64;
        let mut matched = 0_usize;
        let mut entries = request.dry_run.then(Vec::new);
        for rule in prepared.iter() {
            let outcome = evaluator::evaluate_predicate(&rule.predicate, &request.data);
            let (token, points, hit) = match outcome {
                Ok(true) => {
                    let token = template::expand(&rule.action_result, &request.data);
                    (token, rule.calculated_points(), true)
                }
                Ok(false) => (NO_MATCH_TOKEN.to_string(), 0.0, false),
                Err(fault) => {
                    self.telemetry.record(EngineMetric::RuleFaults, 1);
                    self.telemetry.rule_fault(&RuleFaultWarning {
                        rule_name: rule.rule_name.clone(),
                        code: fault.code(),
                        detail: fault.to_string(),
                        available_keys: request.data.keys().cloned().collect(),
                    });
                    (NO_MATCH_TOKEN.to_string(), 0.0, false)
                }
            };
            if hit {
                matched += 1;
                total_points += points;
            }
            if let Some(entries) = entries.as_mut() {
                entries.push(DryRunEntry {
                    rule_name: rule.rule_name.clone(),
                    would_match: hit,
                    points,
                });
            }
            pattern.push_str(&token);
        }

        let action_recommendation = snapshot.actionset.get(&pattern).cloned();
        if snapshot.actionset.is_empty() {
            self.telemetry.note("ACTIONSET_EMPTY", snapshot.ruleset.name.as_str());
        }

        let execution_id = self.next_execution_id();
        let execution_time_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let result = EvaluationResult {
            execution_id: execution_id.clone(),
            total_points,
            pattern_result: pattern,
            action_recommendation,
            rules_executed: prepared.len(),
            rules_matched: matched,
            execution_time_ms,
            registry_version: snapshot.version,
            ab_test_id: routed.as_ref().map(|variant| variant.test_id.clone()),
            ab_test_variant: routed.as_ref().map(|variant| variant.variant),
            dry_run_entries: entries,
        };

        self.telemetry.record(EngineMetric::Evaluations, 1);
        self.telemetry.record(EngineMetric::RulesMatched, matched as u64);

        if !request.dry_run {
            self.append_log(request, &snapshot, routed.as_ref(), &result);
            self.record_usage(request, &prepared);
        }
        Ok(result)
    }

    /// Evaluates a batch of requests; one failed item never aborts the rest.
    #[must_use]
    pub fn evaluate_batch(&self, requests: &[EvaluationRequest]) -> BatchOutcome {
        let mut items = Vec::with_capacity(requests.len());
        let mut succeeded = 0_usize;
        for (index, request) in requests.iter().enumerate() {
            match self.evaluate(request) {
                Ok(result) => {
                    succeeded += 1;
                    items.push(BatchItemOutcome {
                        index,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(err) => items.push(BatchItemOutcome {
                    index,
                    result: None,
                    error: Some(err.to_report()),
                }),
            }
        }
        let total = requests.len();
        BatchOutcome {
            items,
            summary: BatchSummary {
                total,
                succeeded,
                failed: total - succeeded,
            },
        }
    }

    // ------------------------------------------------------------------
    // Variant Routing
    // ------------------------------------------------------------------

    /// Resolves the A/B variant for the request, when routing applies.
    fn resolve_variant(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Option<RoutedVariant>, EngineError> {
        let (Some(test_id), Some(router)) = (&request.ab_test_id, &self.router) else {
            return Ok(None);
        };
        Ok(router.route(test_id, request.assignment_key.as_deref(), &request.data)?)
    }

    /// Substitutes the routed variant's rule snapshot into the prepared list.
    fn substituted_rules(
        &self,
        snapshot: &EvaluationSnapshot,
        routed: Option<&RoutedVariant>,
    ) -> Result<Arc<[PreparedRule]>, EngineError> {
        let Some(routed) = routed else {
            return Ok(Arc::clone(&snapshot.prepared));
        };
        let version = self
            .store
            .rule_version_by_label(&routed.rule_id, &routed.version_label)?;
        let Some(substitute) = version.as_ref().and_then(compiler::compile_version_snapshot)
        else {
            self.telemetry.note("AB_VERSION_UNAVAILABLE", routed.version_label.as_str());
            return Ok(Arc::clone(&snapshot.prepared));
        };
        let mut rules: Vec<PreparedRule> = snapshot.prepared.iter().cloned().collect();
        let mut replaced = false;
        for rule in &mut rules {
            if rule.rule_id == routed.rule_id {
                *rule = substitute.clone();
                replaced = true;
            }
        }
        if !replaced {
            rules.push(substitute);
        }
        rules.sort_by_key(|rule| rule.priority);
        Ok(Arc::from(rules))
    }

    // ------------------------------------------------------------------
    // Side Effects
    // ------------------------------------------------------------------

    /// Appends the execution record through the fire-and-forget sink.
    fn append_log(
        &self,
        request: &EvaluationRequest,
        snapshot: &EvaluationSnapshot,
        routed: Option<&RoutedVariant>,
        result: &EvaluationResult,
    ) {
        let output = serde_json::to_value(result).unwrap_or(Value::Null);
        self.sink.append(ExecutionRecord {
            execution_id: result.execution_id.clone(),
            input_data: Value::Object(request.data.clone()),
            output_data: output,
            ruleset_id: snapshot.ruleset.id,
            total_points: result.total_points,
            pattern_result: result.pattern_result.clone(),
            execution_time_ms: result.execution_time_ms,
            success: true,
            ab_test_id: routed.map(|variant| variant.test_row),
            ab_test_variant: routed.map(|variant| variant.variant),
            consumer_id: request.consumer_id.clone(),
            correlation_id: request.correlation_id.clone(),
            timestamp: self.clock.now(),
        });
    }

    /// Records per-rule usage for the requesting consumer, best-effort.
    fn record_usage(&self, request: &EvaluationRequest, prepared: &Arc<[PreparedRule]>) {
        let Some(consumer_id) = &request.consumer_id else {
            return;
        };
        for rule in prepared.iter() {
            if let Err(err) = self.store.record_rule_usage(consumer_id, &rule.rule_id) {
                self.telemetry.note("USAGE_RECORD_FAILED", &err.to_string());
            }
        }
    }

    /// Returns the next execution identifier.
    fn next_execution_id(&self) -> ExecutionId {
        let seq = self.execution_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let stamp = match self.clock.now() {
            crate::core::Timestamp::UnixMillis(millis) => millis.to_string(),
            crate::core::Timestamp::Logical(value) => value.to_string(),
        };
        ExecutionId::new(format!("exec-{stamp}-{seq}"))
    }
}

/// Names a JSON value's kind for validation messages.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
