// crates/verdict-core/src/runtime/validator.rs
// ============================================================================
// Module: Verdict Rule Validator
// Description: Read-only validation of candidate rule sets.
// Purpose: Report per-rule compile outcomes without mutating any state.
// Dependencies: crate::core, crate::interfaces, crate::runtime::compiler
// ============================================================================

//! ## Overview
//! Validation runs every candidate through the compiler and aggregates the
//! outcomes — never stopping at the first failure, so a report names every
//! invalid rule with its error. The report carries the source label
//! (`database`, `file`, `inline`) for observability.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::ConditionRecord;
use crate::core::ErrorReport;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::interfaces::SourceKind;
use crate::runtime::compiler;

// ============================================================================
// SECTION: Report Types
// ============================================================================

/// Validation outcome for one rule.
///
/// # Invariants
/// - `errors` is empty exactly when `is_valid` is true.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleValidation {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Rule name.
    pub rule_name: String,
    /// Whether the rule compiled cleanly.
    pub is_valid: bool,
    /// Compile errors, when any.
    pub errors: Vec<ErrorReport>,
}

/// Aggregate tallies over one validation run.
///
/// # Invariants
/// - `total_rules == valid_rules + invalid_rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Rules examined.
    pub total_rules: usize,
    /// Rules that compiled cleanly.
    pub valid_rules: usize,
    /// Rules that failed compilation.
    pub invalid_rules: usize,
    /// Total errors across invalid rules.
    pub total_errors: usize,
}

/// Full validation report.
///
/// # Invariants
/// - `is_valid` is true exactly when `summary.invalid_rules == 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Whether every rule compiled cleanly.
    pub is_valid: bool,
    /// Per-rule outcomes in input order.
    pub rules: Vec<RuleValidation>,
    /// Aggregate tallies.
    pub summary: ValidationSummary,
    /// Source label for observability.
    pub source_type: SourceKind,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a candidate rule set against a condition snapshot.
#[must_use]
pub fn validate_rules(
    rules: &[RuleRecord],
    conditions: &[ConditionRecord],
    source_type: SourceKind,
) -> ValidationReport {
    let mut outcomes = Vec::with_capacity(rules.len());
    let mut invalid = 0_usize;
    let mut total_errors = 0_usize;
    for rule in rules {
        match compiler::compile_rule(rule, conditions) {
            Ok(_) => outcomes.push(RuleValidation {
                rule_id: rule.rule_id.clone(),
                rule_name: rule.rule_name.clone(),
                is_valid: true,
                errors: Vec::new(),
            }),
            Err(err) => {
                invalid += 1;
                total_errors += 1;
                outcomes.push(RuleValidation {
                    rule_id: rule.rule_id.clone(),
                    rule_name: rule.rule_name.clone(),
                    is_valid: false,
                    errors: vec![err.to_report()],
                });
            }
        }
    }
    let total = rules.len();
    ValidationReport {
        is_valid: invalid == 0,
        rules: outcomes,
        summary: ValidationSummary {
            total_rules: total,
            valid_rules: total - invalid,
            invalid_rules: invalid,
            total_errors,
        },
        source_type,
    }
}
