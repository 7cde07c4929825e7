// crates/verdict-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Verdict Predicate Evaluator
// Description: Evaluates compiled predicates against input fact maps.
// Purpose: Convert fact values into boolean outcomes with contained faults.
// Dependencies: crate::core, crate::runtime::compiler, bigdecimal, regex
// ============================================================================

//! ## Overview
//! The evaluator is total over its input space: every fault is a value, not
//! a panic. A missing attribute or a malformed regex surfaces as an
//! [`EvalFault`] the engine converts into a `"-"` token — one broken rule
//! never sinks a batch. Numeric comparisons are decimal-aware and coerce
//! strings that parse as numbers; non-numeric operands on a numeric
//! comparison yield `false`, not an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use bigdecimal::BigDecimal;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::core::BooleanMode;
use crate::core::ConditionOperator;
use crate::core::FactMap;
use crate::runtime::compiler::Comparison;
use crate::runtime::compiler::Operand;
use crate::runtime::compiler::Predicate;

// ============================================================================
// SECTION: Faults
// ============================================================================

/// Contained per-rule evaluation faults.
///
/// # Invariants
/// - Faults never escape the engine; they become `"-"` tokens plus a
///   warning carrying the missing symbol and the keys present.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalFault {
    /// Fact map has no value for the referenced attribute.
    #[error("attribute `{attribute}` not present in fact map (available: {})", available.join(", "))]
    MissingAttribute {
        /// Referenced attribute key.
        attribute: String,
        /// Keys present in the fact map.
        available: Vec<String>,
    },
    /// Regex operand failed to compile at evaluation time.
    #[error("regex `{pattern}` failed to compile: {detail}")]
    InvalidRegex {
        /// Offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        detail: String,
    },
    /// Operand shape does not fit the operator.
    #[error("operand does not fit operator `{operator}`: {detail}")]
    InvalidOperand {
        /// Operator label.
        operator: &'static str,
        /// What was malformed.
        detail: String,
    },
}

impl EvalFault {
    /// Returns the stable fault code used in telemetry warnings.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingAttribute { .. } => "ATTRIBUTE_NOT_FOUND",
            Self::InvalidRegex { .. } => "REGEX_INVALID",
            Self::InvalidOperand { .. } => "OPERAND_INVALID",
        }
    }
}

// ============================================================================
// SECTION: Canonical Forms
// ============================================================================

/// Renders a fact value in its canonical string form.
///
/// Strings render verbatim; numbers, booleans, and null use their JSON
/// literals; arrays and objects use compact JSON.
#[must_use]
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parses a fact value as a decimal when it is a number or a numeric string.
fn decimal_of(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(number) => BigDecimal::from_str(&number.to_string()).ok(),
        Value::String(text) => BigDecimal::from_str(text.trim()).ok(),
        _ => None,
    }
}

/// Parses a scalar operand string as a decimal.
fn decimal_of_text(text: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(text.trim()).ok()
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates a compiled predicate against a fact map.
///
/// # Errors
///
/// Returns [`EvalFault`] when an attribute is missing or an operand cannot
/// be applied; the caller recovers the fault as a non-match.
pub fn evaluate_predicate(predicate: &Predicate, facts: &FactMap) -> Result<bool, EvalFault> {
    match predicate.mode {
        BooleanMode::And => {
            for clause in &predicate.clauses {
                if !evaluate_comparison(clause, facts)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        BooleanMode::Or => {
            for clause in &predicate.clauses {
                if evaluate_comparison(clause, facts)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Evaluates a single comparison against a fact map.
///
/// # Errors
///
/// Returns [`EvalFault`] when the attribute is missing or the operand cannot
/// be applied.
pub fn evaluate_comparison(comparison: &Comparison, facts: &FactMap) -> Result<bool, EvalFault> {
    let Some(fact) = facts.get(comparison.attribute.as_str()) else {
        return Err(EvalFault::MissingAttribute {
            attribute: comparison.attribute.as_str().to_string(),
            available: facts.keys().cloned().collect(),
        });
    };
    match comparison.operator {
        ConditionOperator::Equal => Ok(equal_text(fact, &comparison.operand)),
        ConditionOperator::NotEqual => Ok(!equal_text(fact, &comparison.operand)),
        ConditionOperator::GreaterThan
        | ConditionOperator::GreaterThanOrEqual
        | ConditionOperator::LessThan
        | ConditionOperator::LessThanOrEqual => {
            Ok(numeric_ordering(comparison.operator, fact, &comparison.operand))
        }
        ConditionOperator::In => membership(fact, &comparison.operand),
        ConditionOperator::NotIn => Ok(!membership(fact, &comparison.operand)?),
        ConditionOperator::Range => range_check(fact, &comparison.operand),
        ConditionOperator::Contains => Ok(contains_check(fact, &comparison.operand)),
        ConditionOperator::Regex => regex_check(fact, &comparison.operand),
    }
}

/// Compares canonicalized string forms for equality.
fn equal_text(fact: &Value, operand: &Operand) -> bool {
    match operand {
        Operand::Scalar(text) => canonical_text(fact) == *text,
        Operand::List(_) => false,
    }
}

/// Applies a numeric ordering operator with string coercion.
///
/// Non-numeric operands yield `false` by contract, never a fault.
fn numeric_ordering(operator: ConditionOperator, fact: &Value, operand: &Operand) -> bool {
    let Operand::Scalar(text) = operand else {
        return false;
    };
    let (Some(left), Some(right)) = (decimal_of(fact), decimal_of_text(text)) else {
        return false;
    };
    match operator {
        ConditionOperator::GreaterThan => left > right,
        ConditionOperator::GreaterThanOrEqual => left >= right,
        ConditionOperator::LessThan => left < right,
        ConditionOperator::LessThanOrEqual => left <= right,
        _ => false,
    }
}

/// Checks membership of the fact value in the list-typed operand.
fn membership(fact: &Value, operand: &Operand) -> Result<bool, EvalFault> {
    let Operand::List(entries) = operand else {
        return Err(EvalFault::InvalidOperand {
            operator: "in",
            detail: "membership requires a list operand".to_string(),
        });
    };
    let needle = canonical_text(fact);
    Ok(entries.iter().any(|entry| canonical_text(entry) == needle))
}

/// Checks the inclusive two-endpoint range operand.
fn range_check(fact: &Value, operand: &Operand) -> Result<bool, EvalFault> {
    let Operand::List(entries) = operand else {
        return Err(EvalFault::InvalidOperand {
            operator: "range",
            detail: "range requires a two-element list operand".to_string(),
        });
    };
    let [low, high] = entries.as_slice() else {
        return Err(EvalFault::InvalidOperand {
            operator: "range",
            detail: format!("range operand has {} endpoints, expected 2", entries.len()),
        });
    };
    let (Some(value), Some(low), Some(high)) =
        (decimal_of(fact), decimal_of(low), decimal_of(high))
    else {
        return Ok(false);
    };
    Ok(value >= low && value <= high)
}

/// Substring check for strings, element-of check for lists.
fn contains_check(fact: &Value, operand: &Operand) -> bool {
    let Operand::Scalar(needle) = operand else {
        return false;
    };
    match fact {
        Value::String(haystack) => haystack.contains(needle.as_str()),
        Value::Array(entries) => entries.iter().any(|entry| canonical_text(entry) == *needle),
        _ => false,
    }
}

/// Compiles and applies the regex operand.
fn regex_check(fact: &Value, operand: &Operand) -> Result<bool, EvalFault> {
    let Operand::Scalar(pattern) = operand else {
        return Err(EvalFault::InvalidOperand {
            operator: "regex",
            detail: "regex requires a scalar pattern operand".to_string(),
        });
    };
    let regex = Regex::new(pattern).map_err(|err| EvalFault::InvalidRegex {
        pattern: pattern.clone(),
        detail: err.to_string(),
    })?;
    Ok(regex.is_match(&canonical_text(fact)))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
