// crates/verdict-core/src/runtime/compiler.rs
// ============================================================================
// Module: Verdict Rule Compiler
// Description: Lowers declarative rule records into executable predicates.
// Purpose: Resolve condition references and produce priority-sorted prepared
//          rules for the evaluation path.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! The compiler is pure: rules and the condition snapshot are injected, and
//! compiling identical inputs yields identical prepared rules regardless of
//! input order (ordering is re-established by ascending priority). Every
//! failure is fatal to the compilation of the offending rule and carries the
//! rule name plus the unresolvable fragment; nothing is silently skipped.
//!
//! Two input shapes are accepted: *structured* records referencing reusable
//! conditions, and *flat* records carrying an inline
//! `(attribute, operator, constant)` triple. Flat records are rewritten to
//! the structured form by locating the existing condition with the exact
//! matching triple.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::AttributeId;
use crate::core::BooleanMode;
use crate::core::ConditionId;
use crate::core::ConditionOperator;
use crate::core::ConditionRecord;
use crate::core::ConditionRefs;
use crate::core::ErrorReport;
use crate::core::HashDigest;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::hashing;
use crate::core::hashing::HashError;

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Comparison operand, parsed once at compile time.
///
/// # Invariants
/// - List operators always carry `List`; scalar operators always carry
///   `Scalar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Scalar constant in its stored string form.
    Scalar(String),
    /// Parsed JSON list for `in` / `not_in` / `range`.
    List(Vec<Value>),
}

/// One atomic comparison lowered from a condition.
///
/// # Invariants
/// - `operand` shape matches the operator's arity (see [`Operand`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Fact-record key the comparison reads.
    pub attribute: AttributeId,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Comparison operand.
    pub operand: Operand,
}

/// Compiled predicate: one or more comparisons under a single boolean mode.
///
/// # Invariants
/// - `clauses` is non-empty.
/// - Simple rules compile to one clause with [`BooleanMode::And`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Comparisons in declaration order.
    pub clauses: Vec<Comparison>,
    /// Boolean combinator applied between clauses.
    pub mode: BooleanMode,
}

/// Compiled, priority-sortable rule ready for evaluation.
///
/// # Invariants
/// - Prepared lists are sorted ascending by `priority`; ties keep input
///   order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRule {
    /// Evaluation order; lower runs earlier.
    pub priority: i32,
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Rule name used in errors and telemetry.
    pub rule_name: String,
    /// Compiled predicate.
    pub predicate: Predicate,
    /// Points awarded on match, before weighting.
    pub rule_point: u32,
    /// Action token or template emitted on match.
    pub action_result: String,
    /// Weight multiplier applied to `rule_point`.
    pub weight: f64,
}

impl PreparedRule {
    /// Returns the points contributed on match: `rule_point × weight`.
    #[must_use]
    pub fn calculated_points(&self) -> f64 {
        f64::from(self.rule_point) * self.weight
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Unresolvable condition reference embedded in compile errors.
///
/// # Invariants
/// - `Triple` carries the exact flat-rule fragment that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionReference {
    /// Structured reference by condition identifier.
    Id(ConditionId),
    /// Flat-rule inline triple.
    Triple {
        /// Fact-record key.
        attribute: String,
        /// Comparison operator label.
        operator: String,
        /// Comparison constant.
        constant: String,
    },
}

impl fmt::Display for ConditionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "condition `{id}`"),
            Self::Triple {
                attribute,
                operator,
                constant,
            } => {
                write!(f, "attribute=`{attribute}`, operator=`{operator}`, constant=`{constant}`")
            }
        }
    }
}

/// Rule compilation errors.
///
/// # Invariants
/// - Every variant names the offending rule; codes are stable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// Rule record carries a blank identifier or name.
    #[error("rule cannot be empty (rule `{rule_name}`)")]
    Empty {
        /// Offending rule name (may itself be blank).
        rule_name: String,
    },
    /// Rule carries both the structured and the flat shape at once.
    #[error("rule `{rule_name}` mixes structured and flat condition shapes")]
    AmbiguousShape {
        /// Offending rule name.
        rule_name: String,
    },
    /// Condition references are not an object or carry a malformed operand.
    #[error("rule `{rule_name}` has invalid conditions: {detail}")]
    InvalidConditions {
        /// Offending rule name.
        rule_name: String,
        /// What was malformed.
        detail: String,
    },
    /// Simple rule without a `conditions.item` reference.
    #[error("rule `{rule_name}` must reference `conditions.item`")]
    MissingConditionItem {
        /// Offending rule name.
        rule_name: String,
    },
    /// Complex rule without a `conditions.items` list.
    #[error("rule `{rule_name}` must reference `conditions.items`")]
    MissingConditionsItems {
        /// Offending rule name.
        rule_name: String,
    },
    /// Complex rule with an empty `conditions.items` list.
    #[error("rule `{rule_name}` must reference at least one condition item")]
    EmptyConditions {
        /// Offending rule name.
        rule_name: String,
    },
    /// Complex rule without a `conditions.mode` combinator.
    #[error("rule `{rule_name}` must declare `conditions.mode`")]
    MissingMode {
        /// Offending rule name.
        rule_name: String,
    },
    /// Referenced condition does not exist in the injected snapshot.
    #[error("no matching condition for {reference} (rule `{rule_name}`)")]
    ConditionNotFound {
        /// Offending rule name.
        rule_name: String,
        /// Unresolvable reference.
        reference: ConditionReference,
    },
    /// Flat rule with a blank attribute or constant.
    #[error("rule `{rule_name}` carries an empty inline condition")]
    EmptyFlatCondition {
        /// Offending rule name.
        rule_name: String,
    },
}

impl CompileError {
    /// Returns the offending rule name.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        match self {
            Self::Empty { rule_name }
            | Self::AmbiguousShape { rule_name }
            | Self::InvalidConditions { rule_name, .. }
            | Self::MissingConditionItem { rule_name }
            | Self::MissingConditionsItems { rule_name }
            | Self::EmptyConditions { rule_name }
            | Self::MissingMode { rule_name }
            | Self::ConditionNotFound { rule_name, .. }
            | Self::EmptyFlatCondition { rule_name } => rule_name,
        }
    }
}

impl Reportable for CompileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty { .. } => "RULE_EMPTY",
            Self::AmbiguousShape { .. } => "RULE_INVALID_TYPE",
            Self::InvalidConditions { .. } => "RULE_INVALID_CONDITIONS",
            Self::MissingConditionItem { .. } => "RULE_MISSING_CONDITION_ITEM",
            Self::MissingConditionsItems { .. } => "RULE_MISSING_CONDITIONS_ITEMS",
            Self::EmptyConditions { .. } => "RULE_EMPTY_CONDITIONS",
            Self::MissingMode { .. } => "RULE_MISSING_MODE",
            Self::ConditionNotFound { .. } => "CONDITION_NOT_FOUND",
            Self::EmptyFlatCondition { .. } => "CONDITION_EMPTY",
        }
    }

    fn to_report(&self) -> ErrorReport {
        let report = ErrorReport::new("compilation", self.to_string(), self.error_code())
            .with_context("rule_name", Value::String(self.rule_name().to_string()));
        match self {
            Self::ConditionNotFound { reference, .. } => {
                report.with_context("reference", reference_context(reference))
            }
            _ => report,
        }
    }
}

/// Renders the unresolvable reference as a context value.
fn reference_context(reference: &ConditionReference) -> Value {
    match reference {
        ConditionReference::Id(id) => Value::String(id.as_str().to_string()),
        ConditionReference::Triple {
            attribute,
            operator,
            constant,
        } => serde_json::json!({
            "attribute": attribute,
            "operator": operator,
            "constant": constant,
        }),
    }
}

// ============================================================================
// SECTION: Shape Resolution
// ============================================================================

/// Normalizes a rule's condition references into [`ConditionRefs`].
///
/// Flat rules are resolved against the injected condition snapshot and
/// rewritten to a simple structured reference.
///
/// # Errors
///
/// Returns [`CompileError`] when the rule is blank, carries both shapes,
/// carries a malformed structured shape, or references a condition that does
/// not exist.
pub fn resolve_shape(
    rule: &RuleRecord,
    conditions: &[ConditionRecord],
) -> Result<ConditionRefs, CompileError> {
    let rule_name = rule.rule_name.clone();
    if rule.rule_id.is_blank() || rule_name.trim().is_empty() {
        return Err(CompileError::Empty { rule_name });
    }
    match (&rule.conditions, &rule.flat) {
        (Some(_), Some(_)) => Err(CompileError::AmbiguousShape { rule_name }),
        (Some(raw), None) => structured_refs(&rule_name, raw),
        (None, Some(flat)) => {
            if flat.attribute.is_blank() || flat.constant.trim().is_empty() {
                return Err(CompileError::EmptyFlatCondition { rule_name });
            }
            let found = conditions.iter().find(|cond| {
                cond.attribute == flat.attribute
                    && cond.operator == flat.operator
                    && cond.constant == flat.constant
            });
            match found {
                Some(cond) => Ok(ConditionRefs::Simple {
                    item: cond.condition_id.clone(),
                }),
                None => Err(CompileError::ConditionNotFound {
                    rule_name,
                    reference: ConditionReference::Triple {
                        attribute: flat.attribute.as_str().to_string(),
                        operator: flat.operator.as_str().to_string(),
                        constant: flat.constant.clone(),
                    },
                }),
            }
        }
        (None, None) => Err(CompileError::MissingConditionItem { rule_name }),
    }
}

/// Normalizes a raw structured `conditions` JSON object.
fn structured_refs(rule_name: &str, raw: &Value) -> Result<ConditionRefs, CompileError> {
    let Value::Object(object) = raw else {
        return Err(CompileError::InvalidConditions {
            rule_name: rule_name.to_string(),
            detail: "conditions must be an object".to_string(),
        });
    };
    if let Some(item) = object.get("item") {
        let Value::String(id) = item else {
            return Err(CompileError::InvalidConditions {
                rule_name: rule_name.to_string(),
                detail: "conditions.item must be a string".to_string(),
            });
        };
        return Ok(ConditionRefs::Simple {
            item: ConditionId::new(id.clone()),
        });
    }
    if let Some(items) = object.get("items") {
        let Value::Array(entries) = items else {
            return Err(CompileError::InvalidConditions {
                rule_name: rule_name.to_string(),
                detail: "conditions.items must be a list".to_string(),
            });
        };
        if entries.is_empty() {
            return Err(CompileError::EmptyConditions {
                rule_name: rule_name.to_string(),
            });
        }
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::String(id) = entry else {
                return Err(CompileError::InvalidConditions {
                    rule_name: rule_name.to_string(),
                    detail: "conditions.items entries must be strings".to_string(),
                });
            };
            ids.push(ConditionId::new(id.clone()));
        }
        let Some(mode) = object.get("mode") else {
            return Err(CompileError::MissingMode {
                rule_name: rule_name.to_string(),
            });
        };
        let mode: BooleanMode = serde_json::from_value(mode.clone()).map_err(|_| {
            CompileError::InvalidConditions {
                rule_name: rule_name.to_string(),
                detail: "conditions.mode must be `and` or `or`".to_string(),
            }
        })?;
        return Ok(ConditionRefs::Complex { items: ids, mode });
    }
    if object.contains_key("mode") {
        return Err(CompileError::MissingConditionsItems {
            rule_name: rule_name.to_string(),
        });
    }
    Err(CompileError::MissingConditionItem {
        rule_name: rule_name.to_string(),
    })
}

// ============================================================================
// SECTION: Lowering
// ============================================================================

/// Lowers one condition record into an executable comparison.
fn lower_condition(
    rule_name: &str,
    condition: &ConditionRecord,
) -> Result<Comparison, CompileError> {
    let operand = if condition.operator.takes_list_operand() {
        let parsed: Value = serde_json::from_str(&condition.constant).map_err(|err| {
            CompileError::InvalidConditions {
                rule_name: rule_name.to_string(),
                detail: format!(
                    "condition `{}` operand is not a JSON list: {err}",
                    condition.condition_id
                ),
            }
        })?;
        let Value::Array(entries) = parsed else {
            return Err(CompileError::InvalidConditions {
                rule_name: rule_name.to_string(),
                detail: format!(
                    "condition `{}` operand must be a JSON list for operator `{}`",
                    condition.condition_id,
                    condition.operator.as_str()
                ),
            });
        };
        if condition.operator == ConditionOperator::Range && entries.len() != 2 {
            return Err(CompileError::InvalidConditions {
                rule_name: rule_name.to_string(),
                detail: format!(
                    "condition `{}` range operand must have exactly two endpoints",
                    condition.condition_id
                ),
            });
        }
        Operand::List(entries)
    } else {
        Operand::Scalar(condition.constant.clone())
    };
    Ok(Comparison {
        attribute: condition.attribute.clone(),
        operator: condition.operator,
        operand,
    })
}

/// Looks up one condition by identifier within the injected snapshot.
fn find_condition<'a>(
    rule_name: &str,
    conditions: &'a [ConditionRecord],
    id: &ConditionId,
) -> Result<&'a ConditionRecord, CompileError> {
    conditions.iter().find(|cond| cond.condition_id == *id).ok_or_else(|| {
        CompileError::ConditionNotFound {
            rule_name: rule_name.to_string(),
            reference: ConditionReference::Id(id.clone()),
        }
    })
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Compiles one rule record against the injected condition snapshot.
///
/// # Errors
///
/// Returns [`CompileError`] when the rule shape is invalid or a condition
/// reference cannot be resolved.
pub fn compile_rule(
    rule: &RuleRecord,
    conditions: &[ConditionRecord],
) -> Result<PreparedRule, CompileError> {
    let refs = resolve_shape(rule, conditions)?;
    let rule_name = rule.rule_name.as_str();
    let predicate = match refs {
        ConditionRefs::Simple { item } => {
            let condition = find_condition(rule_name, conditions, &item)?;
            Predicate {
                clauses: vec![lower_condition(rule_name, condition)?],
                mode: BooleanMode::And,
            }
        }
        ConditionRefs::Complex { items, mode } => {
            let mut clauses = Vec::with_capacity(items.len());
            for item in &items {
                let condition = find_condition(rule_name, conditions, item)?;
                clauses.push(lower_condition(rule_name, condition)?);
            }
            Predicate { clauses, mode }
        }
    };
    Ok(PreparedRule {
        priority: rule.priority,
        rule_id: rule.rule_id.clone(),
        rule_name: rule.rule_name.clone(),
        predicate,
        rule_point: rule.rule_point,
        action_result: rule.action_result.clone(),
        weight: rule.weight,
    })
}

/// Compiles a batch of rules and returns them sorted ascending by priority.
///
/// Ties keep the input order, which equals the store's natural order
/// (ascending priority then rule identifier).
///
/// # Errors
///
/// Returns the first [`CompileError`] encountered; batch validation surfaces
/// that aggregate every failure live on the reload path.
pub fn compile_rules(
    rules: &[RuleRecord],
    conditions: &[ConditionRecord],
) -> Result<Vec<PreparedRule>, CompileError> {
    let mut prepared = Vec::with_capacity(rules.len());
    for rule in rules {
        prepared.push(compile_rule(rule, conditions)?);
    }
    prepared.sort_by_key(|rule| rule.priority);
    Ok(prepared)
}

/// Compiles a prepared rule from a version snapshot's inline triple.
///
/// Used on the A/B routing path to substitute the rule state a variant's
/// version captured. Returns `None` when the snapshot carries no inline
/// condition.
#[must_use]
pub fn compile_version_snapshot(version: &crate::core::RuleVersionRecord) -> Option<PreparedRule> {
    let attribute = version.attribute.as_deref()?;
    let operator = version.condition?;
    let constant = version.constant.as_deref()?;
    let operand = match serde_json::from_str::<Value>(constant) {
        Ok(Value::Array(entries)) if operator.takes_list_operand() => Operand::List(entries),
        _ => Operand::Scalar(constant.to_string()),
    };
    Some(PreparedRule {
        priority: version.priority,
        rule_id: version.rule_id.clone(),
        rule_name: version.rule_name.clone(),
        predicate: Predicate {
            clauses: vec![Comparison {
                attribute: AttributeId::new(attribute),
                operator,
                operand,
            }],
            mode: BooleanMode::And,
        },
        rule_point: version.rule_point,
        action_result: version.action_result.clone(),
        weight: version.weight,
    })
}

/// Fingerprints a rule batch by the canonical JSON of its records.
///
/// Compilation of a given `(rules, conditions)` pair is deterministic, so
/// the fingerprint is a sound cache key alongside a dependency on the
/// condition source.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn rules_fingerprint(rules: &[RuleRecord]) -> Result<HashDigest, HashError> {
    let mut sorted: BTreeMap<&str, &RuleRecord> = BTreeMap::new();
    for rule in rules {
        sorted.insert(rule.rule_id.as_str(), rule);
    }
    let ordered: Vec<&RuleRecord> = sorted.into_values().collect();
    hashing::hash_canonical(&ordered)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
