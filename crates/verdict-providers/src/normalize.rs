// crates/verdict-providers/src/normalize.rs
// ============================================================================
// Module: Verdict Document Normalization
// Description: Lowers loose JSON config documents into core records.
// Purpose: Accept legacy key aliases and both rule shapes while emitting
//          normalized records.
// Dependencies: serde_json, verdict-core
// ============================================================================

//! ## Overview
//! Config documents predate the store schema and carry legacy aliases:
//! `rulename` for `rule_name`, `rulepoint` for `rule_point`, `result` for
//! `action_result`, and `equation` for a condition's operator. Normalization
//! accepts those aliases, defaults the owning ruleset from the source, and
//! leaves shape resolution (structured vs. flat) to the compiler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use verdict_core::AttributeId;
use verdict_core::ConditionId;
use verdict_core::ConditionOperator;
use verdict_core::ConditionRecord;
use verdict_core::FlatCondition;
use verdict_core::RuleId;
use verdict_core::RuleRecord;
use verdict_core::RuleStatus;
use verdict_core::RulesetId;
use verdict_core::SourceError;

// ============================================================================
// SECTION: Field Access
// ============================================================================

/// Reads the first present key among aliases as a string.
fn string_field(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        object.get(*key).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    })
}

/// Reads the first present key among aliases as an unsigned integer.
fn unsigned_field(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| {
        let value = object.get(*key)?;
        value.as_u64().or_else(|| {
            value.as_f64().and_then(|float| {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "Guarded non-negative and used for small point values."
                )]
                let truncated = if float >= 0.0 { Some(float as u64) } else { None };
                truncated
            })
        })
    })
}

/// Parses an operator from its wire string.
fn operator_field(
    object: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<Option<ConditionOperator>, SourceError> {
    let Some(raw) = string_field(object, keys) else {
        return Ok(None);
    };
    serde_json::from_value::<ConditionOperator>(Value::String(raw.clone()))
        .map(Some)
        .map_err(|_| SourceError::Invalid(format!("unknown operator `{raw}`")))
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Normalizes one loose rule object into a [`RuleRecord`].
///
/// # Errors
///
/// Returns [`SourceError::Invalid`] when the entry is not an object, lacks
/// a name, or carries an unknown operator.
pub fn normalize_rule(value: &Value, ruleset_id: RulesetId) -> Result<RuleRecord, SourceError> {
    let Value::Object(object) = value else {
        return Err(SourceError::Invalid("rule entry must be an object".to_string()));
    };
    let rule_name = string_field(object, &["rule_name", "rulename"])
        .ok_or_else(|| SourceError::Invalid("rule entry lacks a name".to_string()))?;
    let rule_id = string_field(object, &["rule_id", "id"]).unwrap_or_else(|| rule_name.clone());

    let flat = match operator_field(object, &["condition", "operator"])? {
        Some(operator) if object.contains_key("attribute") => Some(FlatCondition {
            attribute: AttributeId::new(
                string_field(object, &["attribute"]).unwrap_or_default(),
            ),
            operator,
            constant: string_field(object, &["constant"]).unwrap_or_default(),
            message: string_field(object, &["message"]),
        }),
        _ => None,
    };
    let conditions = if flat.is_some() { None } else { object.get("conditions").cloned() };

    let rule_point = unsigned_field(object, &["rule_point", "rulepoint"]).unwrap_or(0);
    let weight = object.get("weight").and_then(Value::as_f64).unwrap_or(0.0);
    let priority = object
        .get("priority")
        .and_then(Value::as_i64)
        .and_then(|raw| i32::try_from(raw).ok())
        .unwrap_or(0);
    let status = object
        .get("status")
        .cloned()
        .map_or(Ok(RuleStatus::Active), serde_json::from_value)
        .map_err(|err| SourceError::Invalid(format!("unknown rule status: {err}")))?;

    Ok(RuleRecord {
        row_id: 0,
        rule_id: RuleId::new(rule_id),
        rule_name,
        ruleset_id,
        conditions,
        flat,
        rule_point: u32::try_from(rule_point)
            .map_err(|_| SourceError::Invalid("rule_point out of range".to_string()))?,
        weight,
        priority,
        action_result: string_field(object, &["action_result", "result"]).unwrap_or_default(),
        status,
        version: string_field(object, &["version"]).unwrap_or_else(|| "1.0".to_string()),
        tags: None,
        metadata: object.get("metadata").cloned(),
    })
}

/// Normalizes the `rules_set` list of a document.
///
/// # Errors
///
/// Returns [`SourceError::Invalid`] when the key is missing, not a list, or
/// any entry fails to normalize.
pub fn normalize_rules_set(
    document: &Value,
    ruleset_id: RulesetId,
) -> Result<Vec<RuleRecord>, SourceError> {
    let Some(Value::Array(entries)) = document.get("rules_set") else {
        return Err(SourceError::Invalid(
            "document lacks a `rules_set` list".to_string(),
        ));
    };
    entries.iter().map(|entry| normalize_rule(entry, ruleset_id)).collect()
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

/// Normalizes one loose condition object into a [`ConditionRecord`].
///
/// # Errors
///
/// Returns [`SourceError::Invalid`] when required fields are missing or the
/// operator is unknown.
pub fn normalize_condition(value: &Value) -> Result<ConditionRecord, SourceError> {
    let Value::Object(object) = value else {
        return Err(SourceError::Invalid("condition entry must be an object".to_string()));
    };
    let condition_id = string_field(object, &["condition_id", "id"])
        .ok_or_else(|| SourceError::Invalid("condition entry lacks an id".to_string()))?;
    let operator = operator_field(object, &["operator", "equation", "condition"])?
        .ok_or_else(|| {
            SourceError::Invalid(format!("condition `{condition_id}` lacks an operator"))
        })?;
    Ok(ConditionRecord {
        condition_id: ConditionId::new(condition_id.clone()),
        condition_name: string_field(object, &["condition_name", "name"])
            .unwrap_or(condition_id),
        attribute: AttributeId::new(
            string_field(object, &["attribute"]).ok_or_else(|| {
                SourceError::Invalid("condition entry lacks an attribute".to_string())
            })?,
        ),
        operator,
        constant: string_field(object, &["constant", "value"]).unwrap_or_default(),
    })
}

/// Normalizes the `conditions_set` list of a document.
///
/// # Errors
///
/// Returns [`SourceError::Invalid`] when the key is missing, not a list, or
/// any entry fails to normalize.
pub fn normalize_conditions_set(document: &Value) -> Result<Vec<ConditionRecord>, SourceError> {
    let Some(Value::Array(entries)) = document.get("conditions_set") else {
        return Err(SourceError::Invalid(
            "document lacks a `conditions_set` list".to_string(),
        ));
    };
    entries.iter().map(normalize_condition).collect()
}

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Normalizes the `patterns` map of a document into actionset entries.
///
/// # Errors
///
/// Returns [`SourceError::Invalid`] when the key is missing, not an object,
/// or any recommendation is not a string.
pub fn normalize_patterns(
    document: &Value,
    ruleset_id: RulesetId,
) -> Result<Vec<verdict_core::ActionsetEntry>, SourceError> {
    let Some(Value::Object(entries)) = document.get("patterns") else {
        return Err(SourceError::Invalid(
            "document lacks a `patterns` object".to_string(),
        ));
    };
    entries
        .iter()
        .map(|(pattern_key, recommendation)| {
            let Value::String(action) = recommendation else {
                return Err(SourceError::Invalid(format!(
                    "pattern `{pattern_key}` recommendation must be a string"
                )));
            };
            Ok(verdict_core::ActionsetEntry {
                ruleset_id,
                pattern_key: pattern_key.clone(),
                action_recommendation: action.clone(),
                description: None,
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
