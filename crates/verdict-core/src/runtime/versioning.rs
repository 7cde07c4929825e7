// crates/verdict-core/src/runtime/versioning.rs
// ============================================================================
// Module: Verdict Version Control
// Description: Rule version history, diff, and rollback.
// Purpose: Drive immutable version snapshots through the store's
//          transactional seam.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every rule mutation produces an immutable version snapshot in the same
//! store transaction. Rollback restores a target version by writing the rule
//! with the target's fields and recording the restoration as a *new* current
//! snapshot (reason-prefixed `Pre-rollback backup:`), so the history stays
//! strictly append-only and the restored state diffs clean against the
//! target on the fixed attribute set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::ErrorReport;
use crate::core::FlatCondition;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::RuleVersionRecord;
use crate::core::identifiers::AttributeId;
use crate::interfaces::ChangeAudit;
use crate::interfaces::Clock;
use crate::interfaces::RollbackPlan;
use crate::interfaces::RuleStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed attribute set compared by [`VersionControl::compare_versions`].
pub const COMPARED_FIELDS: [&str; 10] = [
    "rule_name",
    "attribute",
    "condition",
    "constant",
    "message",
    "weight",
    "rule_point",
    "priority",
    "action_result",
    "status",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Version control errors.
///
/// # Invariants
/// - Codes are stable; missing rows name the rule and version.
#[derive(Debug, Error)]
pub enum VersionError {
    /// Rule identifier is blank.
    #[error("rule id cannot be empty")]
    EmptyRuleId,
    /// Version number is zero.
    #[error("version number must be positive")]
    InvalidVersion,
    /// Requested version snapshot does not exist.
    #[error("version {version_number} not found for rule `{rule_id}`")]
    VersionNotFound {
        /// Rule identifier.
        rule_id: RuleId,
        /// Missing version number.
        version_number: u32,
    },
    /// Live rule row does not exist.
    #[error("rule `{rule_id}` not found")]
    RuleNotFound {
        /// Missing rule identifier.
        rule_id: RuleId,
    },
    /// Store operation failed.
    #[error("version store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl Reportable for VersionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyRuleId => "RULE_ID_EMPTY",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            Self::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Self::Store(_) => "ROLLBACK_ERROR",
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
// SECTION: Diff
// ============================================================================

/// One changed field in a version comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Value in the first version.
    pub version_a: Value,
    /// Value in the second version.
    pub version_b: Value,
}

/// Field-by-field comparison of two version snapshots.
///
/// # Invariants
/// - `differences` covers only the fixed attribute set in
///   [`COMPARED_FIELDS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionDiff {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// First compared version number.
    pub version_a: u32,
    /// Second compared version number.
    pub version_b: u32,
    /// Changed fields keyed by attribute name.
    pub differences: BTreeMap<String, FieldChange>,
    /// Whether any compared field differs.
    pub has_differences: bool,
}

/// Projects a version snapshot onto the fixed compared attribute set.
fn compared_projection(version: &RuleVersionRecord) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("rule_name", json!(version.rule_name));
    fields.insert("attribute", json!(version.attribute));
    fields.insert("condition", json!(version.condition));
    fields.insert("constant", json!(version.constant));
    fields.insert("message", json!(version.message));
    fields.insert("weight", json!(version.weight));
    fields.insert("rule_point", json!(version.rule_point));
    fields.insert("priority", json!(version.priority));
    fields.insert("action_result", json!(version.action_result));
    fields.insert("status", json!(version.status));
    fields
}

// ============================================================================
// SECTION: Version Control
// ============================================================================

/// Version history, diff, and rollback over the store's transactional seam.
pub struct VersionControl {
    /// Authoritative store.
    store: Arc<dyn RuleStore>,
    /// Wall-clock seam.
    clock: Arc<dyn Clock>,
}

impl VersionControl {
    /// Creates a version-control service over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn RuleStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
        }
    }

    /// Lists version snapshots newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] when the identifier is blank or the store
    /// query fails.
    pub fn version_history(
        &self,
        rule_id: &RuleId,
        limit: Option<usize>,
    ) -> Result<Vec<RuleVersionRecord>, VersionError> {
        if rule_id.is_blank() {
            return Err(VersionError::EmptyRuleId);
        }
        Ok(self.store.rule_versions(rule_id, limit)?)
    }

    /// Loads one version snapshot by number.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] when inputs are invalid or the store query
    /// fails.
    pub fn get_version(
        &self,
        rule_id: &RuleId,
        version_number: u32,
    ) -> Result<Option<RuleVersionRecord>, VersionError> {
        if rule_id.is_blank() {
            return Err(VersionError::EmptyRuleId);
        }
        if version_number == 0 {
            return Err(VersionError::InvalidVersion);
        }
        Ok(self.store.rule_version(rule_id, version_number)?)
    }

    /// Loads the snapshot currently marked `is_current`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] when the identifier is blank or the store
    /// query fails.
    pub fn get_current_version(
        &self,
        rule_id: &RuleId,
    ) -> Result<Option<RuleVersionRecord>, VersionError> {
        if rule_id.is_blank() {
            return Err(VersionError::EmptyRuleId);
        }
        Ok(self.store.current_rule_version(rule_id)?)
    }

    /// Rolls a rule back to a target version.
    ///
    /// Loads the target snapshot and the live rule, copies the target's
    /// mutable fields onto the rule, and applies the result through the
    /// store in one transaction. The restoration itself becomes the new
    /// current snapshot with a `Pre-rollback backup:` reason, keeping the
    /// history append-only.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::VersionNotFound`] or
    /// [`VersionError::RuleNotFound`] when the inputs do not resolve, and
    /// [`VersionError::Store`] when the transaction fails.
    pub fn rollback(
        &self,
        rule_id: &RuleId,
        version_number: u32,
        change_reason: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<RuleRecord, VersionError> {
        if rule_id.is_blank() {
            return Err(VersionError::EmptyRuleId);
        }
        if version_number == 0 {
            return Err(VersionError::InvalidVersion);
        }
        let target = self.store.rule_version(rule_id, version_number)?.ok_or_else(|| {
            VersionError::VersionNotFound {
                rule_id: rule_id.clone(),
                version_number,
            }
        })?;
        let current = self.store.get_rule(rule_id)?.ok_or_else(|| VersionError::RuleNotFound {
            rule_id: rule_id.clone(),
        })?;
        let restored = restore_onto(&current, &target);
        let now = self.clock.now();
        let reason = format!(
            "Pre-rollback backup: {}",
            change_reason.unwrap_or("No reason provided")
        );
        let backup = snapshot_of(&restored, &target, &reason, created_by, now);
        let plan = RollbackPlan {
            rule_id: rule_id.clone(),
            target_version: version_number,
            backup,
            restored,
        };
        match self.store.apply_rollback(&plan) {
            Ok(record) => Ok(record),
            Err(StoreError::Missing(_)) => Err(VersionError::VersionNotFound {
                rule_id: rule_id.clone(),
                version_number,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Compares two version snapshots over the fixed attribute set.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] when inputs are invalid, either version is
    /// missing, or the store query fails.
    pub fn compare_versions(
        &self,
        rule_id: &RuleId,
        version_a: u32,
        version_b: u32,
    ) -> Result<VersionDiff, VersionError> {
        if rule_id.is_blank() {
            return Err(VersionError::EmptyRuleId);
        }
        if version_a == 0 || version_b == 0 {
            return Err(VersionError::InvalidVersion);
        }
        let first = self.store.rule_version(rule_id, version_a)?.ok_or_else(|| {
            VersionError::VersionNotFound {
                rule_id: rule_id.clone(),
                version_number: version_a,
            }
        })?;
        let second = self.store.rule_version(rule_id, version_b)?.ok_or_else(|| {
            VersionError::VersionNotFound {
                rule_id: rule_id.clone(),
                version_number: version_b,
            }
        })?;
        let left = compared_projection(&first);
        let right = compared_projection(&second);
        let mut differences = BTreeMap::new();
        for field in COMPARED_FIELDS {
            let value_a = left.get(field).cloned().unwrap_or(Value::Null);
            let value_b = right.get(field).cloned().unwrap_or(Value::Null);
            if value_a != value_b {
                differences.insert(
                    field.to_string(),
                    FieldChange {
                        version_a: value_a,
                        version_b: value_b,
                    },
                );
            }
        }
        let has_differences = !differences.is_empty();
        Ok(VersionDiff {
            rule_id: rule_id.clone(),
            version_a,
            version_b,
            differences,
            has_differences,
        })
    }
}

// ============================================================================
// SECTION: Restoration Helpers
// ============================================================================

/// Copies the target version's mutable fields onto the live rule.
fn restore_onto(current: &RuleRecord, target: &RuleVersionRecord) -> RuleRecord {
    let flat = target.attribute.as_ref().and_then(|attribute| {
        target.condition.map(|operator| FlatCondition {
            attribute: AttributeId::new(attribute.clone()),
            operator,
            constant: target.constant.clone().unwrap_or_default(),
            message: target.message.clone(),
        })
    });
    RuleRecord {
        row_id: current.row_id,
        rule_id: current.rule_id.clone(),
        rule_name: target.rule_name.clone(),
        ruleset_id: current.ruleset_id,
        conditions: if flat.is_some() { None } else { current.conditions.clone() },
        flat,
        rule_point: target.rule_point,
        weight: target.weight,
        priority: target.priority,
        action_result: target.action_result.clone(),
        status: target.status,
        version: current.version.clone(),
        tags: current.tags.clone(),
        metadata: current.metadata.clone(),
    }
}

/// Snapshots the restored rule state as the post-rollback version record.
fn snapshot_of(
    restored: &RuleRecord,
    target: &RuleVersionRecord,
    reason: &str,
    created_by: Option<&str>,
    at: crate::core::Timestamp,
) -> RuleVersionRecord {
    RuleVersionRecord {
        rule_id: restored.rule_id.clone(),
        // The store assigns the real number (max + 1) inside the transaction.
        version_number: 0,
        rule_name: restored.rule_name.clone(),
        attribute: restored.flat.as_ref().map(|flat| flat.attribute.as_str().to_string()),
        condition: restored.flat.as_ref().map(|flat| flat.operator),
        constant: restored.flat.as_ref().map(|flat| flat.constant.clone()),
        message: restored.flat.as_ref().and_then(|flat| flat.message.clone()),
        weight: restored.weight,
        rule_point: restored.rule_point,
        priority: restored.priority,
        action_result: restored.action_result.clone(),
        status: restored.status,
        version: target.version.clone(),
        ruleset_id: restored.ruleset_id,
        is_current: true,
        change_reason: Some(reason.to_string()),
        created_by: created_by.map(str::to_string),
        created_at: at,
    }
}

// ============================================================================
// SECTION: Mutation Helpers
// ============================================================================

/// Writes a rule through the versioned store seam.
///
/// A convenience wrapper so management surfaces mutate rules only through
/// the versioning path.
///
/// # Errors
///
/// Returns [`StoreError`] when the transaction fails.
pub fn write_rule_versioned(
    store: &Arc<dyn RuleStore>,
    clock: &Arc<dyn Clock>,
    record: &RuleRecord,
    change_reason: Option<&str>,
    created_by: Option<&str>,
) -> Result<RuleVersionRecord, StoreError> {
    let audit = ChangeAudit {
        change_reason: change_reason.map(str::to_string),
        created_by: created_by.map(str::to_string),
        at: clock.now(),
    };
    store.upsert_rule(record, &audit)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
