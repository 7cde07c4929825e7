// crates/verdict-core/src/runtime/memstore.rs
// ============================================================================
// Module: Verdict In-Memory Rule Store
// Description: Reference RuleStore implementation over process memory.
// Purpose: Back tests, examples, and embedded deployments without a
//          database.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A complete, mutex-guarded [`RuleStore`] over process memory. Compound
//! operations hold the single state lock for their whole span, giving the
//! same atomicity the contract demands from durable implementations.
//! Row identifiers are assigned from a monotonic sequence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

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
use crate::core::RuleStatus;
use crate::core::RuleVersionRecord;
use crate::core::RulesetId;
use crate::core::RulesetRecord;
use crate::core::TestAssignmentRecord;
use crate::core::TestId;
use crate::core::Timestamp;
use crate::core::Variant;
use crate::interfaces::AssignmentCounts;
use crate::interfaces::ChangeAudit;
use crate::interfaces::ExecutionFilter;
use crate::interfaces::RollbackPlan;
use crate::interfaces::RuleFilter;
use crate::interfaces::RuleStore;
use crate::interfaces::RulesetFilter;
use crate::interfaces::StoreError;
use crate::interfaces::TestFilter;

// ============================================================================
// SECTION: State
// ============================================================================

/// Interior store state guarded by one mutex.
#[derive(Debug, Default)]
struct StoreState {
    /// Rules keyed by rule identifier.
    rules: BTreeMap<String, RuleRecord>,
    /// Rulesets keyed by identifier.
    rulesets: BTreeMap<u64, RulesetRecord>,
    /// Conditions keyed by identifier.
    conditions: BTreeMap<String, ConditionRecord>,
    /// Attributes keyed by identifier.
    attributes: BTreeMap<String, AttributeRecord>,
    /// Actionset entries keyed by `(ruleset, pattern_key)`.
    actionset: BTreeMap<(u64, String), ActionsetEntry>,
    /// Version snapshots keyed by `(rule, version_number)`.
    versions: BTreeMap<(String, u32), RuleVersionRecord>,
    /// Tests keyed by test identifier.
    tests: BTreeMap<String, AbTestRecord>,
    /// Assignments keyed by `(test row, assignment key)`.
    assignments: BTreeMap<(i64, String), TestAssignmentRecord>,
    /// Consumers keyed by identifier.
    consumers: BTreeMap<String, ConsumerRecord>,
    /// Usage counters keyed by `(consumer, rule)`.
    usage: BTreeMap<(String, String), u64>,
    /// Append-only execution log.
    executions: Vec<ExecutionRecord>,
    /// Row identifier sequence.
    next_row: i64,
}

impl StoreState {
    /// Returns the next row identifier.
    fn next_row_id(&mut self) -> i64 {
        self.next_row += 1;
        self.next_row
    }

    /// Inserts a version snapshot as `max + 1`, flipping prior currents.
    fn push_version(&mut self, mut version: RuleVersionRecord) -> RuleVersionRecord {
        let rule_key = version.rule_id.as_str().to_string();
        let next_number = self
            .versions
            .range((rule_key.clone(), 0) ..= (rule_key.clone(), u32::MAX))
            .map(|((_, number), _)| *number)
            .max()
            .unwrap_or(0)
            + 1;
        for ((id, _), row) in &mut self.versions {
            if *id == rule_key {
                row.is_current = false;
            }
        }
        version.version_number = next_number;
        version.is_current = true;
        self.versions.insert((rule_key, next_number), version.clone());
        version
    }
}

/// Reference in-memory [`RuleStore`].
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    /// Guarded interior state.
    state: Mutex<StoreState>,
}

impl InMemoryRuleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the state guard, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the recorded usage count for `(consumer, rule)`.
    #[must_use]
    pub fn usage_count(&self, consumer_id: &ConsumerId, rule_id: &RuleId) -> u64 {
        self.lock()
            .usage
            .get(&(consumer_id.as_str().to_string(), rule_id.as_str().to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Builds the version snapshot captured by a rule write.
fn snapshot_rule(record: &RuleRecord, audit: &ChangeAudit) -> RuleVersionRecord {
    RuleVersionRecord {
        rule_id: record.rule_id.clone(),
        version_number: 0,
        rule_name: record.rule_name.clone(),
        attribute: record.flat.as_ref().map(|flat| flat.attribute.as_str().to_string()),
        condition: record.flat.as_ref().map(|flat| flat.operator),
        constant: record.flat.as_ref().map(|flat| flat.constant.clone()),
        message: record.flat.as_ref().and_then(|flat| flat.message.clone()),
        weight: record.weight,
        rule_point: record.rule_point,
        priority: record.priority,
        action_result: record.action_result.clone(),
        status: record.status,
        version: record.version.clone(),
        ruleset_id: record.ruleset_id,
        is_current: true,
        change_reason: audit.change_reason.clone(),
        created_by: audit.created_by.clone(),
        created_at: audit.at,
    }
}

// ============================================================================
// SECTION: RuleStore Implementation
// ============================================================================

impl RuleStore for InMemoryRuleStore {
    fn list_active_rules(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, StoreError> {
        let state = self.lock();
        let mut rules: Vec<RuleRecord> = state
            .rules
            .values()
            .filter(|rule| rule.status == RuleStatus::Active)
            .filter(|rule| {
                filter.rule_id.as_ref().is_none_or(|wanted| rule.rule_id == *wanted)
            })
            .filter(|rule| filter.ruleset_id.is_none_or(|wanted| rule.ruleset_id == wanted))
            .cloned()
            .collect();
        rules.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.rule_id.as_str().cmp(right.rule_id.as_str()))
        });
        Ok(rules)
    }

    fn list_active_rulesets(
        &self,
        filter: &RulesetFilter,
    ) -> Result<Vec<RulesetRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .rulesets
            .values()
            .filter(|ruleset| ruleset.status == RuleStatus::Active)
            .filter(|ruleset| filter.ruleset_id.is_none_or(|wanted| ruleset.id == wanted))
            .filter(|ruleset| {
                filter.tenant_id.as_ref().is_none_or(|wanted| {
                    ruleset.tenant_id.as_ref() == Some(wanted)
                })
            })
            .cloned()
            .collect())
    }

    fn list_conditions(&self) -> Result<Vec<ConditionRecord>, StoreError> {
        Ok(self.lock().conditions.values().cloned().collect())
    }

    fn list_actionset(&self, ruleset_id: RulesetId) -> Result<Vec<ActionsetEntry>, StoreError> {
        Ok(self
            .lock()
            .actionset
            .values()
            .filter(|entry| entry.ruleset_id == ruleset_id)
            .cloned()
            .collect())
    }

    fn get_rule(&self, rule_id: &RuleId) -> Result<Option<RuleRecord>, StoreError> {
        Ok(self.lock().rules.get(rule_id.as_str()).cloned())
    }

    fn get_ruleset_by_name(&self, name: &str) -> Result<Option<RulesetRecord>, StoreError> {
        Ok(self.lock().rulesets.values().find(|ruleset| ruleset.name == name).cloned())
    }

    fn active_rule_ids(&self) -> Result<BTreeSet<RuleId>, StoreError> {
        Ok(self
            .lock()
            .rules
            .values()
            .filter(|rule| rule.status == RuleStatus::Active)
            .map(|rule| rule.rule_id.clone())
            .collect())
    }

    fn upsert_rule(
        &self,
        record: &RuleRecord,
        audit: &ChangeAudit,
    ) -> Result<RuleVersionRecord, StoreError> {
        let mut state = self.lock();
        let mut stored = record.clone();
        if stored.row_id == 0 {
            stored.row_id = state.next_row_id();
        }
        state.rules.insert(stored.rule_id.as_str().to_string(), stored.clone());
        Ok(state.push_version(snapshot_rule(&stored, audit)))
    }

    fn delete_rule(&self, rule_id: &RuleId) -> Result<bool, StoreError> {
        Ok(self.lock().rules.remove(rule_id.as_str()).is_some())
    }

    fn upsert_ruleset(&self, record: &RulesetRecord) -> Result<RulesetId, StoreError> {
        self.lock().rulesets.insert(record.id.get(), record.clone());
        Ok(record.id)
    }

    fn delete_ruleset(&self, ruleset_id: RulesetId) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let existed = state.rulesets.remove(&ruleset_id.get()).is_some();
        if existed {
            state.rules.retain(|_, rule| rule.ruleset_id != ruleset_id);
            state.actionset.retain(|(owner, _), _| *owner != ruleset_id.get());
        }
        Ok(existed)
    }

    fn upsert_condition(&self, record: &ConditionRecord) -> Result<(), StoreError> {
        self.lock()
            .conditions
            .insert(record.condition_id.as_str().to_string(), record.clone());
        Ok(())
    }

    fn delete_condition(&self, condition_id: &ConditionId) -> Result<bool, StoreError> {
        Ok(self.lock().conditions.remove(condition_id.as_str()).is_some())
    }

    fn upsert_attribute(&self, record: &AttributeRecord) -> Result<(), StoreError> {
        self.lock()
            .attributes
            .insert(record.attribute_id.as_str().to_string(), record.clone());
        Ok(())
    }

    fn list_attributes(&self) -> Result<Vec<AttributeRecord>, StoreError> {
        Ok(self.lock().attributes.values().cloned().collect())
    }

    fn delete_attribute(&self, attribute_id: &AttributeId) -> Result<bool, StoreError> {
        Ok(self.lock().attributes.remove(attribute_id.as_str()).is_some())
    }

    fn upsert_actionset_entry(&self, entry: &ActionsetEntry) -> Result<(), StoreError> {
        self.lock()
            .actionset
            .insert((entry.ruleset_id.get(), entry.pattern_key.clone()), entry.clone());
        Ok(())
    }

    fn delete_actionset_entry(
        &self,
        ruleset_id: RulesetId,
        pattern_key: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .actionset
            .remove(&(ruleset_id.get(), pattern_key.to_string()))
            .is_some())
    }

    fn upsert_consumer(&self, record: &ConsumerRecord) -> Result<(), StoreError> {
        self.lock()
            .consumers
            .insert(record.consumer_id.as_str().to_string(), record.clone());
        Ok(())
    }

    fn delete_consumer(&self, consumer_id: &ConsumerId) -> Result<bool, StoreError> {
        Ok(self.lock().consumers.remove(consumer_id.as_str()).is_some())
    }

    fn record_rule_usage(
        &self,
        consumer_id: &ConsumerId,
        rule_id: &RuleId,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let counter = state
            .usage
            .entry((consumer_id.as_str().to_string(), rule_id.as_str().to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(())
    }

    fn rule_versions(
        &self,
        rule_id: &RuleId,
        limit: Option<usize>,
    ) -> Result<Vec<RuleVersionRecord>, StoreError> {
        let state = self.lock();
        let mut versions: Vec<RuleVersionRecord> = state
            .versions
            .values()
            .filter(|version| version.rule_id == *rule_id)
            .cloned()
            .collect();
        versions.sort_by(|left, right| right.version_number.cmp(&left.version_number));
        if let Some(limit) = limit {
            versions.truncate(limit);
        }
        Ok(versions)
    }

    fn rule_version(
        &self,
        rule_id: &RuleId,
        version_number: u32,
    ) -> Result<Option<RuleVersionRecord>, StoreError> {
        Ok(self
            .lock()
            .versions
            .get(&(rule_id.as_str().to_string(), version_number))
            .cloned())
    }

    fn rule_version_by_label(
        &self,
        rule_id: &RuleId,
        label: &str,
    ) -> Result<Option<RuleVersionRecord>, StoreError> {
        let state = self.lock();
        let mut labeled: Vec<&RuleVersionRecord> = state
            .versions
            .values()
            .filter(|version| version.rule_id == *rule_id && version.version == label)
            .collect();
        labeled.sort_by_key(|version| version.version_number);
        Ok(labeled.last().map(|version| (*version).clone()))
    }

    fn current_rule_version(
        &self,
        rule_id: &RuleId,
    ) -> Result<Option<RuleVersionRecord>, StoreError> {
        Ok(self
            .lock()
            .versions
            .values()
            .find(|version| version.rule_id == *rule_id && version.is_current)
            .cloned())
    }

    fn apply_rollback(&self, plan: &RollbackPlan) -> Result<RuleRecord, StoreError> {
        let mut state = self.lock();
        let target_key = (plan.rule_id.as_str().to_string(), plan.target_version);
        if !state.versions.contains_key(&target_key) {
            return Err(StoreError::Missing(format!(
                "version {} of rule `{}`",
                plan.target_version, plan.rule_id
            )));
        }
        if !state.rules.contains_key(plan.rule_id.as_str()) {
            return Err(StoreError::Missing(format!("rule `{}`", plan.rule_id)));
        }
        let mut restored = plan.restored.clone();
        if restored.row_id == 0 {
            restored.row_id = state.next_row_id();
        }
        state.rules.insert(restored.rule_id.as_str().to_string(), restored.clone());
        state.push_version(plan.backup.clone());
        Ok(restored)
    }

    fn insert_test(&self, record: &AbTestRecord) -> Result<i64, StoreError> {
        let mut state = self.lock();
        if state.tests.contains_key(record.test_id.as_str()) {
            return Err(StoreError::Conflict(format!("test `{}` exists", record.test_id)));
        }
        let mut stored = record.clone();
        stored.row_id = state.next_row_id();
        let row_id = stored.row_id;
        state.tests.insert(stored.test_id.as_str().to_string(), stored);
        Ok(row_id)
    }

    fn update_test(&self, record: &AbTestRecord) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.tests.contains_key(record.test_id.as_str()) {
            return Err(StoreError::Missing(format!("test `{}`", record.test_id)));
        }
        state.tests.insert(record.test_id.as_str().to_string(), record.clone());
        Ok(())
    }

    fn delete_test(&self, test_id: &TestId) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(test) = state.tests.remove(test_id.as_str()) else {
            return Ok(false);
        };
        state.assignments.retain(|(row, _), _| *row != test.row_id);
        Ok(true)
    }

    fn get_test(&self, test_id: &TestId) -> Result<Option<AbTestRecord>, StoreError> {
        Ok(self.lock().tests.get(test_id.as_str()).cloned())
    }

    fn list_tests(&self, filter: &TestFilter) -> Result<Vec<AbTestRecord>, StoreError> {
        let state = self.lock();
        let mut tests: Vec<AbTestRecord> = state
            .tests
            .values()
            .filter(|test| {
                filter.rule_id.as_ref().is_none_or(|wanted| test.rule_id == *wanted)
            })
            .filter(|test| filter.status.is_none_or(|wanted| test.status == wanted))
            .cloned()
            .collect();
        tests.sort_by(|left, right| right.row_id.cmp(&left.row_id));
        if let Some(limit) = filter.limit {
            tests.truncate(limit);
        }
        Ok(tests)
    }

    fn get_assignment(
        &self,
        ab_test_row: i64,
        assignment_key: &str,
    ) -> Result<Option<TestAssignmentRecord>, StoreError> {
        Ok(self
            .lock()
            .assignments
            .get(&(ab_test_row, assignment_key.to_string()))
            .cloned())
    }

    fn insert_assignment(&self, record: &TestAssignmentRecord) -> Result<(), StoreError> {
        let mut state = self.lock();
        let key = (record.ab_test_id, record.assignment_key.clone());
        if state.assignments.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "assignment `{}` exists for test row {}",
                record.assignment_key, record.ab_test_id
            )));
        }
        state.assignments.insert(key, record.clone());
        Ok(())
    }

    fn touch_assignment(
        &self,
        ab_test_row: i64,
        assignment_key: &str,
        at: Timestamp,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let Some(row) = state.assignments.get_mut(&(ab_test_row, assignment_key.to_string()))
        else {
            return Err(StoreError::Missing(format!(
                "assignment `{assignment_key}` for test row {ab_test_row}"
            )));
        };
        row.execution_count += 1;
        row.last_execution_at = at;
        Ok(row.execution_count)
    }

    fn count_assignments(&self, ab_test_row: i64) -> Result<AssignmentCounts, StoreError> {
        let state = self.lock();
        let mut counts = AssignmentCounts::default();
        for row in state.assignments.values() {
            if row.ab_test_id == ab_test_row {
                match row.variant {
                    Variant::A => counts.variant_a += 1,
                    Variant::B => counts.variant_b += 1,
                }
            }
        }
        Ok(counts)
    }

    fn append_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.lock().executions.push(record.clone());
        Ok(())
    }

    fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let state = self.lock();
        let mut records: Vec<ExecutionRecord> = state
            .executions
            .iter()
            .filter(|record| {
                filter.ab_test_id.is_none_or(|wanted| record.ab_test_id == Some(wanted))
            })
            .filter(|record| {
                filter.variant.is_none_or(|wanted| record.ab_test_variant == Some(wanted))
            })
            .filter(|record| {
                filter.from.is_none_or(|bound| record.timestamp >= bound)
            })
            .filter(|record| {
                filter.until.is_none_or(|bound| record.timestamp <= bound)
            })
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}
