// crates/verdict-core/src/runtime/registry.rs
// ============================================================================
// Module: Verdict Rule Registry
// Description: Concurrency-safe, versioned in-memory rule cache.
// Purpose: Serve consistent prepared-rule snapshots to the evaluation path
//          and broadcast change events to subscribers.
// Dependencies: crate::core, crate::interfaces, crate::runtime::compiler
// ============================================================================

//! ## Overview
//! The registry holds the active rules, rulesets, actionsets, and their
//! compiled prepared-rule lists behind one reader-writer lock. Readers never
//! suspend and always observe a coherent snapshot; writers are mutually
//! exclusive, bump a monotonically increasing version, and publish
//! per-ruleset prepared lists copy-on-write so an in-flight evaluation keeps
//! its list even across a concurrent reload.
//!
//! Subscriber callbacks run synchronously on the writer's thread after the
//! write lock is released; each callback is panic-isolated so one bad
//! subscriber never blocks others or prevents the write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::sync_channel;

use serde::Serialize;

use crate::core::ActionsetEntry;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::RulesetId;
use crate::core::RulesetRecord;
use crate::core::Timestamp;
use crate::interfaces::EngineMetric;
use crate::interfaces::EngineTelemetry;
use crate::interfaces::NoopTelemetry;
use crate::runtime::compiler::PreparedRule;

// ============================================================================
// SECTION: Cached Entries
// ============================================================================

/// One rule as cached: its declarative record plus its compiled form.
///
/// # Invariants
/// - `prepared` was compiled from `record` against the condition snapshot
///   current at install time.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRule {
    /// Declarative rule record.
    pub record: RuleRecord,
    /// Compiled prepared rule.
    pub prepared: PreparedRule,
}

/// One ruleset as cached: its record plus its actionset lookup map.
#[derive(Debug, Clone, PartialEq)]
struct CachedRuleset {
    /// Declarative ruleset record.
    record: RulesetRecord,
    /// Exact-match pattern lookup.
    actionset: HashMap<String, String>,
}

/// Interior registry state guarded by the reader-writer lock.
#[derive(Debug, Default)]
struct RegistryInner {
    /// Rules keyed by rule identifier.
    rules: HashMap<RuleId, CachedRule>,
    /// Rulesets keyed by ruleset identifier.
    rulesets: HashMap<RulesetId, CachedRuleset>,
    /// Rule identifiers per ruleset in insertion order.
    ruleset_rules: HashMap<RulesetId, Vec<RuleId>>,
    /// Copy-on-write prepared lists per ruleset, sorted by priority.
    prepared: HashMap<RulesetId, Arc<[PreparedRule]>>,
    /// Monotonically increasing write version.
    version: u64,
    /// Last reload stamp.
    last_reload: Option<Timestamp>,
    /// Ordered numeric row identifiers observed per rule.
    version_trail: HashMap<RuleId, Vec<i64>>,
}

impl RegistryInner {
    /// Rebuilds the copy-on-write prepared list for one ruleset.
    fn rebuild_prepared(&mut self, ruleset_id: RulesetId) {
        let ids = self.ruleset_rules.get(&ruleset_id).cloned().unwrap_or_default();
        let mut list: Vec<PreparedRule> = ids
            .iter()
            .filter_map(|id| self.rules.get(id))
            .map(|cached| cached.prepared.clone())
            .collect();
        list.sort_by_key(|rule| rule.priority);
        self.prepared.insert(ruleset_id, Arc::from(list));
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Registry change events delivered to subscribers.
///
/// # Invariants
/// - Event labels are stable for wire delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A rule was installed.
    RuleAdded {
        /// Installed rule identifier.
        rule_id: RuleId,
        /// Registry version after the write.
        version: u64,
    },
    /// A rule was replaced.
    RuleUpdated {
        /// Replaced rule identifier.
        rule_id: RuleId,
        /// Registry version after the write.
        version: u64,
    },
    /// A rule was removed.
    RuleRemoved {
        /// Removed rule identifier.
        rule_id: RuleId,
        /// Registry version after the write.
        version: u64,
    },
    /// A ruleset was installed.
    RulesetAdded {
        /// Installed ruleset identifier.
        ruleset_id: RulesetId,
        /// Registry version after the write.
        version: u64,
    },
    /// A ruleset and its rules were removed.
    RulesetRemoved {
        /// Removed ruleset identifier.
        ruleset_id: RulesetId,
        /// Registry version after the write.
        version: u64,
    },
    /// Every entry was removed.
    RegistryCleared {
        /// Registry version after the write.
        version: u64,
    },
    /// A reload replaced registry contents.
    RulesReloaded {
        /// Rules installed by the reload.
        rules_loaded: usize,
        /// Rulesets installed by the reload.
        rulesets_loaded: usize,
        /// Registry version after the reload.
        version: u64,
    },
}

impl RegistryEvent {
    /// Returns the stable event label.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RuleAdded { .. } => "rule_added",
            Self::RuleUpdated { .. } => "rule_updated",
            Self::RuleRemoved { .. } => "rule_removed",
            Self::RulesetAdded { .. } => "ruleset_added",
            Self::RulesetRemoved { .. } => "ruleset_removed",
            Self::RegistryCleared { .. } => "registry_cleared",
            Self::RulesReloaded { .. } => "rules_reloaded",
        }
    }
}

/// Subscriber callback signature.
pub type SubscriberCallback = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Opaque handle returned by [`RuleRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// One registered subscriber entry.
struct SubscriberEntry {
    /// Handle for unsubscription.
    id: SubscriberId,
    /// Panic-isolated callback.
    callback: SubscriberCallback,
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Registry statistics snapshot.
///
/// # Invariants
/// - Values describe one coherent read of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Number of cached rules.
    pub rule_count: usize,
    /// Number of cached rulesets.
    pub ruleset_count: usize,
    /// Current registry version.
    pub version: u64,
    /// Last reload stamp.
    pub last_reload: Option<Timestamp>,
    /// Number of registered subscribers.
    pub subscriber_count: usize,
}

/// Consistent snapshot handed to one evaluation.
///
/// # Invariants
/// - All fields were read under a single read guard; `version` identifies
///   the snapshot for staleness detection.
#[derive(Debug, Clone)]
pub struct EvaluationSnapshot {
    /// Resolved ruleset record.
    pub ruleset: RulesetRecord,
    /// Priority-sorted prepared rules.
    pub prepared: Arc<[PreparedRule]>,
    /// Actionset lookup for the resolved ruleset.
    pub actionset: HashMap<String, String>,
    /// Registry version the snapshot was taken at.
    pub version: u64,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Process-wide, concurrency-safe, versioned rule cache.
///
/// # Invariants
/// - Readers observe either the pre- or post-write state, never a mix.
/// - `version` strictly increases across writes, including `clear`.
pub struct RuleRegistry {
    /// Guarded interior state.
    inner: RwLock<RegistryInner>,
    /// Registered subscribers, guarded separately from the data lock.
    subscribers: Mutex<Vec<SubscriberEntry>>,
    /// Next subscriber handle value.
    next_subscriber: AtomicU64,
    /// Telemetry sink for isolation counters.
    telemetry: Arc<dyn EngineTelemetry>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoopTelemetry))
    }
}

impl RuleRegistry {
    /// Creates an empty registry with the given telemetry sink.
    #[must_use]
    pub fn new(telemetry: Arc<dyn EngineTelemetry>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
            telemetry,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns one cached rule by identifier.
    #[must_use]
    pub fn get_rule(&self, rule_id: &RuleId) -> Option<CachedRule> {
        self.read().rules.get(rule_id).cloned()
    }

    /// Lists cached rules, optionally narrowed to one ruleset.
    #[must_use]
    pub fn list_rules(&self, ruleset_id: Option<RulesetId>) -> Vec<CachedRule> {
        let inner = self.read();
        match ruleset_id {
            Some(id) => inner
                .ruleset_rules
                .get(&id)
                .map(|ids| ids.iter().filter_map(|rid| inner.rules.get(rid).cloned()).collect())
                .unwrap_or_default(),
            None => inner.rules.values().cloned().collect(),
        }
    }

    /// Returns one cached ruleset record by identifier.
    #[must_use]
    pub fn get_ruleset(&self, ruleset_id: RulesetId) -> Option<RulesetRecord> {
        self.read().rulesets.get(&ruleset_id).map(|cached| cached.record.clone())
    }

    /// Returns the current registry version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.read().version
    }

    /// Returns the ordered numeric row identifiers observed for one rule.
    #[must_use]
    pub fn version_trail(&self, rule_id: &RuleId) -> Vec<i64> {
        self.read().version_trail.get(rule_id).cloned().unwrap_or_default()
    }

    /// Returns registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let inner = self.read();
        let subscriber_count = self.subscribers.lock().map(|entries| entries.len()).unwrap_or(0);
        RegistryStats {
            rule_count: inner.rules.len(),
            ruleset_count: inner.rulesets.len(),
            version: inner.version,
            last_reload: inner.last_reload,
            subscriber_count,
        }
    }

    /// Resolves a ruleset selector and returns one coherent evaluation
    /// snapshot, all under a single read guard.
    ///
    /// Selection: by name when given; otherwise the default ruleset, falling
    /// back to the first active one by ascending identifier.
    #[must_use]
    pub fn evaluation_snapshot(&self, ruleset_name: Option<&str>) -> Option<EvaluationSnapshot> {
        let inner = self.read();
        let cached = match ruleset_name {
            Some(name) => {
                inner.rulesets.values().find(|cached| cached.record.name == name)
            }
            None => {
                let mut candidates: Vec<&CachedRuleset> = inner
                    .rulesets
                    .values()
                    .filter(|cached| cached.record.is_active())
                    .collect();
                candidates.sort_by_key(|cached| cached.record.id);
                candidates
                    .iter()
                    .find(|cached| cached.record.is_default)
                    .or_else(|| candidates.first())
                    .copied()
            }
        }?;
        let ruleset_id = cached.record.id;
        Some(EvaluationSnapshot {
            ruleset: cached.record.clone(),
            prepared: inner
                .prepared
                .get(&ruleset_id)
                .cloned()
                .unwrap_or_else(|| Arc::from(Vec::new())),
            actionset: cached.actionset.clone(),
            version: inner.version,
        })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Installs or replaces one rule; bumps the version and notifies.
    pub fn add_rule(&self, cached: CachedRule) {
        let event = {
            let mut inner = self.write();
            let rule_id = cached.record.rule_id.clone();
            let ruleset_id = cached.record.ruleset_id;
            let existed = inner.rules.contains_key(&rule_id);
            inner.version_trail.entry(rule_id.clone()).or_default().push(cached.record.row_id);
            inner.rules.insert(rule_id.clone(), cached);
            let members = inner.ruleset_rules.entry(ruleset_id).or_default();
            if !members.contains(&rule_id) {
                members.push(rule_id.clone());
            }
            inner.rebuild_prepared(ruleset_id);
            inner.version += 1;
            if existed {
                RegistryEvent::RuleUpdated {
                    rule_id,
                    version: inner.version,
                }
            } else {
                RegistryEvent::RuleAdded {
                    rule_id,
                    version: inner.version,
                }
            }
        };
        self.notify(&event);
    }

    /// Replaces one rule; installs it when absent.
    pub fn update_rule(&self, cached: CachedRule) {
        self.add_rule(cached);
    }

    /// Removes one rule; returns `false` when it was not cached.
    pub fn remove_rule(&self, rule_id: &RuleId) -> bool {
        let event = {
            let mut inner = self.write();
            let Some(cached) = inner.rules.remove(rule_id) else {
                return false;
            };
            let ruleset_id = cached.record.ruleset_id;
            if let Some(members) = inner.ruleset_rules.get_mut(&ruleset_id) {
                members.retain(|member| member != rule_id);
            }
            inner.rebuild_prepared(ruleset_id);
            inner.version += 1;
            RegistryEvent::RuleRemoved {
                rule_id: rule_id.clone(),
                version: inner.version,
            }
        };
        self.notify(&event);
        true
    }

    /// Installs or replaces one ruleset with its actionset entries.
    pub fn add_ruleset(&self, record: RulesetRecord, actionset: &[ActionsetEntry]) {
        let event = {
            let mut inner = self.write();
            let ruleset_id = record.id;
            let lookup = actionset
                .iter()
                .map(|entry| (entry.pattern_key.clone(), entry.action_recommendation.clone()))
                .collect();
            inner.rulesets.insert(
                ruleset_id,
                CachedRuleset {
                    record,
                    actionset: lookup,
                },
            );
            inner.ruleset_rules.entry(ruleset_id).or_default();
            inner.version += 1;
            RegistryEvent::RulesetAdded {
                ruleset_id,
                version: inner.version,
            }
        };
        self.notify(&event);
    }

    /// Removes one ruleset and every rule it owns.
    pub fn remove_ruleset(&self, ruleset_id: RulesetId) -> bool {
        let event = {
            let mut inner = self.write();
            if inner.rulesets.remove(&ruleset_id).is_none() {
                return false;
            }
            if let Some(members) = inner.ruleset_rules.remove(&ruleset_id) {
                for member in members {
                    inner.rules.remove(&member);
                }
            }
            inner.prepared.remove(&ruleset_id);
            inner.version += 1;
            RegistryEvent::RulesetRemoved {
                ruleset_id,
                version: inner.version,
            }
        };
        self.notify(&event);
        true
    }

    /// Removes every entry; the version keeps increasing monotonically.
    pub fn clear(&self) {
        let event = {
            let mut inner = self.write();
            let version = inner.version + 1;
            *inner = RegistryInner {
                version,
                ..RegistryInner::default()
            };
            RegistryEvent::RegistryCleared { version }
        };
        self.notify(&event);
    }

    /// Atomically replaces registry contents with a reload outcome.
    ///
    /// A full reload rebuilds the whole interior state under one write
    /// guard, so readers observe either the previous or the new snapshot,
    /// never an intermediate one.
    pub fn install_reload(
        &self,
        rulesets: Vec<(RulesetRecord, Vec<ActionsetEntry>)>,
        rules: Vec<CachedRule>,
        full: bool,
        at: Timestamp,
    ) {
        let event = {
            let mut inner = self.write();
            if full {
                let version = inner.version;
                let trail = std::mem::take(&mut inner.version_trail);
                *inner = RegistryInner {
                    version,
                    version_trail: trail,
                    ..RegistryInner::default()
                };
            }
            let rulesets_loaded = rulesets.len();
            let rules_loaded = rules.len();
            for (record, actionset) in rulesets {
                let ruleset_id = record.id;
                let lookup = actionset
                    .iter()
                    .map(|entry| (entry.pattern_key.clone(), entry.action_recommendation.clone()))
                    .collect();
                inner.rulesets.insert(
                    ruleset_id,
                    CachedRuleset {
                        record,
                        actionset: lookup,
                    },
                );
                inner.ruleset_rules.entry(ruleset_id).or_default();
            }
            let mut touched: Vec<RulesetId> = Vec::new();
            for cached in rules {
                let rule_id = cached.record.rule_id.clone();
                let ruleset_id = cached.record.ruleset_id;
                inner.version_trail.entry(rule_id.clone()).or_default().push(cached.record.row_id);
                inner.rules.insert(rule_id.clone(), cached);
                let members = inner.ruleset_rules.entry(ruleset_id).or_default();
                if !members.contains(&rule_id) {
                    members.push(rule_id);
                }
                if !touched.contains(&ruleset_id) {
                    touched.push(ruleset_id);
                }
            }
            for ruleset_id in touched {
                inner.rebuild_prepared(ruleset_id);
            }
            inner.version += 1;
            inner.last_reload = Some(at);
            RegistryEvent::RulesReloaded {
                rules_loaded,
                rulesets_loaded,
                version: inner.version,
            }
        };
        self.notify(&event);
    }

    /// Stamps the last reload time.
    pub fn set_last_reload(&self, at: Timestamp) {
        self.write().last_reload = Some(at);
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Registers a change-event callback and returns its handle.
    pub fn subscribe(&self, callback: SubscriberCallback) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut entries) = self.subscribers.lock() {
            entries.push(SubscriberEntry {
                id,
                callback,
            });
        }
        id
    }

    /// Removes a subscriber; returns `false` when the handle was unknown.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let Ok(mut entries) = self.subscribers.lock() else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Delivers one event to every subscriber, isolating panics.
    fn notify(&self, event: &RegistryEvent) {
        let callbacks: Vec<SubscriberCallback> = match self.subscribers.lock() {
            Ok(entries) => entries.iter().map(|entry| Arc::clone(&entry.callback)).collect(),
            Err(_) => return,
        };
        for callback in callbacks {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if outcome.is_err() {
                self.telemetry.record(EngineMetric::SubscriberPanics, 1);
            }
        }
    }

    // ------------------------------------------------------------------
    // Lock Access
    // ------------------------------------------------------------------

    /// Acquires the read guard, recovering from poisoning.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Acquires the write guard, recovering from poisoning.
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Channel Subscriber
// ============================================================================

/// Bounded-channel subscriber adapter with non-blocking publication.
///
/// The registry publishes with `try_send`; a full channel increments the
/// dropped-notification counter instead of blocking the writer. Delivery is
/// best-effort, not durable.
pub struct ChannelSubscriber {
    /// Bounded event sender.
    sender: SyncSender<RegistryEvent>,
    /// Count of notifications dropped on a full channel.
    dropped: Arc<AtomicU64>,
    /// Telemetry sink for drop counters.
    telemetry: Arc<dyn EngineTelemetry>,
}

impl ChannelSubscriber {
    /// Creates a subscriber with the given channel capacity.
    #[must_use]
    pub fn new(
        capacity: usize,
        telemetry: Arc<dyn EngineTelemetry>,
    ) -> (Self, Receiver<RegistryEvent>) {
        let (sender, receiver) = sync_channel(capacity);
        (
            Self {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
                telemetry,
            },
            receiver,
        )
    }

    /// Returns the callback to register with [`RuleRegistry::subscribe`].
    #[must_use]
    pub fn callback(&self) -> SubscriberCallback {
        let sender = self.sender.clone();
        let dropped = Arc::clone(&self.dropped);
        let telemetry = Arc::clone(&self.telemetry);
        Arc::new(move |event: &RegistryEvent| {
            if sender.try_send(event.clone()).is_err() {
                dropped.fetch_add(1, Ordering::Relaxed);
                telemetry.record(EngineMetric::DroppedNotifications, 1);
            }
        })
    }

    /// Returns the number of notifications dropped so far.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
