// crates/verdict-core/src/runtime/reload.rs
// ============================================================================
// Module: Verdict Hot-Reload Controller
// Description: Detects store changes, validates candidates, and swaps the
//              registry atomically.
// Purpose: Rebuild the in-memory registry without interrupting in-flight
//          evaluations.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! A reload runs under a dedicated reload mutex: it queries the store for
//! active rules and rulesets under the requested filter, optionally
//! validates every candidate (rejecting the entire reload when any rule
//! fails, with every failure aggregated), and installs the outcome into the
//! registry as one atomic write. Readers keep serving the previous snapshot
//! until the swap completes; on validation failure the previous snapshot
//! stays authoritative.
//!
//! The monitoring worker polls the store's active rule-id set every
//! interval and triggers an automatic reload on a detected delta. The loop
//! is resilient: a reload failure is counted and the loop continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::sync_channel;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::core::ErrorReport;
use crate::core::Reportable;
use crate::core::RuleId;
use crate::core::RulesetId;
use crate::core::Timestamp;
use crate::interfaces::Clock;
use crate::interfaces::ConfigSource;
use crate::interfaces::EngineMetric;
use crate::interfaces::EngineTelemetry;
use crate::interfaces::RuleFilter;
use crate::interfaces::RuleStore;
use crate::interfaces::RulesetFilter;
use crate::interfaces::SourceKind;
use crate::interfaces::StoreError;
use crate::runtime::compiler;
use crate::runtime::registry::CachedRule;
use crate::runtime::registry::RegistryStats;
use crate::runtime::registry::RuleRegistry;
use crate::runtime::validator;
use crate::runtime::validator::ValidationReport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Grace period granted to the monitor worker on shutdown.
const STOP_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Hot-reload errors.
///
/// # Invariants
/// - A validation failure carries every invalid rule's name and error.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// One or more candidate rules failed validation; the reload aborted.
    #[error("rule validation failed for {} rule(s)", failures.len())]
    Validation {
        /// Per-rule failures as `(rule_name, report)` pairs.
        failures: Vec<(String, ErrorReport)>,
    },
    /// Store query failed.
    #[error("reload store query failed: {0}")]
    Store(#[from] StoreError),
}

impl Reportable for ReloadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Store(_) => "RELOAD_ERROR",
        }
    }

    fn to_report(&self) -> ErrorReport {
        match self {
            Self::Validation { failures } => {
                let errors: Vec<_> = failures
                    .iter()
                    .map(|(rule_name, report)| {
                        json!({"rule_name": rule_name, "error": report})
                    })
                    .collect();
                ErrorReport::new("reload", self.to_string(), self.error_code())
                    .with_context("validation_errors", json!(errors))
            }
            Self::Store(_) => {
                ErrorReport::new("configuration", self.to_string(), self.error_code())
            }
        }
    }
}

// ============================================================================
// SECTION: Reload Options and Results
// ============================================================================

/// Options for one reload invocation.
///
/// # Invariants
/// - `rule_id` narrows to one rule, `ruleset_id` to one ruleset; neither
///   requests a full registry rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadOptions {
    /// Narrow the reload to one ruleset.
    pub ruleset_id: Option<RulesetId>,
    /// Narrow the reload to one rule.
    pub rule_id: Option<RuleId>,
    /// Reload even when no change was detected.
    pub force: bool,
    /// Compile-validate every candidate before the swap.
    pub validate: bool,
}

/// Outcome of one completed reload.
///
/// # Invariants
/// - `registry_version` is the version after the swap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReloadResult {
    /// Stable status label (`success`).
    pub status: &'static str,
    /// Rules installed by the reload.
    pub rules_loaded: usize,
    /// Rulesets installed by the reload.
    pub rulesets_loaded: usize,
    /// Reload duration in milliseconds.
    pub reload_time_ms: f64,
    /// Registry version after the swap.
    pub registry_version: u64,
    /// Reloads completed since construction.
    pub reload_count: u64,
    /// Reload stamp.
    pub timestamp: Timestamp,
}

/// Controller status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReloadStatus {
    /// Whether the monitor worker is running.
    pub monitoring_active: bool,
    /// Whether automatic reloads are enabled.
    pub auto_reload_enabled: bool,
    /// Monitor poll interval in seconds.
    pub reload_interval_seconds: u64,
    /// Whether candidates are validated before swaps.
    pub validation_enabled: bool,
    /// Last reload stamp.
    pub last_reload: Option<Timestamp>,
    /// Stable status label of the last reload attempt.
    pub last_reload_status: &'static str,
    /// Error narrative of the last failed reload attempt.
    pub last_reload_error: Option<String>,
    /// Reloads completed since construction.
    pub reload_count: u64,
    /// Registry statistics.
    pub registry: RegistryStats,
}

/// Controller configuration.
///
/// # Invariants
/// - `reload_interval_seconds >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadConfig {
    /// Enable the automatic monitor-triggered reloads.
    pub auto_reload_enabled: bool,
    /// Monitor poll interval in seconds.
    pub reload_interval_seconds: u64,
    /// Validate candidates before every swap.
    pub validation_enabled: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            auto_reload_enabled: true,
            reload_interval_seconds: 30,
            validation_enabled: true,
        }
    }
}

// ============================================================================
// SECTION: Controller State
// ============================================================================

/// Mutable controller bookkeeping behind one mutex.
#[derive(Debug, Default)]
struct ControllerState {
    /// Active rule identifiers observed by the last monitor poll.
    known_rule_ids: BTreeSet<RuleId>,
    /// Reloads completed since construction.
    reload_count: u64,
    /// Last reload stamp.
    last_reload: Option<Timestamp>,
    /// Stable status label of the last reload attempt.
    last_status: &'static str,
    /// Error narrative of the last failed attempt.
    last_error: Option<String>,
}

/// Running monitor worker handle.
struct MonitorHandle {
    /// Stop signal sender.
    stop: SyncSender<()>,
    /// Exit acknowledgement receiver.
    done: Receiver<()>,
    /// Worker join handle.
    worker: thread::JoinHandle<()>,
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Hot-reload controller owning the reload lock and the monitor worker.
///
/// # Invariants
/// - Reloads are serialized by the reload mutex.
/// - Registry swaps are atomic; validation failures leave the previous
///   snapshot authoritative.
pub struct HotReloadController {
    /// In-memory rule registry.
    registry: Arc<RuleRegistry>,
    /// Authoritative store.
    store: Arc<dyn RuleStore>,
    /// Wall-clock seam.
    clock: Arc<dyn Clock>,
    /// Telemetry sink.
    telemetry: Arc<dyn EngineTelemetry>,
    /// Controller configuration.
    config: ReloadConfig,
    /// Serializes reloads.
    reload_lock: Mutex<()>,
    /// Mutable bookkeeping.
    state: Mutex<ControllerState>,
    /// Monitor worker handle, when running.
    monitor: Mutex<Option<MonitorHandle>>,
}

impl HotReloadController {
    /// Creates a controller over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<RuleRegistry>,
        store: Arc<dyn RuleStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn EngineTelemetry>,
        config: ReloadConfig,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            telemetry,
            config,
            reload_lock: Mutex::new(()),
            state: Mutex::new(ControllerState {
                last_status: "never",
                ..ControllerState::default()
            }),
            monitor: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Reload
    // ------------------------------------------------------------------

    /// Rebuilds the registry (fully or scoped) from the store.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::Validation`] when any candidate fails
    /// validation (the registry is untouched), or [`ReloadError::Store`]
    /// when a store query fails.
    pub fn reload(&self, options: &ReloadOptions) -> Result<ReloadResult, ReloadError> {
        let _guard = lock_unpoisoned(&self.reload_lock);
        let started = Instant::now();
        let outcome = self.reload_inner(options, started);
        let mut state = lock_unpoisoned(&self.state);
        match &outcome {
            Ok(result) => {
                state.reload_count = result.reload_count;
                state.last_reload = Some(result.timestamp);
                state.last_status = "success";
                state.last_error = None;
                self.telemetry.record(EngineMetric::Reloads, 1);
            }
            Err(err) => {
                state.last_status = "error";
                state.last_error = Some(err.to_string());
                self.telemetry.record(EngineMetric::ReloadFailures, 1);
            }
        }
        outcome
    }

    /// Reload body; runs with the reload lock held.
    fn reload_inner(
        &self,
        options: &ReloadOptions,
        started: Instant,
    ) -> Result<ReloadResult, ReloadError> {
        let rule_filter = RuleFilter {
            rule_id: options.rule_id.clone(),
            ruleset_id: options.ruleset_id,
        };
        let ruleset_filter = RulesetFilter {
            ruleset_id: options.ruleset_id,
            tenant_id: None,
        };
        let rules = self.store.list_active_rules(&rule_filter)?;
        let rulesets = self.store.list_active_rulesets(&ruleset_filter)?;
        let conditions = self.store.list_conditions()?;

        if options.validate && self.config.validation_enabled {
            let report =
                validator::validate_rules(&rules, &conditions, SourceKind::Database);
            if !report.is_valid {
                let failures = report
                    .rules
                    .into_iter()
                    .filter(|outcome| !outcome.is_valid)
                    .flat_map(|outcome| {
                        let name = outcome.rule_name;
                        outcome.errors.into_iter().map(move |error| (name.clone(), error))
                    })
                    .collect();
                return Err(ReloadError::Validation {
                    failures,
                });
            }
        }

        let mut cached = Vec::with_capacity(rules.len());
        for rule in rules {
            match compiler::compile_rule(&rule, &conditions) {
                Ok(prepared) => cached.push(CachedRule {
                    record: rule,
                    prepared,
                }),
                Err(err) => {
                    // Unvalidated reloads skip uncompilable rules instead of
                    // serving a half-built predicate.
                    self.telemetry.note("RELOAD_RULE_SKIPPED", &err.to_string());
                }
            }
        }

        let mut installable = Vec::with_capacity(rulesets.len());
        for ruleset in rulesets {
            let actionset = self.store.list_actionset(ruleset.id)?;
            installable.push((ruleset, actionset));
        }

        let full = options.rule_id.is_none() && options.ruleset_id.is_none();
        let now = self.clock.now();
        let rules_loaded = cached.len();
        let rulesets_loaded = installable.len();
        self.registry.install_reload(installable, cached, full, now);

        let reload_count = lock_unpoisoned(&self.state).reload_count + 1;
        Ok(ReloadResult {
            status: "success",
            rules_loaded,
            rulesets_loaded,
            reload_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
            registry_version: self.registry.version(),
            reload_count,
            timestamp: now,
        })
    }

    /// Reloads one rule.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError`] as for [`Self::reload`].
    pub fn reload_rule(&self, rule_id: RuleId) -> Result<ReloadResult, ReloadError> {
        self.reload(&ReloadOptions {
            rule_id: Some(rule_id),
            validate: true,
            ..ReloadOptions::default()
        })
    }

    /// Reloads one ruleset slice.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError`] as for [`Self::reload`].
    pub fn reload_ruleset(&self, ruleset_id: RulesetId) -> Result<ReloadResult, ReloadError> {
        self.reload(&ReloadOptions {
            ruleset_id: Some(ruleset_id),
            validate: true,
            ..ReloadOptions::default()
        })
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Validates rules read-only, without mutating the registry.
    ///
    /// With a source, candidates come from it; otherwise from the store.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::Store`] when the store or source read fails.
    pub fn validate_from_source(
        &self,
        source: Option<&dyn ConfigSource>,
    ) -> Result<ValidationReport, ReloadError> {
        match source {
            Some(source) => {
                let rules = source
                    .read_rules_set()
                    .map_err(|err| StoreError::Store(err.to_string()))?;
                let conditions = source
                    .read_conditions_set()
                    .map_err(|err| StoreError::Store(err.to_string()))?;
                Ok(validator::validate_rules(&rules, &conditions, source.kind()))
            }
            None => {
                let rules = self.store.list_active_rules(&RuleFilter::default())?;
                let conditions = self.store.list_conditions()?;
                Ok(validator::validate_rules(&rules, &conditions, SourceKind::Database))
            }
        }
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Returns the controller status snapshot.
    #[must_use]
    pub fn status(&self) -> ReloadStatus {
        let state = lock_unpoisoned(&self.state);
        let monitoring_active = lock_unpoisoned(&self.monitor).is_some();
        ReloadStatus {
            monitoring_active,
            auto_reload_enabled: self.config.auto_reload_enabled,
            reload_interval_seconds: self.config.reload_interval_seconds,
            validation_enabled: self.config.validation_enabled,
            last_reload: state.last_reload,
            last_reload_status: state.last_status,
            last_reload_error: state.last_error.clone(),
            reload_count: state.reload_count,
            registry: self.registry.stats(),
        }
    }

    // ------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------

    /// Starts the monitor worker; a second start is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut monitor = lock_unpoisoned(&self.monitor);
        if monitor.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = sync_channel::<()>(1);
        let (done_tx, done_rx) = sync_channel::<()>(1);
        let controller = Arc::clone(self);
        let interval = Duration::from_secs(self.config.reload_interval_seconds.max(1));
        let worker = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => controller.check_for_changes(),
                }
            }
            let _ = done_tx.try_send(());
        });
        *monitor = Some(MonitorHandle {
            stop: stop_tx,
            done: done_rx,
            worker,
        });
    }

    /// Stops the monitor worker, waiting up to five seconds before
    /// abandoning it.
    pub fn stop(&self) {
        let Some(handle) = lock_unpoisoned(&self.monitor).take() else {
            return;
        };
        let _ = handle.stop.try_send(());
        match handle.done.recv_timeout(STOP_GRACE) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.worker.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                // Abandon the worker; it exits on its next poll.
                drop(handle.worker);
            }
        }
    }

    /// One monitor iteration: detect an active-rule delta and reload.
    fn check_for_changes(&self) {
        if !self.config.auto_reload_enabled {
            return;
        }
        let current = match self.store.active_rule_ids() {
            Ok(ids) => ids,
            Err(err) => {
                self.telemetry.note("MONITOR_QUERY_FAILED", &err.to_string());
                return;
            }
        };
        let changed = {
            let state = lock_unpoisoned(&self.state);
            state.known_rule_ids != current
        };
        if changed {
            let outcome = self.reload(&ReloadOptions {
                force: true,
                validate: true,
                ..ReloadOptions::default()
            });
            if let Err(err) = outcome {
                self.telemetry.note("AUTO_RELOAD_FAILED", &err.to_string());
            }
        }
        lock_unpoisoned(&self.state).known_rule_ids = current;
    }
}

impl Drop for HotReloadController {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// SECTION: Lock Helper
// ============================================================================

/// Acquires a mutex guard, recovering from poisoning.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
