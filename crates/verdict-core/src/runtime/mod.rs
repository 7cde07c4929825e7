// crates/verdict-core/src/runtime/mod.rs
// ============================================================================
// Module: Verdict Runtime
// Description: Executable side of the rule platform.
// Purpose: Re-export the compiler, evaluator, registry, engine, and
//          lifecycle services.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! The runtime turns declarative records into executable state: the compiler
//! lowers rules to predicates, the registry serves them as coherent
//! snapshots, the engine evaluates them, and the controller, router, and
//! version control drive their lifecycle.

/// A/B test routing and lifecycle.
pub mod abtest;
/// Rule compilation.
pub mod compiler;
/// Execution engine.
pub mod engine;
/// Predicate evaluation.
pub mod evaluator;
/// Reference in-memory store.
pub mod memstore;
/// Registry cache and subscriptions.
pub mod registry;
/// Hot-reload controller.
pub mod reload;
/// Action-result templates.
pub mod template;
/// Read-only rule validation.
pub mod validator;
/// Version history and rollback.
pub mod versioning;

pub use self::abtest::AbTestError;
pub use self::abtest::AbTestRouter;
pub use self::abtest::TestMetrics;
pub use self::abtest::TestSpec;
pub use self::compiler::CompileError;
pub use self::compiler::PreparedRule;
pub use self::compiler::compile_rule;
pub use self::compiler::compile_rules;
pub use self::compiler::rules_fingerprint;
pub use self::engine::EngineError;
pub use self::engine::ExecutionEngine;
pub use self::evaluator::EvalFault;
pub use self::evaluator::evaluate_predicate;
pub use self::memstore::InMemoryRuleStore;
pub use self::registry::CachedRule;
pub use self::registry::ChannelSubscriber;
pub use self::registry::RegistryEvent;
pub use self::registry::RegistryStats;
pub use self::registry::RuleRegistry;
pub use self::reload::HotReloadController;
pub use self::reload::ReloadConfig;
pub use self::reload::ReloadError;
pub use self::reload::ReloadOptions;
pub use self::reload::ReloadResult;
pub use self::validator::ValidationReport;
pub use self::validator::validate_rules;
pub use self::versioning::VersionControl;
pub use self::versioning::VersionDiff;
pub use self::versioning::VersionError;
