// crates/verdict-core/src/lib.rs
// ============================================================================
// Module: Verdict Core
// Description: Rule-execution runtime and lifecycle control plane.
// Purpose: Compile, evaluate, cache, hot-reload, route, and version
//          business rules with injected collaborators.
// Dependencies: bigdecimal, regex, serde, serde_jcs, serde_json, sha2,
//               thiserror, time
// ============================================================================

//! ## Overview
//! Verdict executes operator-defined business rules: each rule is a
//! predicate with a weighted score and an action token, grouped into
//! rulesets whose actionsets map concatenated token patterns to
//! recommendations. This crate is the hard core — the compiler, predicate
//! evaluator, execution engine, in-memory registry, hot-reload controller,
//! A/B router, and version control — expressed over backend-agnostic
//! interfaces so every collaborator is injected and testable.
//!
//! The transport edge, management CRUD surface, and physical persistence
//! schema live outside this crate; see [`interfaces`] for the contracts
//! they implement.

/// Canonical data model.
pub mod core;
/// Backend-agnostic collaborator contracts.
pub mod interfaces;
/// Executable runtime.
pub mod runtime;

pub use crate::core::ActionsetEntry;
pub use crate::core::AttributeId;
pub use crate::core::AttributeKind;
pub use crate::core::AttributeRecord;
pub use crate::core::AbTestRecord;
pub use crate::core::BatchSummary;
pub use crate::core::BooleanMode;
pub use crate::core::ConditionId;
pub use crate::core::ConditionOperator;
pub use crate::core::ConditionRecord;
pub use crate::core::ConditionRefs;
pub use crate::core::ConsumerId;
pub use crate::core::ConsumerRecord;
pub use crate::core::CorrelationId;
pub use crate::core::DryRunEntry;
pub use crate::core::ErrorReport;
pub use crate::core::EvaluationRequest;
pub use crate::core::EvaluationResult;
pub use crate::core::ExecutionId;
pub use crate::core::ExecutionRecord;
pub use crate::core::FactMap;
pub use crate::core::FlatCondition;
pub use crate::core::HashDigest;
pub use crate::core::Reportable;
pub use crate::core::RuleId;
pub use crate::core::RuleRecord;
pub use crate::core::RuleStatus;
pub use crate::core::RuleVersionRecord;
pub use crate::core::RulesetId;
pub use crate::core::RulesetRecord;
pub use crate::core::TestAssignmentRecord;
pub use crate::core::TestId;
pub use crate::core::TestStatus;
pub use crate::core::Timestamp;
pub use crate::core::Variant;
pub use crate::interfaces::ChangeAudit;
pub use crate::interfaces::Clock;
pub use crate::interfaces::ConfigSource;
pub use crate::interfaces::EngineMetric;
pub use crate::interfaces::EngineTelemetry;
pub use crate::interfaces::ExecutionFilter;
pub use crate::interfaces::ExecutionSink;
pub use crate::interfaces::NoopTelemetry;
pub use crate::interfaces::NullExecutionSink;
pub use crate::interfaces::RollbackPlan;
pub use crate::interfaces::RuleFilter;
pub use crate::interfaces::RuleStore;
pub use crate::interfaces::RulesetFilter;
pub use crate::interfaces::SourceError;
pub use crate::interfaces::SourceKind;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::SystemClock;
pub use crate::interfaces::TestFilter;
