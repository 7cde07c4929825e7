// crates/verdict-store-sqlite/src/lib.rs
// ============================================================================
// Module: Verdict SQLite Store
// Description: Durable RuleStore backed by SQLite WAL.
// Purpose: Persist rules, rulesets, versions, tests, and execution logs
//          with transactional compound mutations.
// Dependencies: rusqlite, serde_json, verdict-core
// ============================================================================

//! ## Overview
//! A durable [`verdict_core::RuleStore`] over SQLite: WAL by default, busy
//! timeout, schema versioning, and single-transaction compound mutations
//! (rule writes with version snapshots, rollbacks, assignment inserts).
//! Execution-log persistence runs through a buffered writer that never
//! blocks the evaluation path and sheds oldest entries under backpressure.

/// Buffered execution-log writer.
pub mod logwriter;
/// Store implementation and schema.
pub mod store;

pub use crate::logwriter::BufferedLogWriter;
pub use crate::store::SqliteRuleStore;
pub use crate::store::SqliteStoreConfig;
pub use crate::store::SqliteStoreError;
