// crates/verdict-providers/src/lib.rs
// ============================================================================
// Module: Verdict Providers
// Description: Configuration sources for rules, conditions, and actionsets.
// Purpose: Normalize file, inline, and store-backed rule documents behind
//          one narrow interface.
// Dependencies: serde_json, verdict-core
// ============================================================================

//! ## Overview
//! Providers implement [`verdict_core::ConfigSource`]: four operations
//! returning already-normalized records. The file and inline sources read a
//! single JSON document with `rules_set`, `conditions_set`, and `patterns`
//! top-level keys; the store source adapts a live
//! [`verdict_core::RuleStore`]. Callers never see the backing
//! representation.

/// Document normalization into core records.
pub mod normalize;
/// File, inline, and store-backed sources.
pub mod source;

pub use crate::source::FileConfigSource;
pub use crate::source::InlineConfigSource;
pub use crate::source::StoreConfigSource;
