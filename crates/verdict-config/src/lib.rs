// crates/verdict-config/src/lib.rs
// ============================================================================
// Module: Verdict Config
// Description: Runtime configuration loading and validation.
// Purpose: Load TOML configuration with strict guards and fail-closed
//          validation.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration for the Verdict runtime: engine defaults, hot-reload
//! cadence, store settings, and A/B defaults. Loading is strict and
//! fail-closed — oversized files, non-UTF-8 content, overlong paths, and
//! out-of-range values are all rejected before any value reaches a
//! collaborator.

/// Configuration types and loader.
pub mod config;

pub use crate::config::AbSection;
pub use crate::config::ConfigError;
pub use crate::config::EngineSection;
pub use crate::config::ReloadSection;
pub use crate::config::StoreSection;
pub use crate::config::VerdictConfig;
