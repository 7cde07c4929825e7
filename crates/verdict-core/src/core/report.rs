// crates/verdict-core/src/core/report.rs
// ============================================================================
// Module: Verdict Error Reports
// Description: Uniform caller-visible failure shape with stable codes.
// Purpose: Serialize surfaceable errors as {error_type, message, error_code,
//          context} for the transport edge.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every error Verdict surfaces to a caller converts into an [`ErrorReport`]:
//! a stable `error_code` for programmatic handling, a narrative `message`
//! that may vary between releases, and a structured `context` bag. Component
//! error enums implement [`Reportable`] to produce it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Report Shape
// ============================================================================

/// Serializable failure shape surfaced to callers.
///
/// # Invariants
/// - `error_code` is stable across releases; `message` is narrative only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error kind label (e.g. `"validation"`, `"compilation"`).
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
    /// Stable machine-readable code.
    pub error_code: String,
    /// Structured context bag.
    pub context: Map<String, Value>,
}

impl ErrorReport {
    /// Creates a report with an empty context bag.
    #[must_use]
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            error_code: error_code.into(),
            context: Map::new(),
        }
    }

    /// Adds one context entry and returns the report.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Conversion into the uniform caller-visible failure shape.
pub trait Reportable {
    /// Returns the stable machine-readable error code.
    fn error_code(&self) -> &'static str;

    /// Renders the error as a serializable report.
    fn to_report(&self) -> ErrorReport;
}
