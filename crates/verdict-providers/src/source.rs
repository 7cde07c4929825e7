// crates/verdict-providers/src/source.rs
// ============================================================================
// Module: Verdict Config Sources
// Description: File, inline, and store-backed configuration sources.
// Purpose: Serve normalized rule documents behind the narrow source
//          interface.
// Dependencies: serde_json, verdict-core
// ============================================================================

//! ## Overview
//! Three [`ConfigSource`] implementations: [`FileConfigSource`] reads one
//! JSON document under size and encoding guards, [`InlineConfigSource`]
//! serves an in-memory document for tests and embedding, and
//! [`StoreConfigSource`] adapts the authoritative store. All of them return
//! already-normalized records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use verdict_core::ActionsetEntry;
use verdict_core::ConditionRecord;
use verdict_core::ConfigSource;
use verdict_core::RuleFilter;
use verdict_core::RuleRecord;
use verdict_core::RuleStore;
use verdict_core::RulesetFilter;
use verdict_core::RulesetId;
use verdict_core::SourceError;
use verdict_core::SourceKind;

use crate::normalize;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted document size in bytes.
const MAX_DOCUMENT_BYTES: u64 = 4 * 1_048_576;

// ============================================================================
// SECTION: File Source
// ============================================================================

/// File-backed configuration source.
///
/// # Invariants
/// - The document is re-read on every call; callers cache at a higher
///   layer when needed.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    /// Path to the JSON document.
    path: PathBuf,
    /// Ruleset the document's rules and patterns belong to.
    ruleset_id: RulesetId,
}

impl FileConfigSource {
    /// Creates a file source for the given document and owning ruleset.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, ruleset_id: RulesetId) -> Self {
        Self {
            path: path.into(),
            ruleset_id,
        }
    }

    /// Reads and parses the backing document.
    fn document(&self) -> Result<Value, SourceError> {
        read_json_document(&self.path)
    }
}

impl ConfigSource for FileConfigSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn read_rules_set(&self) -> Result<Vec<RuleRecord>, SourceError> {
        normalize::normalize_rules_set(&self.document()?, self.ruleset_id)
    }

    fn read_conditions_set(&self) -> Result<Vec<ConditionRecord>, SourceError> {
        normalize::normalize_conditions_set(&self.document()?)
    }

    fn read_patterns(&self) -> Result<Vec<ActionsetEntry>, SourceError> {
        normalize::normalize_patterns(&self.document()?, self.ruleset_id)
    }

    fn read_json(&self, key: &str) -> Result<Value, SourceError> {
        let document = self.document()?;
        document
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::Invalid(format!("document lacks key `{key}`")))
    }
}

/// Reads one JSON document under size and encoding guards.
fn read_json_document(path: &Path) -> Result<Value, SourceError> {
    let metadata = fs::metadata(path).map_err(|err| SourceError::Io(err.to_string()))?;
    if metadata.len() > MAX_DOCUMENT_BYTES {
        return Err(SourceError::Access(format!(
            "document exceeds size limit: {} bytes (max {MAX_DOCUMENT_BYTES})",
            metadata.len()
        )));
    }
    let bytes = fs::read(path).map_err(|err| SourceError::Io(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| SourceError::Invalid(err.to_string()))
}

// ============================================================================
// SECTION: Inline Source
// ============================================================================

/// In-memory configuration source for tests and embedded deployments.
#[derive(Debug, Clone)]
pub struct InlineConfigSource {
    /// The backing document.
    document: Value,
    /// Ruleset the document's rules and patterns belong to.
    ruleset_id: RulesetId,
}

impl InlineConfigSource {
    /// Creates an inline source over the given document.
    #[must_use]
    pub const fn new(document: Value, ruleset_id: RulesetId) -> Self {
        Self {
            document,
            ruleset_id,
        }
    }
}

impl ConfigSource for InlineConfigSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Inline
    }

    fn read_rules_set(&self) -> Result<Vec<RuleRecord>, SourceError> {
        normalize::normalize_rules_set(&self.document, self.ruleset_id)
    }

    fn read_conditions_set(&self) -> Result<Vec<ConditionRecord>, SourceError> {
        normalize::normalize_conditions_set(&self.document)
    }

    fn read_patterns(&self) -> Result<Vec<ActionsetEntry>, SourceError> {
        normalize::normalize_patterns(&self.document, self.ruleset_id)
    }

    fn read_json(&self, key: &str) -> Result<Value, SourceError> {
        self.document
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::Invalid(format!("document lacks key `{key}`")))
    }
}

// ============================================================================
// SECTION: Store Source
// ============================================================================

/// Adapter serving the authoritative store through the source interface.
pub struct StoreConfigSource {
    /// Backing store.
    store: Arc<dyn RuleStore>,
    /// Optional ruleset scope for rules and patterns.
    ruleset_id: Option<RulesetId>,
}

impl StoreConfigSource {
    /// Creates a store source, optionally scoped to one ruleset.
    #[must_use]
    pub fn new(store: Arc<dyn RuleStore>, ruleset_id: Option<RulesetId>) -> Self {
        Self {
            store,
            ruleset_id,
        }
    }

    /// Maps a store failure into a source error.
    fn store_error(err: &verdict_core::StoreError) -> SourceError {
        SourceError::Io(err.to_string())
    }
}

impl ConfigSource for StoreConfigSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Database
    }

    fn read_rules_set(&self) -> Result<Vec<RuleRecord>, SourceError> {
        self.store
            .list_active_rules(&RuleFilter {
                rule_id: None,
                ruleset_id: self.ruleset_id,
            })
            .map_err(|err| Self::store_error(&err))
    }

    fn read_conditions_set(&self) -> Result<Vec<ConditionRecord>, SourceError> {
        self.store.list_conditions().map_err(|err| Self::store_error(&err))
    }

    fn read_patterns(&self) -> Result<Vec<ActionsetEntry>, SourceError> {
        let rulesets = match self.ruleset_id {
            Some(ruleset_id) => vec![ruleset_id],
            None => self
                .store
                .list_active_rulesets(&RulesetFilter::default())
                .map_err(|err| Self::store_error(&err))?
                .into_iter()
                .map(|ruleset| ruleset.id)
                .collect(),
        };
        let mut entries = Vec::new();
        for ruleset_id in rulesets {
            entries.extend(
                self.store.list_actionset(ruleset_id).map_err(|err| Self::store_error(&err))?,
            );
        }
        Ok(entries)
    }

    fn read_json(&self, key: &str) -> Result<Value, SourceError> {
        match key {
            "rules_set" => serde_json::to_value(self.read_rules_set()?)
                .map_err(|err| SourceError::Invalid(err.to_string())),
            "conditions_set" => serde_json::to_value(self.read_conditions_set()?)
                .map_err(|err| SourceError::Invalid(err.to_string())),
            "patterns" => serde_json::to_value(self.read_patterns()?)
                .map_err(|err| SourceError::Invalid(err.to_string())),
            other => Err(SourceError::Invalid(format!("unknown document key `{other}`"))),
        }
    }
}
