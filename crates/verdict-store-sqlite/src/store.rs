// crates/verdict-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Rule Store
// Description: Durable RuleStore over SQLite WAL.
// Purpose: Persist the full rule lifecycle with transactional compound
//          mutations.
// Dependencies: rusqlite, serde, serde_json, thiserror, verdict-core
// ============================================================================

//! ## Overview
//! One writer connection behind a mutex serves every operation; WAL keeps
//! readers of the same file unblocked. Compound mutations — a rule write
//! with its version snapshot, a rollback, a first-time assignment — run as
//! single transactions, and uniqueness races surface as
//! [`StoreError::Conflict`] so callers can re-read the winner.
//!
//! Timestamps persist as canonical JSON text to keep logical and wall-clock
//! values round-trippable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use verdict_core::AbTestRecord;
use verdict_core::ActionsetEntry;
use verdict_core::AttributeId;
use verdict_core::AttributeRecord;
use verdict_core::ChangeAudit;
use verdict_core::ConditionId;
use verdict_core::ConditionRecord;
use verdict_core::ConsumerId;
use verdict_core::ConsumerRecord;
use verdict_core::ExecutionRecord;
use verdict_core::RollbackPlan;
use verdict_core::RuleFilter;
use verdict_core::RuleId;
use verdict_core::RuleRecord;
use verdict_core::RuleStore;
use verdict_core::RuleVersionRecord;
use verdict_core::RulesetFilter;
use verdict_core::RulesetId;
use verdict_core::RulesetRecord;
use verdict_core::StoreError;
use verdict_core::TestAssignmentRecord;
use verdict_core::TestFilter;
use verdict_core::TestId;
use verdict_core::Timestamp;
use verdict_core::Variant;
use verdict_core::interfaces::AssignmentCounts;
use verdict_core::interfaces::ExecutionFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLite schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// SQLite journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to SQLite `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to SQLite `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the SQLite rule store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds and must be non-zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// SQLite sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config with defaults for the given database path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for SQLite connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw fact data.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Uniqueness constraint rejected the write.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

/// Maps a rusqlite error, classifying uniqueness violations as conflicts.
fn db_error(error: &rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error
        && failure.code == ErrorCode::ConstraintViolation
    {
        return StoreError::Conflict(error.to_string());
    }
    StoreError::Store(error.to_string())
}

// ============================================================================
// SECTION: Value Codecs
// ============================================================================

/// Renders a timestamp as canonical JSON text.
fn timestamp_text(timestamp: Timestamp) -> String {
    serde_json::to_string(&timestamp)
        .unwrap_or_else(|_| r#"{"kind":"logical","value":0}"#.to_string())
}

/// Parses a timestamp from its JSON text form.
fn timestamp_of(text: &str) -> Timestamp {
    serde_json::from_str(text).unwrap_or(Timestamp::Logical(0))
}

/// Renders an optional JSON value as text.
fn json_text(value: Option<&serde_json::Value>) -> Option<String> {
    value.map(std::string::ToString::to_string)
}

/// Parses an optional JSON text column.
fn json_of(text: Option<String>) -> Option<serde_json::Value> {
    text.and_then(|raw| serde_json::from_str(&raw).ok())
}

/// Parses an enum from its wire string.
fn enum_of<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| StoreError::Invalid(format!("unknown {what} `{raw}`")))
}

/// Renders an enum as its wire string.
fn enum_text<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => text,
        _ => String::new(),
    }
}

/// Converts a `u64` domain value into its `i64` storage form (SQLite integers are signed).
fn i64_of(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Converts a stored `i64` column value back into its `u64` domain form.
fn u64_of(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed rule store with WAL support.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Compound mutations are single transactions.
#[derive(Clone)]
pub struct SqliteRuleStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRuleStore {
    /// Opens (and migrates) a store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the file cannot be opened, a pragma
    /// fails, or the on-disk schema version is ahead of this build.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let connection = Connection::open(&config.path)
            .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Self::initialize(connection, config)
    }

    /// Opens an in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when initialization fails.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection = Connection::open_in_memory()
            .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Self::initialize(connection, &SqliteStoreConfig::new(Path::new(":memory:")))
    }

    /// Applies pragmas and the schema to a fresh connection.
    fn initialize(
        connection: Connection,
        config: &SqliteStoreConfig,
    ) -> Result<Self, SqliteStoreError> {
        connection
            .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "synchronous", config.sync_mode.pragma_value())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "foreign_keys", "on")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        let on_disk: i64 = connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if on_disk > SCHEMA_VERSION {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "on-disk schema {on_disk} is newer than supported {SCHEMA_VERSION}"
            )));
        }
        if on_disk < SCHEMA_VERSION {
            connection
                .execute_batch(SCHEMA_SQL)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            connection
                .pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Acquires the connection guard, recovering from poisoning.
    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.connection.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Schema applied to fresh databases.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS rulesets (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    version TEXT NOT NULL,
    status TEXT NOT NULL,
    tenant_id TEXT,
    is_default INTEGER NOT NULL DEFAULT 0,
    tags TEXT,
    metadata TEXT
);
CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_id TEXT NOT NULL UNIQUE,
    rule_name TEXT NOT NULL,
    ruleset_id INTEGER NOT NULL REFERENCES rulesets(id) ON DELETE CASCADE,
    conditions TEXT,
    attribute TEXT,
    operator TEXT,
    constant TEXT,
    message TEXT,
    rule_point INTEGER NOT NULL DEFAULT 0,
    weight REAL NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    action_result TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT '1.0',
    tags TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_rules_status ON rules(status);
CREATE INDEX IF NOT EXISTS idx_rules_ruleset ON rules(ruleset_id);
CREATE TABLE IF NOT EXISTS conditions (
    condition_id TEXT PRIMARY KEY,
    condition_name TEXT NOT NULL,
    attribute TEXT NOT NULL,
    operator TEXT NOT NULL,
    constant TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS attributes (
    attribute_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    data_type TEXT NOT NULL,
    status TEXT NOT NULL,
    description TEXT
);
CREATE TABLE IF NOT EXISTS patterns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ruleset_id INTEGER NOT NULL REFERENCES rulesets(id) ON DELETE CASCADE,
    pattern_key TEXT NOT NULL,
    action_recommendation TEXT NOT NULL,
    description TEXT,
    UNIQUE(ruleset_id, pattern_key)
);
CREATE TABLE IF NOT EXISTS rule_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_id TEXT NOT NULL,
    version_number INTEGER NOT NULL,
    rule_name TEXT NOT NULL,
    attribute TEXT,
    operator TEXT,
    constant TEXT,
    message TEXT,
    weight REAL NOT NULL,
    rule_point INTEGER NOT NULL,
    priority INTEGER NOT NULL,
    action_result TEXT NOT NULL,
    status TEXT NOT NULL,
    version TEXT NOT NULL,
    ruleset_id INTEGER NOT NULL,
    is_current INTEGER NOT NULL,
    change_reason TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(rule_id, version_number)
);
CREATE INDEX IF NOT EXISTS idx_rule_versions_current ON rule_versions(rule_id, is_current);
CREATE TABLE IF NOT EXISTS ab_tests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_id TEXT NOT NULL UNIQUE,
    test_name TEXT NOT NULL,
    description TEXT,
    rule_id TEXT NOT NULL,
    ruleset_id INTEGER NOT NULL,
    traffic_split_a REAL NOT NULL,
    traffic_split_b REAL NOT NULL,
    variant_a_version TEXT NOT NULL,
    variant_b_version TEXT NOT NULL,
    status TEXT NOT NULL,
    start_time TEXT,
    end_time TEXT,
    duration_hours INTEGER,
    min_sample_size INTEGER,
    confidence_level REAL NOT NULL,
    winning_variant TEXT,
    statistical_significance REAL
);
CREATE TABLE IF NOT EXISTS test_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ab_test_id INTEGER NOT NULL REFERENCES ab_tests(id) ON DELETE CASCADE,
    assignment_key TEXT NOT NULL,
    variant TEXT NOT NULL,
    assigned_at TEXT NOT NULL,
    execution_count INTEGER NOT NULL DEFAULT 0,
    last_execution_at TEXT NOT NULL,
    UNIQUE(ab_test_id, assignment_key)
);
CREATE TABLE IF NOT EXISTS execution_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL,
    input_data TEXT NOT NULL,
    output_data TEXT NOT NULL,
    ruleset_id INTEGER NOT NULL,
    total_points REAL NOT NULL,
    pattern_result TEXT NOT NULL,
    execution_time_ms REAL NOT NULL,
    success INTEGER NOT NULL,
    ab_test_id INTEGER,
    ab_test_variant TEXT,
    consumer_id TEXT,
    correlation_id TEXT,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_execution_logs_test ON execution_logs(ab_test_id, ab_test_variant);
CREATE TABLE IF NOT EXISTS consumers (
    consumer_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS consumer_usage (
    consumer_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    execution_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (consumer_id, rule_id)
);
";

// ============================================================================
// SECTION: Row Mappers
// ============================================================================

/// Maps one `rules` row.
fn rule_of_row(row: &Row<'_>) -> Result<RuleRecord, rusqlite::Error> {
    let ruleset_raw: u64 = u64_of(row.get("ruleset_id")?);
    let operator_raw: Option<String> = row.get("operator")?;
    let attribute_raw: Option<String> = row.get("attribute")?;
    let flat = match (attribute_raw, operator_raw) {
        (Some(attribute), Some(operator)) => {
            let operator = enum_of(&operator, "operator").map_err(invalid_column)?;
            Some(verdict_core::FlatCondition {
                attribute: verdict_core::AttributeId::new(attribute),
                operator,
                constant: row.get::<_, Option<String>>("constant")?.unwrap_or_default(),
                message: row.get("message")?,
            })
        }
        _ => None,
    };
    let status_raw: String = row.get("status")?;
    Ok(RuleRecord {
        row_id: row.get("id")?,
        rule_id: RuleId::new(row.get::<_, String>("rule_id")?),
        rule_name: row.get("rule_name")?,
        ruleset_id: RulesetId::from_raw(ruleset_raw)
            .ok_or_else(|| invalid_column(StoreError::Invalid("zero ruleset id".to_string())))?,
        conditions: json_of(row.get("conditions")?),
        flat,
        rule_point: row.get("rule_point")?,
        weight: row.get("weight")?,
        priority: row.get("priority")?,
        action_result: row.get("action_result")?,
        status: enum_of(&status_raw, "rule status").map_err(invalid_column)?,
        version: row.get("version")?,
        tags: json_of(row.get("tags")?)
            .and_then(|value| serde_json::from_value(value).ok()),
        metadata: json_of(row.get("metadata")?),
    })
}

/// Maps one `rulesets` row.
fn ruleset_of_row(row: &Row<'_>) -> Result<RulesetRecord, rusqlite::Error> {
    let id_raw: u64 = u64_of(row.get("id")?);
    let status_raw: String = row.get("status")?;
    Ok(RulesetRecord {
        id: RulesetId::from_raw(id_raw)
            .ok_or_else(|| invalid_column(StoreError::Invalid("zero ruleset id".to_string())))?,
        name: row.get("name")?,
        description: row.get("description")?,
        version: row.get("version")?,
        status: enum_of(&status_raw, "ruleset status").map_err(invalid_column)?,
        tenant_id: row.get("tenant_id")?,
        is_default: row.get("is_default")?,
        tags: json_of(row.get("tags")?)
            .and_then(|value| serde_json::from_value(value).ok()),
        metadata: json_of(row.get("metadata")?),
    })
}

/// Maps one `rule_versions` row.
fn version_of_row(row: &Row<'_>) -> Result<RuleVersionRecord, rusqlite::Error> {
    let ruleset_raw: u64 = u64_of(row.get("ruleset_id")?);
    let status_raw: String = row.get("status")?;
    let operator_raw: Option<String> = row.get("operator")?;
    let condition = match operator_raw {
        Some(raw) => Some(enum_of(&raw, "operator").map_err(invalid_column)?),
        None => None,
    };
    let created_at_raw: String = row.get("created_at")?;
    Ok(RuleVersionRecord {
        rule_id: RuleId::new(row.get::<_, String>("rule_id")?),
        version_number: row.get("version_number")?,
        rule_name: row.get("rule_name")?,
        attribute: row.get("attribute")?,
        condition,
        constant: row.get("constant")?,
        message: row.get("message")?,
        weight: row.get("weight")?,
        rule_point: row.get("rule_point")?,
        priority: row.get("priority")?,
        action_result: row.get("action_result")?,
        status: enum_of(&status_raw, "rule status").map_err(invalid_column)?,
        version: row.get("version")?,
        ruleset_id: RulesetId::from_raw(ruleset_raw)
            .ok_or_else(|| invalid_column(StoreError::Invalid("zero ruleset id".to_string())))?,
        is_current: row.get("is_current")?,
        change_reason: row.get("change_reason")?,
        created_by: row.get("created_by")?,
        created_at: timestamp_of(&created_at_raw),
    })
}

/// Maps one `ab_tests` row.
fn test_of_row(row: &Row<'_>) -> Result<AbTestRecord, rusqlite::Error> {
    let ruleset_raw: u64 = u64_of(row.get("ruleset_id")?);
    let status_raw: String = row.get("status")?;
    let winning_raw: Option<String> = row.get("winning_variant")?;
    let winning_variant = match winning_raw.as_deref() {
        Some("A") => Some(Variant::A),
        Some("B") => Some(Variant::B),
        _ => None,
    };
    Ok(AbTestRecord {
        row_id: row.get("id")?,
        test_id: TestId::new(row.get::<_, String>("test_id")?),
        test_name: row.get("test_name")?,
        description: row.get("description")?,
        rule_id: RuleId::new(row.get::<_, String>("rule_id")?),
        ruleset_id: RulesetId::from_raw(ruleset_raw)
            .ok_or_else(|| invalid_column(StoreError::Invalid("zero ruleset id".to_string())))?,
        traffic_split_a: row.get("traffic_split_a")?,
        traffic_split_b: row.get("traffic_split_b")?,
        variant_a_version: row.get("variant_a_version")?,
        variant_b_version: row.get("variant_b_version")?,
        status: enum_of(&status_raw, "test status").map_err(invalid_column)?,
        start_time: row.get::<_, Option<String>>("start_time")?.map(|raw| timestamp_of(&raw)),
        end_time: row.get::<_, Option<String>>("end_time")?.map(|raw| timestamp_of(&raw)),
        duration_hours: row.get("duration_hours")?,
        min_sample_size: row.get::<_, Option<i64>>("min_sample_size")?.map(u64_of),
        confidence_level: row.get("confidence_level")?,
        winning_variant,
        statistical_significance: row.get("statistical_significance")?,
    })
}

/// Maps one `test_assignments` row.
fn assignment_of_row(row: &Row<'_>) -> Result<TestAssignmentRecord, rusqlite::Error> {
    let variant_raw: String = row.get("variant")?;
    let assigned_raw: String = row.get("assigned_at")?;
    let last_raw: String = row.get("last_execution_at")?;
    Ok(TestAssignmentRecord {
        ab_test_id: row.get("ab_test_id")?,
        assignment_key: row.get("assignment_key")?,
        variant: if variant_raw == "A" { Variant::A } else { Variant::B },
        assigned_at: timestamp_of(&assigned_raw),
        execution_count: u64_of(row.get("execution_count")?),
        last_execution_at: timestamp_of(&last_raw),
    })
}

/// Maps one `execution_logs` row.
fn execution_of_row(row: &Row<'_>) -> Result<ExecutionRecord, rusqlite::Error> {
    let ruleset_raw: u64 = u64_of(row.get("ruleset_id")?);
    let variant_raw: Option<String> = row.get("ab_test_variant")?;
    let timestamp_raw: String = row.get("timestamp")?;
    Ok(ExecutionRecord {
        execution_id: verdict_core::ExecutionId::new(row.get::<_, String>("execution_id")?),
        input_data: json_of(row.get("input_data")?).unwrap_or(serde_json::Value::Null),
        output_data: json_of(row.get("output_data")?).unwrap_or(serde_json::Value::Null),
        ruleset_id: RulesetId::from_raw(ruleset_raw)
            .ok_or_else(|| invalid_column(StoreError::Invalid("zero ruleset id".to_string())))?,
        total_points: row.get("total_points")?,
        pattern_result: row.get("pattern_result")?,
        execution_time_ms: row.get("execution_time_ms")?,
        success: row.get("success")?,
        ab_test_id: row.get("ab_test_id")?,
        ab_test_variant: variant_raw.map(|raw| if raw == "A" { Variant::A } else { Variant::B }),
        consumer_id: row
            .get::<_, Option<String>>("consumer_id")?
            .map(verdict_core::ConsumerId::new),
        correlation_id: row
            .get::<_, Option<String>>("correlation_id")?
            .map(verdict_core::CorrelationId::new),
        timestamp: timestamp_of(&timestamp_raw),
    })
}

/// Wraps a store error into a rusqlite conversion failure.
fn invalid_column(error: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
    )
}

// ============================================================================
// SECTION: Version Helpers
// ============================================================================

/// Inserts a version snapshot as `max + 1` and flips prior currents.
fn insert_version(
    transaction: &Transaction<'_>,
    snapshot: &RuleVersionRecord,
) -> Result<RuleVersionRecord, StoreError> {
    let next_number: u32 = transaction
        .query_row(
            "SELECT COALESCE(MAX(version_number), 0) + 1 FROM rule_versions WHERE rule_id = ?1",
            params![snapshot.rule_id.as_str()],
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))?;
    transaction
        .execute(
            "UPDATE rule_versions SET is_current = 0 WHERE rule_id = ?1",
            params![snapshot.rule_id.as_str()],
        )
        .map_err(|err| db_error(&err))?;
    transaction
        .execute(
            "INSERT INTO rule_versions (rule_id, version_number, rule_name, attribute, operator,
                 constant, message, weight, rule_point, priority, action_result, status, version,
                 ruleset_id, is_current, change_reason, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1, ?15, ?16, ?17)",
            params![
                snapshot.rule_id.as_str(),
                next_number,
                snapshot.rule_name,
                snapshot.attribute,
                snapshot.condition.map(|operator| operator.as_str()),
                snapshot.constant,
                snapshot.message,
                snapshot.weight,
                snapshot.rule_point,
                snapshot.priority,
                snapshot.action_result,
                snapshot.status.as_str(),
                snapshot.version,
                i64_of(snapshot.ruleset_id.get()),
                snapshot.change_reason,
                snapshot.created_by,
                timestamp_text(snapshot.created_at),
            ],
        )
        .map_err(|err| db_error(&err))?;
    let mut stored = snapshot.clone();
    stored.version_number = next_number;
    stored.is_current = true;
    Ok(stored)
}

/// Writes a rule row (insert or update keyed by `rule_id`).
fn write_rule_row(
    transaction: &Transaction<'_>,
    record: &RuleRecord,
) -> Result<i64, StoreError> {
    transaction
        .execute(
            "INSERT INTO rules (rule_id, rule_name, ruleset_id, conditions, attribute, operator,
                 constant, message, rule_point, weight, priority, action_result, status, version,
                 tags, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(rule_id) DO UPDATE SET
                 rule_name = excluded.rule_name,
                 ruleset_id = excluded.ruleset_id,
                 conditions = excluded.conditions,
                 attribute = excluded.attribute,
                 operator = excluded.operator,
                 constant = excluded.constant,
                 message = excluded.message,
                 rule_point = excluded.rule_point,
                 weight = excluded.weight,
                 priority = excluded.priority,
                 action_result = excluded.action_result,
                 status = excluded.status,
                 version = excluded.version,
                 tags = excluded.tags,
                 metadata = excluded.metadata",
            params![
                record.rule_id.as_str(),
                record.rule_name,
                i64_of(record.ruleset_id.get()),
                json_text(record.conditions.as_ref()),
                record.flat.as_ref().map(|flat| flat.attribute.as_str()),
                record.flat.as_ref().map(|flat| flat.operator.as_str()),
                record.flat.as_ref().map(|flat| flat.constant.as_str()),
                record.flat.as_ref().and_then(|flat| flat.message.as_deref()),
                record.rule_point,
                record.weight,
                record.priority,
                record.action_result,
                record.status.as_str(),
                record.version,
                record.tags.as_ref().and_then(|tags| serde_json::to_string(tags).ok()),
                json_text(record.metadata.as_ref()),
            ],
        )
        .map_err(|err| db_error(&err))?;
    transaction
        .query_row(
            "SELECT id FROM rules WHERE rule_id = ?1",
            params![record.rule_id.as_str()],
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))
}

// ============================================================================
// SECTION: RuleStore Implementation
// ============================================================================

impl RuleStore for SqliteRuleStore {
    fn list_active_rules(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT * FROM rules
                 WHERE status = 'active'
                   AND (?1 IS NULL OR rule_id = ?1)
                   AND (?2 IS NULL OR ruleset_id = ?2)
                 ORDER BY priority ASC, rule_id ASC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(
                params![
                    filter.rule_id.as_ref().map(RuleId::as_str),
                    filter.ruleset_id.map(|id| i64_of(id.get())),
                ],
                rule_of_row,
            )
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn list_active_rulesets(
        &self,
        filter: &RulesetFilter,
    ) -> Result<Vec<RulesetRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT * FROM rulesets
                 WHERE status = 'active'
                   AND (?1 IS NULL OR id = ?1)
                   AND (?2 IS NULL OR tenant_id = ?2)
                 ORDER BY id ASC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(
                params![filter.ruleset_id.map(|id| i64_of(id.get())), filter.tenant_id],
                ruleset_of_row,
            )
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn list_conditions(&self) -> Result<Vec<ConditionRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare("SELECT * FROM conditions ORDER BY condition_id ASC")
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map([], |row| {
                let operator_raw: String = row.get("operator")?;
                Ok(ConditionRecord {
                    condition_id: ConditionId::new(row.get::<_, String>("condition_id")?),
                    condition_name: row.get("condition_name")?,
                    attribute: verdict_core::AttributeId::new(
                        row.get::<_, String>("attribute")?,
                    ),
                    operator: enum_of(&operator_raw, "operator").map_err(invalid_column)?,
                    constant: row.get("constant")?,
                })
            })
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn list_actionset(&self, ruleset_id: RulesetId) -> Result<Vec<ActionsetEntry>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT * FROM patterns WHERE ruleset_id = ?1 ORDER BY pattern_key ASC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![i64_of(ruleset_id.get())], |row| {
                let owner_raw: u64 = u64_of(row.get("ruleset_id")?);
                Ok(ActionsetEntry {
                    ruleset_id: RulesetId::from_raw(owner_raw).ok_or_else(|| {
                        invalid_column(StoreError::Invalid("zero ruleset id".to_string()))
                    })?,
                    pattern_key: row.get("pattern_key")?,
                    action_recommendation: row.get("action_recommendation")?,
                    description: row.get("description")?,
                })
            })
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn get_rule(&self, rule_id: &RuleId) -> Result<Option<RuleRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row(
                "SELECT * FROM rules WHERE rule_id = ?1",
                params![rule_id.as_str()],
                rule_of_row,
            )
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn get_ruleset_by_name(&self, name: &str) -> Result<Option<RulesetRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row("SELECT * FROM rulesets WHERE name = ?1", params![name], |row| {
                ruleset_of_row(row)
            })
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn active_rule_ids(&self) -> Result<BTreeSet<RuleId>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare("SELECT rule_id FROM rules WHERE status = 'active'")
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| db_error(&err))?;
        rows.map(|row| row.map(RuleId::new))
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|err| db_error(&err))
    }

    fn upsert_rule(
        &self,
        record: &RuleRecord,
        audit: &ChangeAudit,
    ) -> Result<RuleVersionRecord, StoreError> {
        let mut connection = self.conn();
        let transaction = connection.transaction().map_err(|err| db_error(&err))?;
        write_rule_row(&transaction, record)?;
        let mut snapshot = RuleVersionRecord {
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
        };
        snapshot = insert_version(&transaction, &snapshot)?;
        transaction.commit().map_err(|err| db_error(&err))?;
        Ok(snapshot)
    }

    fn delete_rule(&self, rule_id: &RuleId) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute("DELETE FROM rules WHERE rule_id = ?1", params![rule_id.as_str()])
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn upsert_ruleset(&self, record: &RulesetRecord) -> Result<RulesetId, StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO rulesets (id, name, description, version, status, tenant_id,
                     is_default, tags, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     version = excluded.version,
                     status = excluded.status,
                     tenant_id = excluded.tenant_id,
                     is_default = excluded.is_default,
                     tags = excluded.tags,
                     metadata = excluded.metadata",
                params![
                    i64_of(record.id.get()),
                    record.name,
                    record.description,
                    record.version,
                    record.status.as_str(),
                    record.tenant_id,
                    record.is_default,
                    record.tags.as_ref().and_then(|tags| serde_json::to_string(tags).ok()),
                    json_text(record.metadata.as_ref()),
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(record.id)
    }

    fn delete_ruleset(&self, ruleset_id: RulesetId) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute("DELETE FROM rulesets WHERE id = ?1", params![i64_of(ruleset_id.get())])
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn upsert_condition(&self, record: &ConditionRecord) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO conditions (condition_id, condition_name, attribute, operator,
                     constant)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(condition_id) DO UPDATE SET
                     condition_name = excluded.condition_name,
                     attribute = excluded.attribute,
                     operator = excluded.operator,
                     constant = excluded.constant",
                params![
                    record.condition_id.as_str(),
                    record.condition_name,
                    record.attribute.as_str(),
                    record.operator.as_str(),
                    record.constant,
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn delete_condition(&self, condition_id: &ConditionId) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute(
                "DELETE FROM conditions WHERE condition_id = ?1",
                params![condition_id.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn upsert_attribute(&self, record: &AttributeRecord) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO attributes (attribute_id, name, data_type, status, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(attribute_id) DO UPDATE SET
                     name = excluded.name,
                     data_type = excluded.data_type,
                     status = excluded.status,
                     description = excluded.description",
                params![
                    record.attribute_id.as_str(),
                    record.name,
                    enum_text(&record.data_type),
                    record.status.as_str(),
                    record.description,
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn list_attributes(&self) -> Result<Vec<AttributeRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare("SELECT * FROM attributes ORDER BY attribute_id ASC")
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map([], |row| {
                let data_type_raw: String = row.get("data_type")?;
                let status_raw: String = row.get("status")?;
                Ok(AttributeRecord {
                    attribute_id: AttributeId::new(row.get::<_, String>("attribute_id")?),
                    name: row.get("name")?,
                    data_type: enum_of(&data_type_raw, "attribute kind")
                        .map_err(invalid_column)?,
                    status: enum_of(&status_raw, "attribute status").map_err(invalid_column)?,
                    description: row.get("description")?,
                })
            })
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn delete_attribute(&self, attribute_id: &AttributeId) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute(
                "DELETE FROM attributes WHERE attribute_id = ?1",
                params![attribute_id.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn upsert_actionset_entry(&self, entry: &ActionsetEntry) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO patterns (ruleset_id, pattern_key, action_recommendation,
                     description)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(ruleset_id, pattern_key) DO UPDATE SET
                     action_recommendation = excluded.action_recommendation,
                     description = excluded.description",
                params![
                    i64_of(entry.ruleset_id.get()),
                    entry.pattern_key,
                    entry.action_recommendation,
                    entry.description,
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn delete_actionset_entry(
        &self,
        ruleset_id: RulesetId,
        pattern_key: &str,
    ) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute(
                "DELETE FROM patterns WHERE ruleset_id = ?1 AND pattern_key = ?2",
                params![i64_of(ruleset_id.get()), pattern_key],
            )
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn upsert_consumer(&self, record: &ConsumerRecord) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO consumers (consumer_id, name, status)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(consumer_id) DO UPDATE SET
                     name = excluded.name,
                     status = excluded.status",
                params![record.consumer_id.as_str(), record.name, record.status.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn delete_consumer(&self, consumer_id: &ConsumerId) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute(
                "DELETE FROM consumers WHERE consumer_id = ?1",
                params![consumer_id.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn record_rule_usage(
        &self,
        consumer_id: &ConsumerId,
        rule_id: &RuleId,
    ) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO consumer_usage (consumer_id, rule_id, execution_count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(consumer_id, rule_id) DO UPDATE SET
                     execution_count = execution_count + 1",
                params![consumer_id.as_str(), rule_id.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn rule_versions(
        &self,
        rule_id: &RuleId,
        limit: Option<usize>,
    ) -> Result<Vec<RuleVersionRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT * FROM rule_versions WHERE rule_id = ?1
                 ORDER BY version_number DESC LIMIT ?2",
            )
            .map_err(|err| db_error(&err))?;
        let limit = limit.map_or(-1_i64, |value| i64::try_from(value).unwrap_or(i64::MAX));
        let rows = statement
            .query_map(params![rule_id.as_str(), limit], version_of_row)
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn rule_version(
        &self,
        rule_id: &RuleId,
        version_number: u32,
    ) -> Result<Option<RuleVersionRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row(
                "SELECT * FROM rule_versions WHERE rule_id = ?1 AND version_number = ?2",
                params![rule_id.as_str(), version_number],
                version_of_row,
            )
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn rule_version_by_label(
        &self,
        rule_id: &RuleId,
        label: &str,
    ) -> Result<Option<RuleVersionRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row(
                "SELECT * FROM rule_versions WHERE rule_id = ?1 AND version = ?2
                 ORDER BY version_number DESC LIMIT 1",
                params![rule_id.as_str(), label],
                version_of_row,
            )
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn current_rule_version(
        &self,
        rule_id: &RuleId,
    ) -> Result<Option<RuleVersionRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row(
                "SELECT * FROM rule_versions WHERE rule_id = ?1 AND is_current = 1",
                params![rule_id.as_str()],
                version_of_row,
            )
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn apply_rollback(&self, plan: &RollbackPlan) -> Result<RuleRecord, StoreError> {
        let mut connection = self.conn();
        let transaction = connection.transaction().map_err(|err| db_error(&err))?;
        let target_exists: bool = transaction
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM rule_versions
                     WHERE rule_id = ?1 AND version_number = ?2)",
                params![plan.rule_id.as_str(), plan.target_version],
                |row| row.get(0),
            )
            .map_err(|err| db_error(&err))?;
        if !target_exists {
            return Err(StoreError::Missing(format!(
                "version {} of rule `{}`",
                plan.target_version, plan.rule_id
            )));
        }
        let rule_exists: bool = transaction
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM rules WHERE rule_id = ?1)",
                params![plan.rule_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| db_error(&err))?;
        if !rule_exists {
            return Err(StoreError::Missing(format!("rule `{}`", plan.rule_id)));
        }
        write_rule_row(&transaction, &plan.restored)?;
        insert_version(&transaction, &plan.backup)?;
        let restored = transaction
            .query_row(
                "SELECT * FROM rules WHERE rule_id = ?1",
                params![plan.rule_id.as_str()],
                rule_of_row,
            )
            .map_err(|err| db_error(&err))?;
        transaction.commit().map_err(|err| db_error(&err))?;
        Ok(restored)
    }

    fn insert_test(&self, record: &AbTestRecord) -> Result<i64, StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO ab_tests (test_id, test_name, description, rule_id, ruleset_id,
                     traffic_split_a, traffic_split_b, variant_a_version, variant_b_version,
                     status, start_time, end_time, duration_hours, min_sample_size,
                     confidence_level, winning_variant, statistical_significance)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17)",
                params![
                    record.test_id.as_str(),
                    record.test_name,
                    record.description,
                    record.rule_id.as_str(),
                    i64_of(record.ruleset_id.get()),
                    record.traffic_split_a,
                    record.traffic_split_b,
                    record.variant_a_version,
                    record.variant_b_version,
                    record.status.as_str(),
                    record.start_time.map(timestamp_text),
                    record.end_time.map(timestamp_text),
                    record.duration_hours,
                    record.min_sample_size.map(i64_of),
                    record.confidence_level,
                    record.winning_variant.map(Variant::as_str),
                    record.statistical_significance,
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(connection.last_insert_rowid())
    }

    fn update_test(&self, record: &AbTestRecord) -> Result<(), StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute(
                "UPDATE ab_tests SET
                     test_name = ?2,
                     description = ?3,
                     traffic_split_a = ?4,
                     traffic_split_b = ?5,
                     variant_a_version = ?6,
                     variant_b_version = ?7,
                     status = ?8,
                     start_time = ?9,
                     end_time = ?10,
                     duration_hours = ?11,
                     min_sample_size = ?12,
                     confidence_level = ?13,
                     winning_variant = ?14,
                     statistical_significance = ?15
                 WHERE test_id = ?1",
                params![
                    record.test_id.as_str(),
                    record.test_name,
                    record.description,
                    record.traffic_split_a,
                    record.traffic_split_b,
                    record.variant_a_version,
                    record.variant_b_version,
                    record.status.as_str(),
                    record.start_time.map(timestamp_text),
                    record.end_time.map(timestamp_text),
                    record.duration_hours,
                    record.min_sample_size.map(i64_of),
                    record.confidence_level,
                    record.winning_variant.map(Variant::as_str),
                    record.statistical_significance,
                ],
            )
            .map_err(|err| db_error(&err))?;
        if affected == 0 {
            return Err(StoreError::Missing(format!("test `{}`", record.test_id)));
        }
        Ok(())
    }

    fn delete_test(&self, test_id: &TestId) -> Result<bool, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute("DELETE FROM ab_tests WHERE test_id = ?1", params![test_id.as_str()])
            .map_err(|err| db_error(&err))?;
        Ok(affected > 0)
    }

    fn get_test(&self, test_id: &TestId) -> Result<Option<AbTestRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row(
                "SELECT * FROM ab_tests WHERE test_id = ?1",
                params![test_id.as_str()],
                test_of_row,
            )
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn list_tests(&self, filter: &TestFilter) -> Result<Vec<AbTestRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT * FROM ab_tests
                 WHERE (?1 IS NULL OR rule_id = ?1)
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY id DESC LIMIT ?3",
            )
            .map_err(|err| db_error(&err))?;
        let limit =
            filter.limit.map_or(-1_i64, |value| i64::try_from(value).unwrap_or(i64::MAX));
        let rows = statement
            .query_map(
                params![
                    filter.rule_id.as_ref().map(RuleId::as_str),
                    filter.status.map(verdict_core::TestStatus::as_str),
                    limit,
                ],
                test_of_row,
            )
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    fn get_assignment(
        &self,
        ab_test_row: i64,
        assignment_key: &str,
    ) -> Result<Option<TestAssignmentRecord>, StoreError> {
        let connection = self.conn();
        connection
            .query_row(
                "SELECT * FROM test_assignments
                 WHERE ab_test_id = ?1 AND assignment_key = ?2",
                params![ab_test_row, assignment_key],
                assignment_of_row,
            )
            .optional()
            .map_err(|err| db_error(&err))
    }

    fn insert_assignment(&self, record: &TestAssignmentRecord) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO test_assignments (ab_test_id, assignment_key, variant,
                     assigned_at, execution_count, last_execution_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.ab_test_id,
                    record.assignment_key,
                    record.variant.as_str(),
                    timestamp_text(record.assigned_at),
                    i64_of(record.execution_count),
                    timestamp_text(record.last_execution_at),
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn touch_assignment(
        &self,
        ab_test_row: i64,
        assignment_key: &str,
        at: Timestamp,
    ) -> Result<u64, StoreError> {
        let connection = self.conn();
        let affected = connection
            .execute(
                "UPDATE test_assignments SET
                     execution_count = execution_count + 1,
                     last_execution_at = ?3
                 WHERE ab_test_id = ?1 AND assignment_key = ?2",
                params![ab_test_row, assignment_key, timestamp_text(at)],
            )
            .map_err(|err| db_error(&err))?;
        if affected == 0 {
            return Err(StoreError::Missing(format!(
                "assignment `{assignment_key}` for test row {ab_test_row}"
            )));
        }
        connection
            .query_row(
                "SELECT execution_count FROM test_assignments
                 WHERE ab_test_id = ?1 AND assignment_key = ?2",
                params![ab_test_row, assignment_key],
                |row| row.get::<_, i64>(0),
            )
            .map(u64_of)
            .map_err(|err| db_error(&err))
    }

    fn count_assignments(&self, ab_test_row: i64) -> Result<AssignmentCounts, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT variant, COUNT(*) FROM test_assignments
                 WHERE ab_test_id = ?1 GROUP BY variant",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![ab_test_row], |row| {
                Ok((row.get::<_, String>(0)?, u64_of(row.get::<_, i64>(1)?)))
            })
            .map_err(|err| db_error(&err))?;
        let mut counts = AssignmentCounts::default();
        for row in rows {
            let (variant, count) = row.map_err(|err| db_error(&err))?;
            if variant == "A" {
                counts.variant_a = count;
            } else {
                counts.variant_b = count;
            }
        }
        Ok(counts)
    }

    fn append_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let connection = self.conn();
        connection
            .execute(
                "INSERT INTO execution_logs (execution_id, input_data, output_data,
                     ruleset_id, total_points, pattern_result, execution_time_ms, success,
                     ab_test_id, ab_test_variant, consumer_id, correlation_id, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.execution_id.as_str(),
                    record.input_data.to_string(),
                    record.output_data.to_string(),
                    i64_of(record.ruleset_id.get()),
                    record.total_points,
                    record.pattern_result,
                    record.execution_time_ms,
                    record.success,
                    record.ab_test_id,
                    record.ab_test_variant.map(Variant::as_str),
                    record.consumer_id.as_ref().map(ConsumerId::as_str),
                    record.correlation_id.as_ref().map(verdict_core::CorrelationId::as_str),
                    timestamp_text(record.timestamp),
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let connection = self.conn();
        let mut statement = connection
            .prepare(
                "SELECT * FROM execution_logs
                 WHERE (?1 IS NULL OR ab_test_id = ?1)
                   AND (?2 IS NULL OR ab_test_variant = ?2)
                 ORDER BY id ASC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(
                params![filter.ab_test_id, filter.variant.map(Variant::as_str)],
                execution_of_row,
            )
            .map_err(|err| db_error(&err))?;
        let mut records = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_error(&err))?;
        records.retain(|record| {
            filter.from.is_none_or(|bound| record.timestamp >= bound)
                && filter.until.is_none_or(|bound| record.timestamp <= bound)
        });
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}
