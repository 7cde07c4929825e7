// crates/verdict-config/src/config.rs
// ============================================================================
// Module: Verdict Config Loader
// Description: TOML configuration with load guards and validation.
// Purpose: Reject malformed or out-of-range configuration before startup.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! [`VerdictConfig::load`] reads a TOML document under strict guards (path
//! length, component length, file size, UTF-8) and validates every section.
//! A missing path loads built-in defaults so embedded and test deployments
//! need no file at all.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted config file size in bytes.
const MAX_CONFIG_BYTES: u64 = 1_048_576;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config path exceeds the total length limit.
    #[error("config path exceeds max length: {actual} (max {max})")]
    PathTooLong {
        /// Actual path length.
        actual: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// One path component exceeds the component limit.
    #[error("config path component too long: {actual} (max {max})")]
    PathComponentTooLong {
        /// Actual component length.
        actual: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// Config file exceeds the size limit.
    #[error("config file exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    FileTooLarge {
        /// Actual file size.
        actual_bytes: u64,
        /// Maximum allowed size.
        max_bytes: u64,
    },
    /// Config file is not valid UTF-8.
    #[error("config file is not valid utf-8")]
    NotUtf8,
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config document failed to parse as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A config value failed validation.
    #[error("config validation error: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Engine defaults.
///
/// # Invariants
/// - `default_ruleset`, when set, is non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Ruleset name used when an evaluation names none.
    #[serde(default)]
    pub default_ruleset: Option<String>,
}

/// Hot-reload cadence.
///
/// # Invariants
/// - `reload_interval_seconds >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadSection {
    /// Enable automatic monitor-triggered reloads.
    #[serde(default = "default_true")]
    pub auto_reload_enabled: bool,
    /// Monitor poll interval in seconds.
    #[serde(default = "default_reload_interval")]
    pub reload_interval_seconds: u64,
    /// Validate candidates before every swap.
    #[serde(default = "default_true")]
    pub validation_enabled: bool,
}

impl Default for ReloadSection {
    fn default() -> Self {
        Self {
            auto_reload_enabled: true,
            reload_interval_seconds: default_reload_interval(),
            validation_enabled: true,
        }
    }
}

/// Store settings.
///
/// # Invariants
/// - `busy_timeout_ms` and `log_queue_capacity` are non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Path to the SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Execution-log writer queue capacity.
    #[serde(default = "default_log_queue_capacity")]
    pub log_queue_capacity: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            log_queue_capacity: default_log_queue_capacity(),
        }
    }
}

/// A/B defaults applied when a test omits them.
///
/// # Invariants
/// - `default_confidence_level` lies in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbSection {
    /// Default statistical confidence level.
    #[serde(default = "default_confidence_level")]
    pub default_confidence_level: f64,
    /// Default minimum per-variant sample size.
    #[serde(default)]
    pub default_min_sample_size: Option<u64>,
}

impl Default for AbSection {
    fn default() -> Self {
        Self {
            default_confidence_level: default_confidence_level(),
            default_min_sample_size: None,
        }
    }
}

/// Full runtime configuration.
///
/// # Invariants
/// - Every section is validated before the value is returned to callers.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct VerdictConfig {
    /// Engine defaults.
    #[serde(default)]
    pub engine: EngineSection,
    /// Hot-reload cadence.
    #[serde(default)]
    pub reload: ReloadSection,
    /// Store settings.
    #[serde(default)]
    pub store: StoreSection,
    /// A/B defaults.
    #[serde(default)]
    pub ab: AbSection,
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns `true` for serde defaults.
const fn default_true() -> bool {
    true
}

/// Returns the default reload poll interval in seconds.
const fn default_reload_interval() -> u64 {
    30
}

/// Returns the default store path.
fn default_store_path() -> PathBuf {
    PathBuf::from("verdict.db")
}

/// Returns the default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Returns the default execution-log queue capacity.
const fn default_log_queue_capacity() -> usize {
    1_024
}

/// Returns the default confidence level.
const fn default_confidence_level() -> f64 {
    0.95
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl VerdictConfig {
    /// Loads configuration from an optional TOML file.
    ///
    /// A `None` path yields the validated built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path violates a guard, the file
    /// cannot be read or parsed, or a value fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        validate_path(path)?;
        let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::FileTooLarge {
                actual_bytes: metadata.len(),
                max_bytes: MAX_CONFIG_BYTES,
            });
        }
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|_| ConfigError::NotUtf8)?;
        let config: Self =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.engine.default_ruleset
            && name.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "engine.default_ruleset must not be blank".to_string(),
            ));
        }
        if self.reload.reload_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "reload.reload_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.store.log_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "store.log_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.ab.default_confidence_level <= 0.0 || self.ab.default_confidence_level > 1.0 {
            return Err(ConfigError::Invalid(
                "ab.default_confidence_level must lie in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validates path-length guards.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let rendered = path.to_string_lossy();
    if rendered.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::PathTooLong {
            actual: rendered.len(),
            max: MAX_TOTAL_PATH_LENGTH,
        });
    }
    for component in path.components() {
        let component = component.as_os_str().to_string_lossy();
        if component.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::PathComponentTooLong {
                actual: component.len(),
                max: MAX_PATH_COMPONENT_LENGTH,
            });
        }
    }
    Ok(())
}
