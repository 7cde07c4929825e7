// crates/verdict-config/tests/boundary_validation.rs
// ============================================================================
// Module: Config Boundary Validation Tests
// Description: Validate per-field range and blank checks.
// Purpose: Ensure out-of-range values fail closed with clear messages.
// ============================================================================

//! Config boundary validation tests for verdict-config.

use std::io::Write;

use tempfile::NamedTempFile;
use verdict_config::ConfigError;
use verdict_config::VerdictConfig;

type TestResult = Result<(), String>;

fn load_document(document: &str) -> Result<VerdictConfig, ConfigError> {
    let mut file = NamedTempFile::new().map_err(|err| ConfigError::Io(err.to_string()))?;
    file.write_all(document.as_bytes()).map_err(|err| ConfigError::Io(err.to_string()))?;
    VerdictConfig::load(Some(file.path()))
}

fn assert_invalid(document: &str, needle: &str) -> TestResult {
    match load_document(document) {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected validation failure".to_string()),
    }
}

#[test]
fn blank_default_ruleset_is_rejected() -> TestResult {
    assert_invalid("[engine]\ndefault_ruleset = \"  \"\n", "default_ruleset must not be blank")
}

#[test]
fn zero_reload_interval_is_rejected() -> TestResult {
    assert_invalid(
        "[reload]\nreload_interval_seconds = 0\n",
        "reload_interval_seconds must be at least 1",
    )
}

#[test]
fn zero_busy_timeout_is_rejected() -> TestResult {
    assert_invalid("[store]\nbusy_timeout_ms = 0\n", "busy_timeout_ms must be greater than zero")
}

#[test]
fn zero_log_queue_capacity_is_rejected() -> TestResult {
    assert_invalid(
        "[store]\nlog_queue_capacity = 0\n",
        "log_queue_capacity must be greater than zero",
    )
}

#[test]
fn out_of_range_confidence_level_is_rejected() -> TestResult {
    assert_invalid(
        "[ab]\ndefault_confidence_level = 0.0\n",
        "default_confidence_level must lie in (0, 1]",
    )?;
    assert_invalid(
        "[ab]\ndefault_confidence_level = 1.5\n",
        "default_confidence_level must lie in (0, 1]",
    )
}
