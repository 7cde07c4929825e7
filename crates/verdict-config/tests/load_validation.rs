// crates/verdict-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// ============================================================================

//! Config load validation tests for verdict-config.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use verdict_config::ConfigError;
use verdict_config::VerdictConfig;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<VerdictConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_without_path_yields_defaults() -> TestResult {
    let config = VerdictConfig::load(None).map_err(|err| err.to_string())?;
    if config.reload.reload_interval_seconds != 30 {
        return Err("unexpected default reload interval".to_string());
    }
    if !config.reload.auto_reload_enabled {
        return Err("auto reload should default on".to_string());
    }
    Ok(())
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(VerdictConfig::load(Some(path)), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(VerdictConfig::load(Some(path)), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(VerdictConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(VerdictConfig::load(Some(file.path())), "not valid utf-8")
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[reload\n").map_err(|err| err.to_string())?;
    assert_invalid(VerdictConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[reload]\nsurprise = 1\n").map_err(|err| err.to_string())?;
    assert_invalid(VerdictConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_parses_a_full_document() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(
        b"[engine]\ndefault_ruleset = \"main\"\n\n[reload]\nreload_interval_seconds = 5\n\n[store]\npath = \"rules.db\"\n\n[ab]\ndefault_confidence_level = 0.9\n",
    )
    .map_err(|err| err.to_string())?;
    let config = VerdictConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.engine.default_ruleset.as_deref() != Some("main") {
        return Err("engine.default_ruleset not parsed".to_string());
    }
    if config.reload.reload_interval_seconds != 5 {
        return Err("reload interval not parsed".to_string());
    }
    Ok(())
}
