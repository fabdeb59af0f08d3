//! Config file loading tests for omnibus-config.
// crates/omnibus-config/tests/config_load.rs
// =============================================================================
// Module: Config Load Tests
// Description: Validate loading omnibus configuration from disk.
// Purpose: Ensure file resolution, size limits, and parse failures fail closed.
// =============================================================================

use std::fs;

use omnibus_config::OmnibusConfig;
use omnibus_config::StoreConfig;
use tempfile::TempDir;

type TestResult = Result<(), String>;

#[test]
fn load_reads_config_from_explicit_path() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("omnibus.toml");
    fs::write(
        &path,
        r#"
        [store]
        type = "sqlite"
        path = "./omnibus.db"

        [catalog]
        n_decimals = 4
        "#,
    )
    .map_err(|err| err.to_string())?;

    let config = OmnibusConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if !matches!(config.store, StoreConfig::Sqlite(_)) {
        return Err("expected sqlite store config".to_string());
    }
    if config.catalog.n_decimals != 4 {
        return Err("expected n_decimals from file".to_string());
    }
    Ok(())
}

#[test]
fn load_rejects_missing_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    match OmnibusConfig::load(Some(&path)) {
        Err(_) => Ok(()),
        Ok(_) => Err("expected load of a missing file to fail".to_string()),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("omnibus.toml");
    // One byte past the cap, padded with comment lines so it stays valid TOML.
    let padding = "#".repeat(1024 * 1024 + 1);
    fs::write(&path, padding).map_err(|err| err.to_string())?;

    match OmnibusConfig::load(Some(&path)) {
        Err(error) if error.to_string().contains("size limit") => Ok(()),
        Err(error) => Err(format!("unexpected error: {error}")),
        Ok(_) => Err("expected oversized file to be rejected".to_string()),
    }
}

#[test]
fn load_rejects_invalid_config_in_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("omnibus.toml");
    fs::write(
        &path,
        r#"
        [server]
        bind = "0.0.0.0:8080"
        "#,
    )
    .map_err(|err| err.to_string())?;

    match OmnibusConfig::load(Some(&path)) {
        Err(error) if error.to_string().contains("non-loopback bind") => Ok(()),
        Err(error) => Err(format!("unexpected error: {error}")),
        Ok(_) => Err("expected fail-closed validation during load".to_string()),
    }
}
