//! Config defaults tests for omnibus-config.
// crates/omnibus-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults Tests
// Description: Validate default behavior of the omnibus configuration.
// Purpose: Ensure an empty config is valid and defaults are fail-closed.
// =============================================================================

use omnibus_config::OmnibusConfig;
use omnibus_config::StoreConfig;

type TestResult = Result<(), String>;

#[test]
fn empty_config_validates() -> TestResult {
    let config: OmnibusConfig = toml::from_str("").map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn default_bind_is_loopback() -> TestResult {
    let config = OmnibusConfig::default();
    let addr = config.server.bind_addr().map_err(|err| err.to_string())?;
    if !addr.ip().is_loopback() {
        return Err("default bind should be loopback".to_string());
    }
    Ok(())
}

#[test]
fn default_store_is_memory() -> TestResult {
    let config = OmnibusConfig::default();
    if !matches!(config.store, StoreConfig::Memory) {
        return Err("default store should be memory".to_string());
    }
    Ok(())
}

#[test]
fn default_catalog_precision_and_page_size() -> TestResult {
    let config = OmnibusConfig::default();
    if config.catalog.n_decimals != 3 {
        return Err("default n_decimals should be 3".to_string());
    }
    if config.catalog.page_size != 10 {
        return Err("default page_size should be 10".to_string());
    }
    Ok(())
}

#[test]
fn sqlite_store_parses_from_toml() -> TestResult {
    let config: OmnibusConfig = toml::from_str(
        r#"
        [store]
        type = "sqlite"
        path = "./data/omnibus.db"
        journal_mode = "wal"
        sync_mode = "full"
        "#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if !matches!(config.store, StoreConfig::Sqlite(_)) {
        return Err("store should be sqlite".to_string());
    }
    Ok(())
}
