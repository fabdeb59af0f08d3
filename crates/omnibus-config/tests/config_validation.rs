//! Config validation tests for omnibus-config.
// crates/omnibus-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate rejection of invalid omnibus configuration.
// Purpose: Ensure hard limits and fail-closed rules are enforced.
// =============================================================================

use omnibus_config::ConfigError;
use omnibus_config::OmnibusConfig;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

fn parse(toml_text: &str) -> Result<OmnibusConfig, String> {
    toml::from_str(toml_text).map_err(|err| err.to_string())
}

#[test]
fn non_loopback_bind_requires_api_keys() -> TestResult {
    let config = parse(
        r#"
        [server]
        bind = "0.0.0.0:8080"
        "#,
    )?;
    assert_invalid(config.validate(), "non-loopback bind")
}

#[test]
fn non_loopback_bind_with_api_keys_validates() -> TestResult {
    let config = parse(
        r#"
        [server]
        bind = "0.0.0.0:8080"
        api_keys = ["a-strong-key"]
        "#,
    )?;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn malformed_bind_is_rejected() -> TestResult {
    let config = parse(
        r#"
        [server]
        bind = "not-an-address"
        "#,
    )?;
    assert_invalid(config.validate(), "invalid server.bind")
}

#[test]
fn empty_api_key_is_rejected() -> TestResult {
    let config = parse(
        r#"
        [server]
        api_keys = ["  "]
        "#,
    )?;
    assert_invalid(config.validate(), "non-empty")
}

#[test]
fn zero_body_limit_is_rejected() -> TestResult {
    let config = parse(
        r#"
        [server]
        max_body_bytes = 0
        "#,
    )?;
    assert_invalid(config.validate(), "max_body_bytes")
}

#[test]
fn precision_above_cap_is_rejected() -> TestResult {
    let config = parse(
        r#"
        [catalog]
        n_decimals = 12
        "#,
    )?;
    assert_invalid(config.validate(), "n_decimals")
}

#[test]
fn zero_page_size_is_rejected() -> TestResult {
    let config = parse(
        r#"
        [catalog]
        page_size = 0
        "#,
    )?;
    assert_invalid(config.validate(), "page_size")
}

#[test]
fn zero_batch_limit_is_rejected() -> TestResult {
    let config = parse(
        r#"
        [catalog]
        max_batch_rows = 0
        "#,
    )?;
    assert_invalid(config.validate(), "max_batch_rows")
}

#[test]
fn unknown_server_key_is_rejected_at_parse() -> TestResult {
    // A typoed key must fail loudly, not be silently ignored.
    let result = parse(
        r#"
        [server]
        api_key = ["a-strong-key"]
        "#,
    );
    match result {
        Err(message) if message.contains("api_key") => Ok(()),
        Err(message) => Err(format!("unexpected parse error: {message}")),
        Ok(_) => Err("expected unknown key to be rejected".to_string()),
    }
}

#[test]
fn unknown_sqlite_store_key_is_rejected_at_parse() -> TestResult {
    let result = parse(
        r#"
        [store]
        type = "sqlite"
        path = "./omnibus.db"
        journal = "wal"
        "#,
    );
    match result {
        Err(message) if message.contains("journal") => Ok(()),
        Err(message) => Err(format!("unexpected parse error: {message}")),
        Ok(_) => Err("expected unknown key to be rejected".to_string()),
    }
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let config = parse(
        r#"
        [store]
        type = "sqlite"
        path = ""
        "#,
    )?;
    assert_invalid(config.validate(), "store.path")
}

#[test]
fn sqlite_store_rejects_zero_busy_timeout() -> TestResult {
    let config = parse(
        r#"
        [store]
        type = "sqlite"
        path = "./omnibus.db"
        busy_timeout_ms = 0
        "#,
    )?;
    assert_invalid(config.validate(), "busy_timeout_ms")
}
