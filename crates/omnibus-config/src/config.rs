// crates/omnibus-config/src/config.rs
// ============================================================================
// Module: Expression Omnibus Configuration
// Description: Configuration loading and validation for the omnibus server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: omnibus-core, omnibus-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the server will not bind a
//! non-loopback address without API keys, and catalog precision settings are
//! capped at what the aggregate math can represent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use omnibus_core::DEFAULT_PRECISION;
use omnibus_core::MAX_PRECISION;
use omnibus_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "omnibus.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "OMNIBUS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured API keys.
pub(crate) const MAX_API_KEYS: usize = 64;
/// Maximum length of a single API key.
pub(crate) const MAX_API_KEY_LENGTH: usize = 256;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
/// Default page size for paginated listings.
pub(crate) const DEFAULT_PAGE_SIZE: u64 = 10;
/// Maximum allowed page size.
pub(crate) const MAX_PAGE_SIZE: u64 = 500;
/// Maximum number of expression rows accepted in one batch.
pub(crate) const MAX_BATCH_ROWS: usize = 100_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Expression Omnibus server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OmnibusConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Catalog store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Catalog behavior configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl OmnibusConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
        self.catalog.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// API keys accepted for write operations. Empty means writes are only
    /// accepted on loopback binds.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            api_keys: Vec::new(),
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        let addr: SocketAddr = self
            .bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))?;
        if !addr.ip().is_loopback() && self.api_keys.is_empty() {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed without server.api_keys".to_string(),
            ));
        }
        if self.api_keys.len() > MAX_API_KEYS {
            return Err(ConfigError::Invalid("too many server.api_keys".to_string()));
        }
        for key in &self.api_keys {
            let trimmed = key.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Invalid(
                    "server.api_keys entries must be non-empty".to_string(),
                ));
            }
            if trimmed.len() > MAX_API_KEY_LENGTH {
                return Err(ConfigError::Invalid(
                    "server.api_keys entry exceeds max length".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind string does not parse; `validate`
    /// catches this earlier in the normal load path.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid server.bind address".to_string()))
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Whether audit events are emitted.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
        }
    }
}

/// Catalog store configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Volatile in-memory store for local runs and tests.
    #[default]
    Memory,
    /// Durable SQLite-backed store.
    Sqlite(SqliteStoreConfig),
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Memory => Ok(()),
            Self::Sqlite(config) => {
                validate_path_string("store.path", &config.path.to_string_lossy())?;
                if config.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "store.busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Catalog behavior configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Decimal precision for persisted aggregates.
    #[serde(default = "default_n_decimals")]
    pub n_decimals: u32,
    /// Page size for paginated listings.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Maximum expression rows accepted in one batch submission.
    #[serde(default = "default_max_batch_rows")]
    pub max_batch_rows: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            n_decimals: default_n_decimals(),
            page_size: default_page_size(),
            max_batch_rows: default_max_batch_rows(),
        }
    }
}

impl CatalogConfig {
    /// Validates catalog configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_decimals > MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "catalog.n_decimals must be at most {MAX_PRECISION}"
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "catalog.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.max_batch_rows == 0 || self.max_batch_rows > MAX_BATCH_ROWS {
            return Err(ConfigError::Invalid(format!(
                "catalog.max_batch_rows must be between 1 and {MAX_BATCH_ROWS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address (loopback only).
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Returns the default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default audit toggle.
const fn default_audit_enabled() -> bool {
    true
}

/// Returns the default aggregate precision.
const fn default_n_decimals() -> u32 {
    DEFAULT_PRECISION
}

/// Returns the default page size.
const fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// Returns the default batch row limit.
const fn default_max_batch_rows() -> usize {
    MAX_BATCH_ROWS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only config assertions.")]

    use super::*;

    #[test]
    fn path_string_accepts_valid_path() {
        assert!(validate_path_string("store.path", "./data/omnibus.db").is_ok());
    }

    #[test]
    fn path_string_rejects_empty_and_overlong() {
        assert!(validate_path_string("store.path", "   ").is_err());
        let long = "a".repeat(MAX_TOTAL_PATH_LENGTH + 1);
        assert!(validate_path_string("store.path", &long).is_err());
    }

    #[test]
    fn path_string_rejects_component_too_long() {
        let component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let path = format!("./{component}");
        let err = validate_path_string("store.path", &path).unwrap_err();
        assert!(err.to_string().contains("component too long"));
    }
}
