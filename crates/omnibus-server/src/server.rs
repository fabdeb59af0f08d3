// crates/omnibus-server/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: Server assembly and lifecycle for the omnibus REST API.
// Purpose: Build the store, pipeline, and router from validated config.
// Dependencies: axum, omnibus-config, omnibus-core, omnibus-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`OmnibusServer`] wires validated configuration into a running HTTP
//! service: it builds the configured catalog store (in-memory or `SQLite`),
//! the ingest pipeline, and the write-auth policy, then serves the REST
//! route table over axum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use omnibus_config::OmnibusConfig;
use omnibus_config::StoreConfig;
use omnibus_core::ExpressionPipeline;
use omnibus_core::InMemoryCatalogStore;
use omnibus_core::SharedCatalogStore;
use omnibus_store_sqlite::SqliteCatalogStore;
use thiserror::Error;

use crate::auth::ApiKeyPolicy;
use crate::auth::AuthAuditSink;
use crate::auth::NoopAuditSink;
use crate::auth::StderrAuditSink;
use crate::routes;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration failure.
    #[error("server config error: {0}")]
    Config(String),
    /// Initialization failure.
    #[error("server init error: {0}")]
    Init(String),
    /// Transport failure.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Catalog store handle.
    pub store: SharedCatalogStore,
    /// Expression ingest pipeline.
    pub pipeline: ExpressionPipeline,
    /// Page size for paginated listings.
    pub page_size: u64,
    /// Maximum rows accepted per expression submission.
    pub max_batch_rows: usize,
    /// Write-auth policy.
    pub authz: Arc<ApiKeyPolicy>,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Omnibus HTTP server instance.
pub struct OmnibusServer {
    /// Validated configuration.
    config: OmnibusConfig,
    /// Shared handler state.
    state: AppState,
}

impl OmnibusServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or store initialization fails.
    pub fn from_config(config: OmnibusConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let store = build_catalog_store(&config)?;
        let audit: Arc<dyn AuthAuditSink> = if config.server.audit.enabled {
            Arc::new(StderrAuditSink)
        } else {
            Arc::new(NoopAuditSink)
        };
        let authz = Arc::new(ApiKeyPolicy::new(&config.server.api_keys, audit));
        let state = AppState {
            store: Arc::clone(&store),
            pipeline: ExpressionPipeline::new(store, config.catalog.n_decimals),
            page_size: config.catalog.page_size,
            max_batch_rows: config.catalog.max_batch_rows,
            authz,
        };
        Ok(Self {
            config,
            state,
        })
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .config
            .server
            .bind_addr()
            .map_err(|err| ServerError::Config(err.to_string()))?;
        let app = routes::router(self.state, self.config.server.max_body_bytes);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the catalog store selected by configuration.
fn build_catalog_store(config: &OmnibusConfig) -> Result<SharedCatalogStore, ServerError> {
    let store: SharedCatalogStore = match &config.store {
        StoreConfig::Memory => Arc::new(InMemoryCatalogStore::new()),
        StoreConfig::Sqlite(sqlite) => Arc::new(
            SqliteCatalogStore::new(sqlite).map_err(|err| ServerError::Init(err.to_string()))?,
        ),
    };
    Ok(store)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only server assembly assertions.")]

    use super::*;

    #[test]
    fn default_config_builds_a_memory_backed_server() {
        let server = OmnibusServer::from_config(OmnibusConfig::default()).unwrap();
        assert_eq!(server.state.page_size, 10);
        assert!(server.state.store.list_species().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config: OmnibusConfig = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:8080"
            "#,
        )
        .unwrap();
        assert!(matches!(
            OmnibusServer::from_config(config),
            Err(ServerError::Config(_))
        ));
    }
}
