// crates/omnibus-config/src/lib.rs
// ============================================================================
// Module: Expression Omnibus Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for omnibus.toml semantics.
// Dependencies: omnibus-core, omnibus-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `omnibus-config` defines the canonical configuration model for the
//! Expression Omnibus server. Parsing is strict and validation fails closed:
//! an invalid file refuses to start the server rather than degrading.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuditConfig;
pub use config::CatalogConfig;
pub use config::ConfigError;
pub use config::OmnibusConfig;
pub use config::ServerConfig;
pub use config::StoreConfig;
