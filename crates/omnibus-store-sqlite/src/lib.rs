// crates/omnibus-store-sqlite/src/lib.rs
// ============================================================================
// Module: Expression Omnibus SQLite Store Library
// Description: Durable SQLite-backed catalog store.
// Purpose: Expose the SQLite CatalogStore implementation and its config.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Durable [`omnibus_core::CatalogStore`] implementation backed by `SQLite`.
//! Unique constraints provide the document-key semantics the core relies on;
//! WAL mode and full synchronous writes are the defaults.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteCatalogStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
