// crates/omnibus-server/src/lib.rs
// ============================================================================
// Module: Expression Omnibus Server Library
// Description: REST API surface over the omnibus catalog core.
// Purpose: Expose server assembly, auth, and error mapping.
// Dependencies: crate::{auth, error, routes, server}
// ============================================================================

//! ## Overview
//! `omnibus-server` serves the gene-expression catalog over HTTP: public
//! reads, API-key-guarded writes, and the expression ingest pipeline behind
//! the sample-annotation endpoints.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use server::AppState;
pub use server::OmnibusServer;
pub use server::ServerError;
