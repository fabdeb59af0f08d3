// crates/omnibus-server/src/routes/mod.rs
// ============================================================================
// Module: REST Routes
// Description: Route table and shared handler plumbing for the REST API.
// Purpose: Assemble the /api/v1 surface over the catalog core.
// Dependencies: axum, omnibus-core, serde
// ============================================================================

//! ## Overview
//! All endpoints live under `/api/v1`. Reads are public; writes pass through
//! the API-key policy before touching the store. Handlers stay thin: each
//! delegates to a plain function over the store so the behavior is testable
//! without HTTP plumbing.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod gene_annotations;
pub mod genes;
pub mod sample_annotations;
pub mod species;

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::routing::post;
use omnibus_core::CatalogStore;
use omnibus_core::Gene;
use omnibus_core::PageRequest;
use omnibus_core::Species;
use omnibus_core::SpeciesId;
use omnibus_core::TaxonId;
use serde::Deserialize;
use serde::Serialize;

use crate::auth::API_KEY_HEADER;
use crate::auth::RequestContext;
use crate::error::ApiError;
use crate::server::AppState;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full route table over the shared state.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/about", get(about))
        .route("/api/v1/species", get(species::list).post(species::create_many))
        .route("/api/v1/species/{taxid}/genes", get(genes::list).post(genes::create_many))
        .route(
            "/api/v1/gene_annotations",
            get(gene_annotations::list)
                .post(gene_annotations::create_one)
                .patch(gene_annotations::upsert_many),
        )
        .route(
            "/api/v1/gene_annotations/type/{type}/label/{label}",
            get(gene_annotations::get_one).delete(gene_annotations::delete_one),
        )
        .route(
            "/api/v1/sample_annotations/species/{taxid}/genes/{gene_label}",
            get(sample_annotations::by_gene),
        )
        .route(
            "/api/v1/sample_annotations/types/{type}/labels/{label}",
            get(sample_annotations::by_label),
        )
        .route("/api/v1/sample_annotations", post(sample_annotations::ingest_one))
        .route("/api/v1/sample_annotations/batch", post(sample_annotations::ingest_many))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Service Banner
// ============================================================================

/// Service banner payload.
#[derive(Debug, Serialize)]
struct About {
    /// Service name.
    name: &'static str,
    /// Crate version.
    version: &'static str,
}

/// Returns the service banner.
async fn about() -> Json<About> {
    Json(About {
        name: "expression-omnibus",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// SECTION: Shared Query Types
// ============================================================================

/// Page-number query parameter shared by paginated listings.
#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    /// 1-based page number.
    #[serde(default = "default_page_num")]
    pub page_num: u64,
}

/// Returns the default page number.
const fn default_page_num() -> u64 {
    1
}

/// `skip_duplicates` query flag for batch catalog inserts.
#[derive(Debug, Deserialize)]
pub(crate) struct SkipDuplicatesQuery {
    /// When true, duplicate keys are dropped instead of failing the batch.
    #[serde(default)]
    pub skip_duplicates: bool,
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Builds a page request from a query and the configured page size.
pub(crate) const fn page_request(query: &PageQuery, page_size: u64) -> PageRequest {
    PageRequest::new(query.page_num, page_size)
}

/// Builds the write-auth context from peer address and headers.
pub(crate) fn write_context(peer: std::net::SocketAddr, headers: &HeaderMap) -> RequestContext {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    RequestContext {
        peer_ip: Some(peer.ip()),
        api_key,
    }
}

/// Resolves a species document from its taxid or fails with 404.
pub(crate) fn resolve_species(store: &dyn CatalogStore, taxid: u32) -> Result<Species, ApiError> {
    store
        .find_species_by_taxid(TaxonId::new(taxid))?
        .ok_or_else(|| ApiError::not_found("species", format!("taxid {taxid}")))
}

/// Resolves a gene document from its species and label or fails with 404.
pub(crate) fn resolve_gene(
    store: &dyn CatalogStore,
    species_id: SpeciesId,
    label: &str,
) -> Result<Gene, ApiError> {
    store
        .find_gene_by_label(species_id, label)?
        .ok_or_else(|| ApiError::not_found("gene", label.to_string()))
}
