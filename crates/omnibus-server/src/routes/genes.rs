// crates/omnibus-server/src/routes/genes.rs
// ============================================================================
// Module: Gene Routes
// Description: Listing and batch creation of genes under a species.
// Purpose: Expose the per-species gene catalog over REST.
// Dependencies: axum, omnibus-core
// ============================================================================

//! ## Overview
//! Genes are scoped to a species resolved from the path taxid. Batch creation
//! honors `skip_duplicates`: when set, colliding labels are dropped instead
//! of failing the batch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use axum::Json;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use omnibus_core::CatalogStore;
use omnibus_core::Gene;
use omnibus_core::NewGene;
use omnibus_core::SpeciesId;
use omnibus_core::StoreError;

use crate::error::ApiError;
use crate::routes::SkipDuplicatesQuery;
use crate::routes::resolve_species;
use crate::routes::write_context;
use crate::server::AppState;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/v1/species/{taxid}/genes`
pub(crate) async fn list(
    State(state): State<AppState>,
    Path(taxid): Path<u32>,
) -> Result<Json<Vec<Gene>>, ApiError> {
    let species = resolve_species(state.store.as_ref(), taxid)?;
    Ok(Json(state.store.list_genes(species.id)?))
}

/// `POST /api/v1/species/{taxid}/genes`
pub(crate) async fn create_many(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(taxid): Path<u32>,
    Query(query): Query<SkipDuplicatesQuery>,
    headers: HeaderMap,
    Json(inputs): Json<Vec<NewGene>>,
) -> Result<(StatusCode, Json<Vec<Gene>>), ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "post_genes")?;
    let species = resolve_species(state.store.as_ref(), taxid)?;
    let inserted =
        insert_gene_batch(state.store.as_ref(), species.id, &inputs, query.skip_duplicates)?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Inserts a batch of genes under one species.
///
/// Duplicate labels either abort with a conflict or are silently dropped,
/// depending on `skip_duplicates`. Dropped genes are not re-fetched; only
/// newly inserted documents are returned.
pub(crate) fn insert_gene_batch(
    store: &dyn CatalogStore,
    species_id: SpeciesId,
    inputs: &[NewGene],
    skip_duplicates: bool,
) -> Result<Vec<Gene>, ApiError> {
    let mut inserted = Vec::with_capacity(inputs.len());
    for input in inputs {
        match store.insert_gene(species_id, input) {
            Ok(gene) => inserted.push(gene),
            Err(StoreError::DuplicateKey(_)) if skip_duplicates => {}
            Err(StoreError::DuplicateKey(_)) => {
                return Err(ApiError::from(omnibus_core::CatalogError::conflict(
                    "gene labels already exist for this species",
                    vec![input.label.clone()],
                )));
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(inserted)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only gene route assertions.")]

    use axum::http::StatusCode;
    use omnibus_core::InMemoryCatalogStore;

    use super::*;

    fn gene(label: &str) -> NewGene {
        NewGene {
            label: label.to_string(),
            alias: Vec::new(),
        }
    }

    fn species_id() -> SpeciesId {
        SpeciesId::from_raw(1).unwrap()
    }

    #[test]
    fn duplicate_label_conflicts_when_strict() {
        let store = InMemoryCatalogStore::new();
        insert_gene_batch(&store, species_id(), &[gene("AT1G01010")], false).unwrap();
        let err =
            insert_gene_batch(&store, species_id(), &[gene("AT1G01010")], false).unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body.conflicts, vec!["AT1G01010".to_string()]);
    }

    #[test]
    fn duplicate_label_dropped_when_skipping() {
        let store = InMemoryCatalogStore::new();
        insert_gene_batch(&store, species_id(), &[gene("AT1G01010")], false).unwrap();
        let out = insert_gene_batch(
            &store,
            species_id(),
            &[gene("AT1G01010"), gene("AT1G01020")],
            true,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "AT1G01020");
    }
}
