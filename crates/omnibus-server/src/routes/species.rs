// crates/omnibus-server/src/routes/species.rs
// ============================================================================
// Module: Species Routes
// Description: Listing and batch creation of species documents.
// Purpose: Expose the species catalog over REST.
// Dependencies: axum, omnibus-core
// ============================================================================

//! ## Overview
//! Species are keyed by NCBI taxid. Batch creation is all-or-nothing up to
//! the first duplicate: a colliding taxid fails the request with a conflict
//! listing what was already persisted in this call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use axum::Json;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use omnibus_core::CatalogStore;
use omnibus_core::NewSpecies;
use omnibus_core::Species;
use omnibus_core::StoreError;

use crate::error::ApiError;
use crate::routes::write_context;
use crate::server::AppState;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/v1/species`
pub(crate) async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<Species>>, ApiError> {
    Ok(Json(state.store.list_species()?))
}

/// `POST /api/v1/species`
pub(crate) async fn create_many(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(inputs): Json<Vec<NewSpecies>>,
) -> Result<(StatusCode, Json<Vec<Species>>), ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "post_species")?;
    let inserted = insert_species_batch(state.store.as_ref(), &inputs)?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Inserts a batch of species; a duplicate taxid aborts with a conflict.
pub(crate) fn insert_species_batch(
    store: &dyn CatalogStore,
    inputs: &[NewSpecies],
) -> Result<Vec<Species>, ApiError> {
    let mut inserted = Vec::with_capacity(inputs.len());
    for input in inputs {
        match store.insert_species(input) {
            Ok(species) => inserted.push(species),
            Err(StoreError::DuplicateKey(_)) => {
                return Err(ApiError::from(omnibus_core::CatalogError::conflict(
                    format!("species taxid {} already exists", input.taxid),
                    vec![input.taxid.to_string()],
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
    #![allow(clippy::unwrap_used, reason = "Test-only species route assertions.")]

    use axum::http::StatusCode;
    use omnibus_core::CdsInfo;
    use omnibus_core::InMemoryCatalogStore;
    use omnibus_core::QcStats;
    use omnibus_core::TaxonId;

    use super::*;

    fn species(taxid: u32, name: &str) -> NewSpecies {
        NewSpecies {
            taxid: TaxonId::new(taxid),
            name: name.to_string(),
            alias: Vec::new(),
            cds: CdsInfo {
                url: None,
                source: "Ensembl".to_string(),
                release_date: time::macros::date!(2023 - 01 - 01),
            },
            qc_stats: QcStats {
                log_processed: 1.0,
                p_pseudoaligned: 90,
            },
        }
    }

    #[test]
    fn batch_insert_returns_assigned_ids() {
        let store = InMemoryCatalogStore::new();
        let out = insert_species_batch(
            &store,
            &[species(3702, "Arabidopsis thaliana"), species(4577, "Zea mays")],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].id, out[1].id);
    }

    #[test]
    fn duplicate_taxid_is_a_conflict() {
        let store = InMemoryCatalogStore::new();
        insert_species_batch(&store, &[species(3702, "Arabidopsis thaliana")]).unwrap();
        let err =
            insert_species_batch(&store, &[species(3702, "duplicate")]).unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body.conflicts, vec!["3702".to_string()]);
    }
}
