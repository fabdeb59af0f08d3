// crates/omnibus-server/src/routes/gene_annotations.rs
// ============================================================================
// Module: Gene Annotation Routes
// Description: CRUD and upsert endpoints for gene annotations.
// Purpose: Expose the (type, label)-keyed annotation catalog over REST.
// Dependencies: axum, omnibus-core
// ============================================================================

//! ## Overview
//! Gene annotations are keyed by normalized (type, label). The PATCH upsert
//! follows append-if-absent semantics: a missing document is created, an
//! existing one gains the gene identifiers it does not yet carry, and the
//! attached genes record the annotation in return. A create that loses a
//! key race is retried once as an append.

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
use omnibus_core::AnnotationLabel;
use omnibus_core::AnnotationType;
use omnibus_core::CatalogError;
use omnibus_core::CatalogStore;
use omnibus_core::GeneAnnotation;
use omnibus_core::NewGeneAnnotation;
use omnibus_core::PageOf;
use omnibus_core::StoreError;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::page_request;
use crate::routes::write_context;
use crate::server::AppState;

// ============================================================================
// SECTION: Query Types
// ============================================================================

/// Listing filters for gene annotations.
#[derive(Debug, Deserialize)]
pub(crate) struct AnnotationFilterQuery {
    /// Optional annotation type filter.
    pub annotation_type: Option<String>,
    /// Optional label filter.
    pub label: Option<String>,
    /// 1-based page number.
    #[serde(default = "super::default_page_num")]
    pub page_num: u64,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/v1/gene_annotations`
pub(crate) async fn list(
    State(state): State<AppState>,
    Query(query): Query<AnnotationFilterQuery>,
) -> Result<Json<PageOf<GeneAnnotation>>, ApiError> {
    let annotation_type = query.annotation_type.as_deref().map(AnnotationType::new);
    let label = query.label.as_deref().map(AnnotationLabel::new);
    let page = page_request(
        &super::PageQuery {
            page_num: query.page_num,
        },
        state.page_size,
    );
    Ok(Json(state.store.list_gene_annotations(
        annotation_type.as_ref(),
        label.as_ref(),
        &page,
    )?))
}

/// `GET /api/v1/gene_annotations/type/{type}/label/{label}`
pub(crate) async fn get_one(
    State(state): State<AppState>,
    Path((annotation_type, label)): Path<(String, String)>,
) -> Result<Json<GeneAnnotation>, ApiError> {
    let annotation_type = AnnotationType::new(annotation_type);
    let label = AnnotationLabel::new(label);
    state
        .store
        .find_gene_annotation(&annotation_type, &label)?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found("gene annotation", format!("{annotation_type}/{label}"))
        })
}

/// `POST /api/v1/gene_annotations`
pub(crate) async fn create_one(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(input): Json<NewGeneAnnotation>,
) -> Result<(StatusCode, Json<GeneAnnotation>), ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "post_gene_annotation")?;
    let created = insert_annotation(state.store.as_ref(), &input)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PATCH /api/v1/gene_annotations`
pub(crate) async fn upsert_many(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(inputs): Json<Vec<NewGeneAnnotation>>,
) -> Result<Json<Vec<GeneAnnotation>>, ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "patch_gene_annotations")?;
    let mut out = Vec::with_capacity(inputs.len());
    for input in &inputs {
        out.push(upsert_annotation(state.store.as_ref(), input)?);
    }
    Ok(Json(out))
}

/// `DELETE /api/v1/gene_annotations/type/{type}/label/{label}`
pub(crate) async fn delete_one(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((annotation_type, label)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<GeneAnnotation>, ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "delete_gene_annotation")?;
    let annotation_type = AnnotationType::new(annotation_type);
    let label = AnnotationLabel::new(label);
    let existing = state
        .store
        .find_gene_annotation(&annotation_type, &label)?
        .ok_or_else(|| {
            ApiError::not_found("gene annotation", format!("{annotation_type}/{label}"))
        })?;
    state.store.delete_gene_annotation(&annotation_type, &label)?;
    Ok(Json(existing))
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Inserts one annotation, failing with a conflict on an existing key.
pub(crate) fn insert_annotation(
    store: &dyn CatalogStore,
    input: &NewGeneAnnotation,
) -> Result<GeneAnnotation, ApiError> {
    match store.insert_gene_annotation(input) {
        Ok(created) => {
            attach_to_genes(store, &created)?;
            Ok(created)
        }
        Err(StoreError::DuplicateKey(_)) => Err(ApiError::from(CatalogError::conflict(
            format!(
                "gene annotation {}/{} already exists",
                input.annotation_type, input.label
            ),
            vec![input.label.to_string()],
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Inserts a missing annotation or appends absent gene identifiers to the
/// existing document. A lost create race retries once as an append.
pub(crate) fn upsert_annotation(
    store: &dyn CatalogStore,
    input: &NewGeneAnnotation,
) -> Result<GeneAnnotation, ApiError> {
    if let Some(existing) = store.find_gene_annotation(&input.annotation_type, &input.label)? {
        let refreshed = store.append_annotation_gene_ids(existing.id, &input.gene_ids)?;
        attach_to_genes(store, &refreshed)?;
        return Ok(refreshed);
    }
    match store.insert_gene_annotation(input) {
        Ok(created) => {
            attach_to_genes(store, &created)?;
            Ok(created)
        }
        Err(StoreError::DuplicateKey(_)) => {
            // Lost the create race; the rival document must exist now.
            let existing = store
                .find_gene_annotation(&input.annotation_type, &input.label)?
                .ok_or_else(|| {
                    ApiError::from(CatalogError::conflict(
                        "gene annotation key race unresolved after retry",
                        vec![input.label.to_string()],
                    ))
                })?;
            let refreshed = store.append_annotation_gene_ids(existing.id, &input.gene_ids)?;
            attach_to_genes(store, &refreshed)?;
            Ok(refreshed)
        }
        Err(err) => Err(err.into()),
    }
}

/// Records the annotation on each attached gene document.
fn attach_to_genes(store: &dyn CatalogStore, annotation: &GeneAnnotation) -> Result<(), ApiError> {
    for gene_id in &annotation.gene_ids {
        store.attach_gene_annotations(*gene_id, &[annotation.id])?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only annotation route assertions.")]

    use axum::http::StatusCode;
    use omnibus_core::GeneId;
    use omnibus_core::InMemoryCatalogStore;
    use omnibus_core::NewGene;
    use omnibus_core::SpeciesId;

    use super::*;

    fn input(label: &str, gene_ids: Vec<GeneId>) -> NewGeneAnnotation {
        NewGeneAnnotation {
            annotation_type: AnnotationType::new("go"),
            label: AnnotationLabel::new(label),
            details: None,
            gene_ids,
        }
    }

    fn seed_gene(store: &InMemoryCatalogStore, label: &str) -> GeneId {
        store
            .insert_gene(
                SpeciesId::from_raw(1).unwrap(),
                &NewGene {
                    label: label.to_string(),
                    alias: Vec::new(),
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn create_conflicts_on_existing_key() {
        let store = InMemoryCatalogStore::new();
        insert_annotation(&store, &input("go:0009507", Vec::new())).unwrap();
        let err = insert_annotation(&store, &input("go:0009507", Vec::new())).unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn upsert_creates_then_appends_without_duplicates() {
        let store = InMemoryCatalogStore::new();
        let g1 = seed_gene(&store, "AT1G01010");
        let g2 = seed_gene(&store, "AT1G01020");

        let first = upsert_annotation(&store, &input("go:0009507", vec![g1])).unwrap();
        assert_eq!(first.gene_ids, vec![g1]);

        let second = upsert_annotation(&store, &input("go:0009507", vec![g1, g2])).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.gene_ids, vec![g1, g2]);
    }

    #[test]
    fn upsert_records_annotation_on_gene_documents() {
        let store = InMemoryCatalogStore::new();
        let g1 = seed_gene(&store, "AT1G01010");
        let annotation = upsert_annotation(&store, &input("go:0009507", vec![g1])).unwrap();

        let gene = store
            .find_gene_by_label(SpeciesId::from_raw(1).unwrap(), "AT1G01010")
            .unwrap()
            .unwrap();
        assert_eq!(gene.annotations, vec![annotation.id]);
    }
}
