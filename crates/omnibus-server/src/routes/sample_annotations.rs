// crates/omnibus-server/src/routes/sample_annotations.rs
// ============================================================================
// Module: Sample Annotation Routes
// Description: Expression ingest and read endpoints for TPM groups.
// Purpose: Expose the expression write path and group listings over REST.
// Dependencies: axum, omnibus-core
// ============================================================================

//! ## Overview
//! The write endpoints accept raw TPM rows for one gene under one annotation
//! type, resolve the species and gene references, and hand the batch to the
//! ingest pipeline. `skip_duplicate_samples` selects the duplicate policy:
//! strict (default) rejects the whole submission when any sample accession
//! already exists for the gene; skipping silently drops incoming duplicates.
//! Returned groups carry fresh averages but pre-recompute SPM values.

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
use omnibus_core::DuplicateSamplePolicy;
use omnibus_core::ExpressionBatch;
use omnibus_core::ExpressionRow;
use omnibus_core::PageOf;
use omnibus_core::SampleAnnotationGroup;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::PageQuery;
use crate::routes::page_request;
use crate::routes::resolve_gene;
use crate::routes::resolve_species;
use crate::routes::write_context;
use crate::server::AppState;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One expression submission: many TPM rows for one gene under one type.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SampleAnnotationInput {
    /// NCBI taxid of the owning species.
    pub species_taxid: u32,
    /// Main gene identifier label within the species.
    pub gene_label: String,
    /// Annotation type shared by every row.
    pub annotation_type: String,
    /// Raw TPM rows.
    pub samples: Vec<ExpressionRow>,
}

/// `skip_duplicate_samples` query flag for expression writes.
#[derive(Debug, Deserialize)]
pub(crate) struct SkipDuplicateSamplesQuery {
    /// When true, incoming duplicate sample labels are dropped silently.
    #[serde(default)]
    pub skip_duplicate_samples: bool,
}

impl SkipDuplicateSamplesQuery {
    /// Maps the flag onto the pipeline policy.
    const fn policy(&self) -> DuplicateSamplePolicy {
        if self.skip_duplicate_samples {
            DuplicateSamplePolicy::SkipDuplicates
        } else {
            DuplicateSamplePolicy::Strict
        }
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/v1/sample_annotations/species/{taxid}/genes/{gene_label}`
pub(crate) async fn by_gene(
    State(state): State<AppState>,
    Path((taxid, gene_label)): Path<(u32, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageOf<SampleAnnotationGroup>>, ApiError> {
    let species = resolve_species(state.store.as_ref(), taxid)?;
    let gene = resolve_gene(state.store.as_ref(), species.id, &gene_label)?;
    let page = page_request(&query, state.page_size);
    Ok(Json(state.store.groups_by_gene(species.id, gene.id, &page)?))
}

/// `GET /api/v1/sample_annotations/types/{type}/labels/{label}`
pub(crate) async fn by_label(
    State(state): State<AppState>,
    Path((annotation_type, label)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageOf<SampleAnnotationGroup>>, ApiError> {
    let annotation_type = AnnotationType::new(annotation_type);
    let label = AnnotationLabel::new(label);
    let page = page_request(&query, state.page_size);
    Ok(Json(state.store.groups_by_label(&annotation_type, &label, &page)?))
}

/// `POST /api/v1/sample_annotations`
pub(crate) async fn ingest_one(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<SkipDuplicateSamplesQuery>,
    headers: HeaderMap,
    Json(input): Json<SampleAnnotationInput>,
) -> Result<(StatusCode, Json<Vec<SampleAnnotationGroup>>), ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "post_sample_annotations")?;
    let groups = ingest_submission(&state, &input, query.policy())?;
    Ok((StatusCode::CREATED, Json(groups)))
}

/// `POST /api/v1/sample_annotations/batch`
pub(crate) async fn ingest_many(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<SkipDuplicateSamplesQuery>,
    headers: HeaderMap,
    Json(inputs): Json<Vec<SampleAnnotationInput>>,
) -> Result<(StatusCode, Json<Vec<SampleAnnotationGroup>>), ApiError> {
    state.authz.authorize_write(&write_context(peer, &headers), "post_sample_annotations_batch")?;
    let mut out = Vec::new();
    for input in &inputs {
        out.extend(ingest_submission(&state, input, query.policy())?);
    }
    Ok((StatusCode::CREATED, Json(out)))
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Resolves one submission's references and runs it through the pipeline.
pub(crate) fn ingest_submission(
    state: &AppState,
    input: &SampleAnnotationInput,
    policy: DuplicateSamplePolicy,
) -> Result<Vec<SampleAnnotationGroup>, ApiError> {
    if input.samples.len() > state.max_batch_rows {
        return Err(ApiError::from(omnibus_core::CatalogError::Validation(format!(
            "batch exceeds {} rows",
            state.max_batch_rows
        ))));
    }
    let species = resolve_species(state.store.as_ref(), input.species_taxid)?;
    let gene = resolve_gene(state.store.as_ref(), species.id, &input.gene_label)?;
    let batch = ExpressionBatch {
        species_id: species.id,
        gene_id: gene.id,
        annotation_type: AnnotationType::new(&input.annotation_type),
        rows: input.samples.clone(),
    };
    Ok(state.pipeline.ingest(&batch, policy)?)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::float_cmp,
        reason = "Test-only ingest route assertions."
    )]

    use std::sync::Arc;

    use axum::http::StatusCode;
    use omnibus_core::CdsInfo;
    use omnibus_core::ExpressionPipeline;
    use omnibus_core::InMemoryCatalogStore;
    use omnibus_core::NewGene;
    use omnibus_core::NewSpecies;
    use omnibus_core::QcStats;
    use omnibus_core::SharedCatalogStore;
    use omnibus_core::TaxonId;

    use crate::auth::ApiKeyPolicy;
    use crate::auth::NoopAuditSink;

    use super::*;

    fn state() -> AppState {
        let store: SharedCatalogStore = Arc::new(InMemoryCatalogStore::new());
        store
            .insert_species(&NewSpecies {
                taxid: TaxonId::new(3702),
                name: "Arabidopsis thaliana".to_string(),
                alias: Vec::new(),
                cds: CdsInfo {
                    url: None,
                    source: "TAIR".to_string(),
                    release_date: time::macros::date!(2022 - 06 - 15),
                },
                qc_stats: QcStats {
                    log_processed: 2.0,
                    p_pseudoaligned: 80,
                },
            })
            .unwrap();
        let species = store.find_species_by_taxid(TaxonId::new(3702)).unwrap().unwrap();
        store
            .insert_gene(
                species.id,
                &NewGene {
                    label: "AT1G01010".to_string(),
                    alias: Vec::new(),
                },
            )
            .unwrap();
        AppState {
            store: Arc::clone(&store),
            pipeline: ExpressionPipeline::new(store, 3),
            page_size: 10,
            max_batch_rows: 100,
            authz: Arc::new(ApiKeyPolicy::new(&[], Arc::new(NoopAuditSink))),
        }
    }

    fn submission(rows: &[(&str, &str, f64)]) -> SampleAnnotationInput {
        SampleAnnotationInput {
            species_taxid: 3702,
            gene_label: "AT1G01010".to_string(),
            annotation_type: "tissue".to_string(),
            samples: rows
                .iter()
                .map(|&(annotation, sample, tpm)| ExpressionRow {
                    annotation_label: annotation.to_string(),
                    sample_label: sample.to_string(),
                    tpm,
                })
                .collect(),
        }
    }

    #[test]
    fn submission_resolves_and_persists_groups() {
        let state = state();
        let out = ingest_submission(
            &state,
            &submission(&[("leaf", "s1", 10.0), ("leaf", "s2", 5.0), ("root", "s3", 15.0)]),
            DuplicateSamplePolicy::Strict,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].avg_tpm, 7.5);
    }

    #[test]
    fn unknown_taxid_is_404() {
        let state = state();
        let mut input = submission(&[("leaf", "s1", 10.0)]);
        input.species_taxid = 9999;
        let err = ingest_submission(&state, &input, DuplicateSamplePolicy::Strict).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_gene_is_404() {
        let state = state();
        let mut input = submission(&[("leaf", "s1", 10.0)]);
        input.gene_label = "AT9G99999".to_string();
        let err = ingest_submission(&state, &input, DuplicateSamplePolicy::Strict).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn strict_duplicate_submission_is_409() {
        let state = state();
        ingest_submission(
            &state,
            &submission(&[("leaf", "s1", 10.0)]),
            DuplicateSamplePolicy::Strict,
        )
        .unwrap();
        let err = ingest_submission(
            &state,
            &submission(&[("root", "s1", 3.0)]),
            DuplicateSamplePolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body.conflicts, vec!["S1".to_string()]);
    }

    #[test]
    fn oversized_batch_is_422() {
        let state = state();
        let rows: Vec<(String, String, f64)> = (0..101)
            .map(|i| ("leaf".to_string(), format!("s{i}"), 1.0))
            .collect();
        let borrowed: Vec<(&str, &str, f64)> =
            rows.iter().map(|(a, s, t)| (a.as_str(), s.as_str(), *t)).collect();
        let err = ingest_submission(
            &state,
            &submission(&borrowed),
            DuplicateSamplePolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn nan_tpm_is_422() {
        let state = state();
        let err = ingest_submission(
            &state,
            &submission(&[("leaf", "s1", f64::NAN)]),
            DuplicateSamplePolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
