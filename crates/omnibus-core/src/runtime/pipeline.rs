// crates/omnibus-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Expression Ingest Pipeline
// Description: One-batch orchestration of grouping, reconcile, and SPM.
// Purpose: Apply a sample-annotation batch to the store end to end.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The pipeline is the single entry point for expression writes. One batch
//! carries many TPM rows for one gene under one annotation type. Rows are
//! partitioned by annotation label, each group is reconciled against the
//! store sequentially (aggregate correctness depends on completing appends
//! before re-reading averages), and the shared SPM distribution is then
//! recomputed once across all sibling groups in the touched scope.
//!
//! Groups reconciled before a mid-batch failure keep their updates; the
//! operation is "apply what you can per group, abort remaining groups on
//! first hard error", not atomic across the batch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::AnnotationType;
use crate::core::CatalogError;
use crate::core::ExpressionRow;
use crate::core::GeneId;
use crate::core::GroupDraft;
use crate::core::GroupKey;
use crate::core::SampleAnnotationGroup;
use crate::core::SampleLabel;
use crate::core::SiblingScope;
use crate::core::SpeciesId;
use crate::interfaces::SharedCatalogStore;
use crate::runtime::aggregate::recompute_spm;
use crate::runtime::grouping::group_rows;
use crate::runtime::reconciler::reconcile;

// ============================================================================
// SECTION: Batch Types
// ============================================================================

/// One resolved input batch: many TPM rows for one gene under one type.
///
/// Species and gene keys have already been resolved to store identifiers by
/// the caller; resolution failures surface there as not-found errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionBatch {
    /// Owning species.
    pub species_id: SpeciesId,
    /// Owning gene.
    pub gene_id: GeneId,
    /// Annotation type shared by every row.
    pub annotation_type: AnnotationType,
    /// Raw TPM rows.
    pub rows: Vec<ExpressionRow>,
}

/// Caller-selected handling of sample labels already present for the gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSamplePolicy {
    /// Reject the whole batch with a conflict before any write.
    Strict,
    /// Silently drop incoming duplicates during merge (existing wins).
    SkipDuplicates,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Expression ingest pipeline over a shared catalog store.
#[derive(Clone)]
pub struct ExpressionPipeline {
    /// Catalog store handle.
    store: SharedCatalogStore,
    /// Decimal precision for persisted aggregates.
    n_decimals: u32,
}

impl ExpressionPipeline {
    /// Creates a pipeline over a store with a fixed aggregate precision.
    #[must_use]
    pub const fn new(store: SharedCatalogStore, n_decimals: u32) -> Self {
        Self {
            store,
            n_decimals,
        }
    }

    /// Applies one batch: group, reconcile each group, recompute SPM.
    ///
    /// Returns the reconciled groups in annotation-label first-appearance
    /// order, carrying fresh averages. Their `spm` fields reflect the state
    /// before the final recompute pass; callers needing guaranteed-fresh SPM
    /// values must re-query after the batch completes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for malformed rows (before any
    /// write), [`CatalogError::Conflict`] under [`DuplicateSamplePolicy::Strict`]
    /// when any incoming sample label already exists for the gene (before
    /// any write), or the first store failure encountered mid-batch.
    pub fn ingest(
        &self,
        batch: &ExpressionBatch,
        policy: DuplicateSamplePolicy,
    ) -> Result<Vec<SampleAnnotationGroup>, CatalogError> {
        let groups = group_rows(&batch.rows, self.n_decimals)?;
        if policy == DuplicateSamplePolicy::Strict {
            self.enforce_no_existing_samples(batch)?;
        }

        let mut reconciled = Vec::with_capacity(groups.len());
        for (label, samples) in groups {
            let draft = GroupDraft {
                key: GroupKey {
                    species_id: batch.species_id,
                    gene_id: batch.gene_id,
                    annotation_type: batch.annotation_type.clone(),
                    label,
                },
                samples,
            };
            reconciled.push(reconcile(self.store.as_ref(), &draft, self.n_decimals)?);
        }

        let scope = SiblingScope {
            species_id: batch.species_id,
            gene_id: batch.gene_id,
            annotation_type: batch.annotation_type.clone(),
        };
        recompute_spm(self.store.as_ref(), &scope, self.n_decimals)?;
        Ok(reconciled)
    }

    /// Rejects the batch when any incoming sample label is already recorded
    /// for the gene, across all of its groups.
    fn enforce_no_existing_samples(&self, batch: &ExpressionBatch) -> Result<(), CatalogError> {
        let existing = self.store.gene_sample_labels(batch.species_id, batch.gene_id)?;
        let mut clashes: Vec<String> = batch
            .rows
            .iter()
            .map(|row| SampleLabel::new(&row.sample_label))
            .filter(|label| existing.contains(label))
            .map(|label| label.to_string())
            .collect();
        clashes.sort_unstable();
        clashes.dedup();
        if clashes.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::conflict(
                "sample labels (accessions) already exist for this gene; sample labels must be \
                 unique",
                clashes,
            ))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        reason = "Test-only pipeline assertions."
    )]

    use std::sync::Arc;

    use crate::core::round_to;
    use crate::interfaces::CatalogStore;
    use crate::runtime::store::InMemoryCatalogStore;

    use super::*;

    fn batch(rows: &[(&str, &str, f64)]) -> ExpressionBatch {
        ExpressionBatch {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(1).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
            rows: rows
                .iter()
                .map(|&(annotation, sample, tpm)| ExpressionRow {
                    annotation_label: annotation.to_string(),
                    sample_label: sample.to_string(),
                    tpm,
                })
                .collect(),
        }
    }

    fn pipeline(store: &Arc<InMemoryCatalogStore>) -> ExpressionPipeline {
        ExpressionPipeline::new(Arc::clone(store) as SharedCatalogStore, 3)
    }

    #[test]
    fn end_to_end_two_groups_with_spm() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let out = pipeline(&store)
            .ingest(
                &batch(&[("A", "s1", 10.0), ("A", "s2", 5.0), ("B", "s3", 15.0)]),
                DuplicateSamplePolicy::SkipDuplicates,
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key.label.as_str(), "A");
        assert_eq!(out[0].avg_tpm, 7.5);
        assert_eq!(out[1].avg_tpm, 15.0);

        let scope = SiblingScope {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(1).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
        };
        let siblings = store.sibling_groups(&scope).unwrap();
        let spm_a = siblings.iter().find(|g| g.key.label.as_str() == "A").unwrap().spm;
        let spm_b = siblings.iter().find(|g| g.key.label.as_str() == "B").unwrap().spm;
        assert_eq!(spm_a, 0.333);
        assert_eq!(spm_b, 0.667);
        assert_eq!(round_to(spm_a + spm_b, 3), 1.0);
    }

    #[test]
    fn returned_spm_reflects_pre_recompute_state() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let out = pipeline(&store)
            .ingest(&batch(&[("A", "s1", 10.0)]), DuplicateSamplePolicy::SkipDuplicates)
            .unwrap();
        // Fresh in the store, stale in the response.
        assert_eq!(out[0].spm, 0.0);
        assert_eq!(store.find_group(&out[0].key).unwrap().unwrap().spm, 1.0);
    }

    #[test]
    fn strict_policy_rejects_before_any_write() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let p = pipeline(&store);
        p.ingest(&batch(&[("A", "s1", 10.0)]), DuplicateSamplePolicy::SkipDuplicates).unwrap();

        let err = p
            .ingest(
                &batch(&[("B", "s2", 1.0), ("C", "s1", 2.0)]),
                DuplicateSamplePolicy::Strict,
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { .. }));

        // No group beyond the first batch's single one was written.
        let scope = SiblingScope {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(1).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
        };
        assert_eq!(store.sibling_groups(&scope).unwrap().len(), 1);
    }

    #[test]
    fn lenient_policy_drops_duplicates_without_error() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let p = pipeline(&store);
        p.ingest(&batch(&[("A", "s1", 10.0)]), DuplicateSamplePolicy::SkipDuplicates).unwrap();

        let out = p
            .ingest(
                &batch(&[("A", "s1", 99.0), ("B", "s2", 6.0)]),
                DuplicateSamplePolicy::SkipDuplicates,
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        let group_a = out.iter().find(|g| g.key.label.as_str() == "A").unwrap();
        assert_eq!(group_a.samples.len(), 1);
        assert_eq!(group_a.samples[0].tpm, 10.0);
    }

    #[test]
    fn validation_failure_writes_nothing() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let err = pipeline(&store)
            .ingest(
                &batch(&[("A", "s1", 10.0), ("B", "s2", f64::NAN)]),
                DuplicateSamplePolicy::SkipDuplicates,
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let scope = SiblingScope {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(1).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
        };
        assert!(store.sibling_groups(&scope).unwrap().is_empty());
    }

    #[test]
    fn second_batch_extends_spm_distribution() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let p = pipeline(&store);
        p.ingest(&batch(&[("A", "s1", 10.0)]), DuplicateSamplePolicy::SkipDuplicates).unwrap();
        p.ingest(&batch(&[("B", "s2", 30.0)]), DuplicateSamplePolicy::SkipDuplicates).unwrap();

        let scope = SiblingScope {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(1).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
        };
        let siblings = store.sibling_groups(&scope).unwrap();
        let spm_a = siblings.iter().find(|g| g.key.label.as_str() == "A").unwrap().spm;
        let spm_b = siblings.iter().find(|g| g.key.label.as_str() == "B").unwrap().spm;
        assert_eq!(spm_a, 0.25);
        assert_eq!(spm_b, 0.75);
    }
}
