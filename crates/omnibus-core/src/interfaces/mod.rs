// crates/omnibus-core/src/interfaces/mod.rs
// ============================================================================
// Module: Expression Omnibus Interfaces
// Description: Backend-agnostic storage interface for the omnibus catalog.
// Purpose: Define the contract surface between the core pipeline and stores.
// Dependencies: serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The [`CatalogStore`] trait is the only shared mutable resource in the
//! system. Implementations must provide per-document atomicity for each
//! create, append, and aggregate update; the core never assumes
//! multi-document transactions. Duplicate-key violations are reported
//! distinctly so the reconciler can retry a lost create race as a merge.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AnnotationLabel;
use crate::core::AnnotationType;
use crate::core::Gene;
use crate::core::GeneAnnotation;
use crate::core::GeneAnnotationId;
use crate::core::GeneId;
use crate::core::GroupDraft;
use crate::core::GroupId;
use crate::core::GroupKey;
use crate::core::NewGene;
use crate::core::NewGeneAnnotation;
use crate::core::NewSpecies;
use crate::core::Sample;
use crate::core::SampleAnnotationGroup;
use crate::core::SampleLabel;
use crate::core::SiblingScope;
use crate::core::Species;
use crate::core::SpeciesId;
use crate::core::TaxonId;

// ============================================================================
// SECTION: Pagination
// ============================================================================

/// A page request by 1-based page number with a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page_num: u64,
    /// Fixed page size.
    pub page_size: u64,
}

impl PageRequest {
    /// Creates a page request, clamping the page number to at least 1.
    #[must_use]
    pub const fn new(page_num: u64, page_size: u64) -> Self {
        Self {
            page_num: if page_num == 0 { 1 } else { page_num },
            page_size,
        }
    }

    /// Returns the row offset of this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    /// Returns the number of pages needed for `total` rows.
    #[must_use]
    pub const fn page_total(&self, total: u64) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            total.div_ceil(self.page_size)
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOf<T> {
    /// 1-based page number of this page.
    pub curr_page: u64,
    /// Total number of pages for the filtered set.
    pub page_total: u64,
    /// Rows on this page.
    pub payload: Vec<T>,
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Catalog store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `DuplicateKey` is reserved for unique-constraint violations so callers
///   can distinguish a lost create race from a hard failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("catalog store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("catalog store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("catalog store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("catalog store invalid data: {0}")]
    Invalid(String),
    /// Unique key already claimed.
    #[error("catalog store duplicate key: {0}")]
    DuplicateKey(String),
    /// Store reported an error.
    #[error("catalog store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Catalog Store
// ============================================================================

/// Shared handle to a catalog store implementation.
pub type SharedCatalogStore = Arc<dyn CatalogStore>;

/// Backend-agnostic catalog persistence.
///
/// Each method is a single atomic operation against the backing store.
pub trait CatalogStore: Send + Sync {
    // ------------------------------------------------------------------
    // Species
    // ------------------------------------------------------------------

    /// Inserts one species document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when the taxid already exists,
    /// or another [`StoreError`] on failure.
    fn insert_species(&self, input: &NewSpecies) -> Result<Species, StoreError>;

    /// Lists all species documents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_species(&self) -> Result<Vec<Species>, StoreError>;

    /// Finds a species by taxid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_species_by_taxid(&self, taxid: TaxonId) -> Result<Option<Species>, StoreError>;

    // ------------------------------------------------------------------
    // Genes
    // ------------------------------------------------------------------

    /// Inserts one gene document under a species.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when the label already exists
    /// within the species, or another [`StoreError`] on failure.
    fn insert_gene(&self, species_id: SpeciesId, input: &NewGene) -> Result<Gene, StoreError>;

    /// Lists all genes of a species.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_genes(&self, species_id: SpeciesId) -> Result<Vec<Gene>, StoreError>;

    /// Finds a gene by its main identifier label within a species.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_gene_by_label(
        &self,
        species_id: SpeciesId,
        label: &str,
    ) -> Result<Option<Gene>, StoreError>;

    /// Attaches gene-annotation identifiers to a gene, skipping ones
    /// already attached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn attach_gene_annotations(
        &self,
        gene_id: GeneId,
        annotation_ids: &[GeneAnnotationId],
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Gene Annotations
    // ------------------------------------------------------------------

    /// Inserts one gene-annotation document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when (type, label) already
    /// exists, or another [`StoreError`] on failure.
    fn insert_gene_annotation(
        &self,
        input: &NewGeneAnnotation,
    ) -> Result<GeneAnnotation, StoreError>;

    /// Finds a gene annotation by (type, label).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_gene_annotation(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
    ) -> Result<Option<GeneAnnotation>, StoreError>;

    /// Lists gene annotations with optional type/label filters, paginated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_gene_annotations(
        &self,
        annotation_type: Option<&AnnotationType>,
        label: Option<&AnnotationLabel>,
        page: &PageRequest,
    ) -> Result<PageOf<GeneAnnotation>, StoreError>;

    /// Appends gene identifiers to an annotation, skipping ones already
    /// attached, and returns the refreshed document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append_annotation_gene_ids(
        &self,
        id: GeneAnnotationId,
        gene_ids: &[GeneId],
    ) -> Result<GeneAnnotation, StoreError>;

    /// Deletes a gene annotation by (type, label); returns whether a
    /// document was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn delete_gene_annotation(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
    ) -> Result<bool, StoreError>;

    // ------------------------------------------------------------------
    // Sample-Annotation Groups
    // ------------------------------------------------------------------

    /// Finds a sample-annotation group by exact key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_group(&self, key: &GroupKey) -> Result<Option<SampleAnnotationGroup>, StoreError>;

    /// Persists a new group document with its precomputed average.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when the key was claimed by a
    /// concurrent writer, or another [`StoreError`] on failure.
    fn insert_group(
        &self,
        draft: &GroupDraft,
        avg_tpm: f64,
    ) -> Result<SampleAnnotationGroup, StoreError>;

    /// Atomically appends samples to an existing group, skipping samples
    /// whose label is already present, and returns the refreshed document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the group is missing or the write fails.
    fn append_group_samples(
        &self,
        id: GroupId,
        samples: &[Sample],
    ) -> Result<SampleAnnotationGroup, StoreError>;

    /// Point-updates a group's cached average.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set_group_avg(&self, id: GroupId, avg_tpm: f64) -> Result<(), StoreError>;

    /// Point-updates a group's cached SPM.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set_group_spm(&self, id: GroupId, spm: f64) -> Result<(), StoreError>;

    /// Fetches every group sharing a sibling scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn sibling_groups(
        &self,
        scope: &SiblingScope,
    ) -> Result<Vec<SampleAnnotationGroup>, StoreError>;

    /// Lists groups of one gene, paginated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn groups_by_gene(
        &self,
        species_id: SpeciesId,
        gene_id: GeneId,
        page: &PageRequest,
    ) -> Result<PageOf<SampleAnnotationGroup>, StoreError>;

    /// Lists groups of one (type, label) across genes, paginated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn groups_by_label(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
        page: &PageRequest,
    ) -> Result<PageOf<SampleAnnotationGroup>, StoreError>;

    /// Returns every sample label recorded for a gene across all of its
    /// groups, for the strict duplicate pre-check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn gene_sample_labels(
        &self,
        species_id: SpeciesId,
        gene_id: GeneId,
    ) -> Result<BTreeSet<SampleLabel>, StoreError>;
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only pagination assertions.")]

    use super::*;

    #[test]
    fn page_request_clamps_zero_to_first_page() {
        let page = PageRequest::new(0, 10);
        assert_eq!(page.page_num, 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn page_offsets_step_by_page_size() {
        let page = PageRequest::new(3, 10);
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn page_total_rounds_up() {
        let page = PageRequest::new(1, 10);
        assert_eq!(page.page_total(0), 0);
        assert_eq!(page.page_total(10), 1);
        assert_eq!(page.page_total(11), 2);
    }
}
