// crates/omnibus-core/src/runtime/store.rs
// ============================================================================
// Module: Expression Omnibus In-Memory Store
// Description: Simple in-memory catalog store for tests and examples.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of
//! [`CatalogStore`] for tests and local demos. It is not intended for
//! production use. Every method takes the single interior mutex for its
//! whole duration, which trivially satisfies the per-document atomicity the
//! interface requires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

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
use crate::interfaces::CatalogStore;
use crate::interfaces::PageOf;
use crate::interfaces::PageRequest;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable catalog state behind the store mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Species documents keyed by raw identifier.
    species: BTreeMap<u64, Species>,
    /// Gene documents keyed by raw identifier.
    genes: BTreeMap<u64, Gene>,
    /// Gene-annotation documents keyed by raw identifier.
    annotations: BTreeMap<u64, GeneAnnotation>,
    /// Sample-annotation groups keyed by raw identifier.
    groups: BTreeMap<u64, SampleAnnotationGroup>,
    /// Next raw identifier to assign (shared across entities).
    next_id: u64,
}

impl Inner {
    /// Allocates the next 1-based raw identifier.
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory catalog store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalogStore {
    /// Catalog state protected by a mutex.
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryCatalogStore {
    /// Creates a new, empty in-memory catalog store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Store("catalog store mutex poisoned".to_string()))
    }
}

/// Converts a raw identifier into its non-zero form.
fn nonzero(raw: u64) -> Result<u64, StoreError> {
    if raw == 0 {
        Err(StoreError::Invalid("identifier must be non-zero".to_string()))
    } else {
        Ok(raw)
    }
}

/// Builds one page out of a fully filtered row set.
fn paginate<T>(rows: Vec<T>, page: &PageRequest) -> PageOf<T> {
    let total = rows.len() as u64;
    let payload = rows
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.page_size).unwrap_or(usize::MAX))
        .collect();
    PageOf {
        curr_page: page.page_num,
        page_total: page.page_total(total),
        payload,
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn insert_species(&self, input: &NewSpecies) -> Result<Species, StoreError> {
        let mut inner = self.lock()?;
        if inner.species.values().any(|species| species.taxid == input.taxid) {
            return Err(StoreError::DuplicateKey(format!("species taxid {}", input.taxid)));
        }
        let raw = nonzero(inner.allocate())?;
        let id = SpeciesId::from_raw(raw)
            .ok_or_else(|| StoreError::Invalid("species id allocation failed".to_string()))?;
        let species = Species {
            id,
            taxid: input.taxid,
            name: input.name.clone(),
            alias: input.alias.clone(),
            cds: input.cds.clone(),
            qc_stats: input.qc_stats.clone(),
        };
        inner.species.insert(raw, species.clone());
        Ok(species)
    }

    fn list_species(&self) -> Result<Vec<Species>, StoreError> {
        Ok(self.lock()?.species.values().cloned().collect())
    }

    fn find_species_by_taxid(&self, taxid: TaxonId) -> Result<Option<Species>, StoreError> {
        Ok(self.lock()?.species.values().find(|species| species.taxid == taxid).cloned())
    }

    fn insert_gene(&self, species_id: SpeciesId, input: &NewGene) -> Result<Gene, StoreError> {
        let mut inner = self.lock()?;
        let clash = inner
            .genes
            .values()
            .any(|gene| gene.species_id == species_id && gene.label == input.label);
        if clash {
            return Err(StoreError::DuplicateKey(format!("gene label {}", input.label)));
        }
        let raw = nonzero(inner.allocate())?;
        let id = GeneId::from_raw(raw)
            .ok_or_else(|| StoreError::Invalid("gene id allocation failed".to_string()))?;
        let gene = Gene {
            id,
            species_id,
            label: input.label.clone(),
            alias: input.alias.clone(),
            annotations: Vec::new(),
        };
        inner.genes.insert(raw, gene.clone());
        Ok(gene)
    }

    fn list_genes(&self, species_id: SpeciesId) -> Result<Vec<Gene>, StoreError> {
        Ok(self
            .lock()?
            .genes
            .values()
            .filter(|gene| gene.species_id == species_id)
            .cloned()
            .collect())
    }

    fn find_gene_by_label(
        &self,
        species_id: SpeciesId,
        label: &str,
    ) -> Result<Option<Gene>, StoreError> {
        Ok(self
            .lock()?
            .genes
            .values()
            .find(|gene| gene.species_id == species_id && gene.label == label)
            .cloned())
    }

    fn attach_gene_annotations(
        &self,
        gene_id: GeneId,
        annotation_ids: &[GeneAnnotationId],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let gene = inner
            .genes
            .get_mut(&gene_id.get())
            .ok_or_else(|| StoreError::Invalid(format!("gene {gene_id} not found")))?;
        for id in annotation_ids {
            if !gene.annotations.contains(id) {
                gene.annotations.push(*id);
            }
        }
        Ok(())
    }

    fn insert_gene_annotation(
        &self,
        input: &NewGeneAnnotation,
    ) -> Result<GeneAnnotation, StoreError> {
        let mut inner = self.lock()?;
        let clash = inner.annotations.values().any(|annotation| {
            annotation.annotation_type == input.annotation_type && annotation.label == input.label
        });
        if clash {
            return Err(StoreError::DuplicateKey(format!(
                "gene annotation {}/{}",
                input.annotation_type, input.label
            )));
        }
        let raw = nonzero(inner.allocate())?;
        let id = GeneAnnotationId::from_raw(raw)
            .ok_or_else(|| StoreError::Invalid("annotation id allocation failed".to_string()))?;
        let annotation = GeneAnnotation {
            id,
            annotation_type: input.annotation_type.clone(),
            label: input.label.clone(),
            details: input.details.clone(),
            gene_ids: input.gene_ids.clone(),
        };
        inner.annotations.insert(raw, annotation.clone());
        Ok(annotation)
    }

    fn find_gene_annotation(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
    ) -> Result<Option<GeneAnnotation>, StoreError> {
        Ok(self
            .lock()?
            .annotations
            .values()
            .find(|annotation| {
                annotation.annotation_type == *annotation_type && annotation.label == *label
            })
            .cloned())
    }

    fn list_gene_annotations(
        &self,
        annotation_type: Option<&AnnotationType>,
        label: Option<&AnnotationLabel>,
        page: &PageRequest,
    ) -> Result<PageOf<GeneAnnotation>, StoreError> {
        let rows: Vec<GeneAnnotation> = self
            .lock()?
            .annotations
            .values()
            .filter(|annotation| {
                annotation_type.is_none_or(|wanted| annotation.annotation_type == *wanted)
                    && label.is_none_or(|wanted| annotation.label == *wanted)
            })
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    fn append_annotation_gene_ids(
        &self,
        id: GeneAnnotationId,
        gene_ids: &[GeneId],
    ) -> Result<GeneAnnotation, StoreError> {
        let mut inner = self.lock()?;
        let annotation = inner
            .annotations
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::Invalid(format!("gene annotation {id} not found")))?;
        for gene_id in gene_ids {
            if !annotation.gene_ids.contains(gene_id) {
                annotation.gene_ids.push(*gene_id);
            }
        }
        Ok(annotation.clone())
    }

    fn delete_gene_annotation(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let found = inner
            .annotations
            .iter()
            .find(|(_, annotation)| {
                annotation.annotation_type == *annotation_type && annotation.label == *label
            })
            .map(|(raw, _)| *raw);
        Ok(match found {
            Some(raw) => inner.annotations.remove(&raw).is_some(),
            None => false,
        })
    }

    fn find_group(&self, key: &GroupKey) -> Result<Option<SampleAnnotationGroup>, StoreError> {
        Ok(self.lock()?.groups.values().find(|group| group.key == *key).cloned())
    }

    fn insert_group(
        &self,
        draft: &GroupDraft,
        avg_tpm: f64,
    ) -> Result<SampleAnnotationGroup, StoreError> {
        let mut inner = self.lock()?;
        if inner.groups.values().any(|group| group.key == draft.key) {
            return Err(StoreError::DuplicateKey(format!(
                "sample annotation group {}/{}",
                draft.key.annotation_type, draft.key.label
            )));
        }
        let raw = nonzero(inner.allocate())?;
        let id = GroupId::from_raw(raw)
            .ok_or_else(|| StoreError::Invalid("group id allocation failed".to_string()))?;
        let group = SampleAnnotationGroup {
            id,
            key: draft.key.clone(),
            samples: draft.samples.clone(),
            avg_tpm,
            spm: 0.0,
        };
        inner.groups.insert(raw, group.clone());
        Ok(group)
    }

    fn append_group_samples(
        &self,
        id: GroupId,
        samples: &[Sample],
    ) -> Result<SampleAnnotationGroup, StoreError> {
        let mut inner = self.lock()?;
        let group = inner
            .groups
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::Invalid(format!("sample annotation group {id} not found")))?;
        let current: BTreeSet<SampleLabel> =
            group.samples.iter().map(|sample| sample.label.clone()).collect();
        for sample in samples {
            if !current.contains(&sample.label) {
                group.samples.push(sample.clone());
            }
        }
        Ok(group.clone())
    }

    fn set_group_avg(&self, id: GroupId, avg_tpm: f64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let group = inner
            .groups
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::Invalid(format!("sample annotation group {id} not found")))?;
        group.avg_tpm = avg_tpm;
        Ok(())
    }

    fn set_group_spm(&self, id: GroupId, spm: f64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let group = inner
            .groups
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::Invalid(format!("sample annotation group {id} not found")))?;
        group.spm = spm;
        Ok(())
    }

    fn sibling_groups(
        &self,
        scope: &SiblingScope,
    ) -> Result<Vec<SampleAnnotationGroup>, StoreError> {
        Ok(self
            .lock()?
            .groups
            .values()
            .filter(|group| {
                group.key.species_id == scope.species_id
                    && group.key.gene_id == scope.gene_id
                    && group.key.annotation_type == scope.annotation_type
            })
            .cloned()
            .collect())
    }

    fn groups_by_gene(
        &self,
        species_id: SpeciesId,
        gene_id: GeneId,
        page: &PageRequest,
    ) -> Result<PageOf<SampleAnnotationGroup>, StoreError> {
        let rows: Vec<SampleAnnotationGroup> = self
            .lock()?
            .groups
            .values()
            .filter(|group| group.key.species_id == species_id && group.key.gene_id == gene_id)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    fn groups_by_label(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
        page: &PageRequest,
    ) -> Result<PageOf<SampleAnnotationGroup>, StoreError> {
        let rows: Vec<SampleAnnotationGroup> = self
            .lock()?
            .groups
            .values()
            .filter(|group| {
                group.key.annotation_type == *annotation_type && group.key.label == *label
            })
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    fn gene_sample_labels(
        &self,
        species_id: SpeciesId,
        gene_id: GeneId,
    ) -> Result<BTreeSet<SampleLabel>, StoreError> {
        Ok(self
            .lock()?
            .groups
            .values()
            .filter(|group| group.key.species_id == species_id && group.key.gene_id == gene_id)
            .flat_map(|group| group.samples.iter().map(|sample| sample.label.clone()))
            .collect())
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
        reason = "Test-only store assertions."
    )]

    use crate::core::AnnotationLabel;

    use super::*;

    fn draft(label: &str, samples: &[(&str, f64)]) -> GroupDraft {
        GroupDraft {
            key: GroupKey {
                species_id: SpeciesId::from_raw(1).unwrap(),
                gene_id: GeneId::from_raw(1).unwrap(),
                annotation_type: AnnotationType::new("tissue"),
                label: AnnotationLabel::new(label),
            },
            samples: samples
                .iter()
                .map(|&(label, tpm)| Sample {
                    label: SampleLabel::new(label),
                    tpm,
                })
                .collect(),
        }
    }

    #[test]
    fn insert_group_rejects_duplicate_key() {
        let store = InMemoryCatalogStore::new();
        store.insert_group(&draft("A", &[("s1", 1.0)]), 1.0).unwrap();
        let err = store.insert_group(&draft("a", &[("s2", 2.0)]), 2.0).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[test]
    fn append_skips_samples_already_present() {
        let store = InMemoryCatalogStore::new();
        let group = store.insert_group(&draft("A", &[("s1", 1.0)]), 1.0).unwrap();
        let refreshed = store
            .append_group_samples(
                group.id,
                &[
                    Sample {
                        label: SampleLabel::new("s1"),
                        tpm: 9.0,
                    },
                    Sample {
                        label: SampleLabel::new("s2"),
                        tpm: 2.0,
                    },
                ],
            )
            .unwrap();
        assert_eq!(refreshed.samples.len(), 2);
        assert_eq!(refreshed.samples[0].tpm, 1.0);
    }

    #[test]
    fn gene_sample_labels_span_all_groups() {
        let store = InMemoryCatalogStore::new();
        store.insert_group(&draft("A", &[("s1", 1.0)]), 1.0).unwrap();
        store.insert_group(&draft("B", &[("s2", 2.0), ("s1", 3.0)]), 2.5).unwrap();
        let labels = store
            .gene_sample_labels(SpeciesId::from_raw(1).unwrap(), GeneId::from_raw(1).unwrap())
            .unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&SampleLabel::new("s1")));
    }

    #[test]
    fn species_taxid_is_unique() {
        let store = InMemoryCatalogStore::new();
        let input = NewSpecies {
            taxid: TaxonId::new(3702),
            name: "Arabidopsis thaliana".to_string(),
            alias: vec!["thale cress".to_string()],
            cds: crate::core::CdsInfo {
                url: None,
                source: "TAIR".to_string(),
                release_date: time::macros::date!(2022 - 06 - 15),
            },
            qc_stats: crate::core::QcStats {
                log_processed: 2.1,
                p_pseudoaligned: 85,
            },
        };
        store.insert_species(&input).unwrap();
        let err = store.insert_species(&input).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[test]
    fn pagination_splits_rows() {
        let store = InMemoryCatalogStore::new();
        for i in 0..15 {
            store.insert_group(&draft(&format!("L{i}"), &[("s", 1.0)]), 1.0).unwrap();
        }
        let page = store
            .groups_by_gene(
                SpeciesId::from_raw(1).unwrap(),
                GeneId::from_raw(1).unwrap(),
                &PageRequest::new(2, 10),
            )
            .unwrap();
        assert_eq!(page.curr_page, 2);
        assert_eq!(page.page_total, 2);
        assert_eq!(page.payload.len(), 5);
    }
}
