// crates/omnibus-core/src/core/catalog.rs
// ============================================================================
// Module: Expression Omnibus Catalog Documents
// Description: Species, gene, and gene-annotation document types.
// Purpose: Define the persisted catalog entities and their input forms.
// Dependencies: serde, serde_json, time, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Catalog documents are the non-expression entities of the omnibus: species,
//! genes, and gene annotations. Each entity has an input form (what callers
//! submit) and a persisted form carrying its store-assigned identifier.
//! Gene-annotation keys (type + label) are case-normalized at construction
//! through the identifier newtypes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::Date;

use crate::core::identifiers::AnnotationLabel;
use crate::core::identifiers::AnnotationType;
use crate::core::identifiers::GeneAnnotationId;
use crate::core::identifiers::GeneId;
use crate::core::identifiers::SpeciesId;
use crate::core::identifiers::TaxonId;

// ============================================================================
// SECTION: Species
// ============================================================================

/// Coding-sequence provenance for a species assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdsInfo {
    /// Download URL for the CDS archive, when public.
    #[serde(default)]
    pub url: Option<String>,
    /// Source database name (e.g. Ensembl, Phytozome).
    pub source: String,
    /// Release date of the CDS build.
    pub release_date: Date,
}

/// Quality-control statistics from expression quantification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcStats {
    /// Log of processed reads.
    #[serde(default)]
    pub log_processed: f64,
    /// Percentage of reads pseudoaligned (0..=100).
    #[serde(default)]
    pub p_pseudoaligned: u8,
}

/// Species submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpecies {
    /// NCBI taxonomic identifier (unique across the catalog).
    pub taxid: TaxonId,
    /// Scientific name.
    pub name: String,
    /// Alternative names.
    #[serde(default)]
    pub alias: Vec<String>,
    /// CDS provenance.
    pub cds: CdsInfo,
    /// QC statistics.
    pub qc_stats: QcStats,
}

/// Persisted species document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Store-assigned identifier.
    pub id: SpeciesId,
    /// NCBI taxonomic identifier.
    pub taxid: TaxonId,
    /// Scientific name.
    pub name: String,
    /// Alternative names.
    pub alias: Vec<String>,
    /// CDS provenance.
    pub cds: CdsInfo,
    /// QC statistics.
    pub qc_stats: QcStats,
}

// ============================================================================
// SECTION: Genes
// ============================================================================

/// Gene submission payload, scoped to one species by the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGene {
    /// Main gene identifier label, unique within the species.
    pub label: String,
    /// Alternative identifiers.
    #[serde(default)]
    pub alias: Vec<String>,
}

/// Persisted gene document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    /// Store-assigned identifier.
    pub id: GeneId,
    /// Owning species.
    pub species_id: SpeciesId,
    /// Main gene identifier label.
    pub label: String,
    /// Alternative identifiers.
    pub alias: Vec<String>,
    /// Attached gene-annotation identifiers.
    pub annotations: Vec<GeneAnnotationId>,
}

// ============================================================================
// SECTION: Gene Annotations
// ============================================================================

/// Gene-annotation submission payload.
///
/// # Invariants
/// - `annotation_type` + `label` are unique together in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGeneAnnotation {
    /// Annotation type (e.g. Gene Ontology, Mapman).
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Annotation identifier within the type.
    pub label: AnnotationLabel,
    /// Free-form annotation details.
    #[serde(default)]
    pub details: Option<Value>,
    /// Genes this annotation applies to.
    #[serde(default)]
    pub gene_ids: Vec<GeneId>,
}

/// Persisted gene-annotation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneAnnotation {
    /// Store-assigned identifier.
    pub id: GeneAnnotationId,
    /// Annotation type.
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Annotation identifier within the type.
    pub label: AnnotationLabel,
    /// Free-form annotation details.
    pub details: Option<Value>,
    /// Genes this annotation applies to.
    pub gene_ids: Vec<GeneId>,
}
