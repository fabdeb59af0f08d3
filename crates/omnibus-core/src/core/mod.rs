// crates/omnibus-core/src/core/mod.rs
// ============================================================================
// Module: Expression Omnibus Core Types
// Description: Canonical catalog and expression document structures.
// Purpose: Provide stable, serializable types for the omnibus catalog.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define the catalog documents (species, genes, gene
//! annotations), the expression unit (sample-annotation groups with cached
//! aggregates), and the error taxonomy. These types are the canonical source
//! of truth for the HTTP surface and the storage backends.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod catalog;
pub mod errors;
pub mod expression;
pub mod identifiers;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CdsInfo;
pub use catalog::Gene;
pub use catalog::GeneAnnotation;
pub use catalog::NewGene;
pub use catalog::NewGeneAnnotation;
pub use catalog::NewSpecies;
pub use catalog::QcStats;
pub use catalog::Species;
pub use errors::CatalogError;
pub use expression::DEFAULT_PRECISION;
pub use expression::ExpressionRow;
pub use expression::GroupDraft;
pub use expression::GroupKey;
pub use expression::MAX_PRECISION;
pub use expression::Sample;
pub use expression::SampleAnnotationGroup;
pub use expression::SiblingScope;
pub use expression::round_to;
pub use identifiers::AnnotationLabel;
pub use identifiers::AnnotationType;
pub use identifiers::GeneAnnotationId;
pub use identifiers::GeneId;
pub use identifiers::GroupId;
pub use identifiers::SampleLabel;
pub use identifiers::SpeciesId;
pub use identifiers::TaxonId;
