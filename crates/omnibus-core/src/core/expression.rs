// crates/omnibus-core/src/core/expression.rs
// ============================================================================
// Module: Expression Omnibus Expression Types
// Description: Samples, sample-annotation groups, and decimal rounding.
// Purpose: Define the persisted expression unit and its derived aggregates.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A [`SampleAnnotationGroup`] is the persisted expression unit: all samples
//! sharing one annotation label for one gene of one species, together with
//! the cached aggregates derived from them (`avg_tpm` and `spm`). Samples are
//! owned exclusively by their group and have no independent lifecycle.
//!
//! Aggregates are rounded to a fixed decimal precision before persistence and
//! before output; the rounding helper here is the single definition used by
//! every layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AnnotationLabel;
use crate::core::identifiers::AnnotationType;
use crate::core::identifiers::GeneId;
use crate::core::identifiers::GroupId;
use crate::core::identifiers::SampleLabel;
use crate::core::identifiers::SpeciesId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default decimal precision for persisted aggregates.
pub const DEFAULT_PRECISION: u32 = 3;

/// Maximum supported decimal precision.
///
/// f64 holds ~15 significant decimal digits; beyond 9 fractional digits the
/// scaling factor itself starts eating the mantissa for TPM-scale values.
pub const MAX_PRECISION: u32 = 9;

// ============================================================================
// SECTION: Samples
// ============================================================================

/// One expression measurement within a sample-annotation group.
///
/// # Invariants
/// - `label` is unique across the samples of a single group.
/// - `tpm` is finite and >= 0, rounded to the configured precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample accession label.
    pub label: SampleLabel,
    /// Expression value in transcripts per million.
    pub tpm: f64,
}

/// One raw input row of a sample-annotation batch, before normalization.
///
/// Rows are scoped externally to one (species, gene, annotation type); the
/// grouping engine partitions them by `annotation_label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionRow {
    /// Annotation label this measurement belongs to.
    pub annotation_label: String,
    /// Sample accession label.
    pub sample_label: String,
    /// Expression value in transcripts per million.
    pub tpm: f64,
}

// ============================================================================
// SECTION: Groups
// ============================================================================

/// Unique key of a sample-annotation group.
///
/// # Invariants
/// - Exactly one group document exists per key.
/// - `annotation_type` and `annotation_label` are case-normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Owning species.
    pub species_id: SpeciesId,
    /// Owning gene.
    pub gene_id: GeneId,
    /// Annotation type.
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Annotation label.
    pub label: AnnotationLabel,
}

impl GroupKey {
    /// Returns the sibling scope of this key (everything except the label).
    #[must_use]
    pub fn scope(&self) -> SiblingScope {
        SiblingScope {
            species_id: self.species_id,
            gene_id: self.gene_id,
            annotation_type: self.annotation_type.clone(),
        }
    }
}

/// The scope shared by sibling groups whose SPM values normalize together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiblingScope {
    /// Owning species.
    pub species_id: SpeciesId,
    /// Owning gene.
    pub gene_id: GeneId,
    /// Annotation type.
    pub annotation_type: AnnotationType,
}

/// A fully populated, not-yet-persisted sample-annotation group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDraft {
    /// Group key.
    #[serde(flatten)]
    pub key: GroupKey,
    /// Samples to persist or merge.
    pub samples: Vec<Sample>,
}

/// Persisted sample-annotation group with cached aggregates.
///
/// # Invariants
/// - `avg_tpm` equals the rounded mean of `samples[*].tpm` after every
///   successful write.
/// - `spm` values across all sibling groups sum to 1.0 (within rounding)
///   whenever the sibling total is positive, and are all 0 otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAnnotationGroup {
    /// Store-assigned identifier.
    pub id: GroupId,
    /// Group key.
    #[serde(flatten)]
    pub key: GroupKey,
    /// Samples grouped under this annotation label.
    pub samples: Vec<Sample>,
    /// Arithmetic mean of sample TPM values, rounded.
    pub avg_tpm: f64,
    /// This group's share of the sibling-total average, rounded.
    pub spm: f64,
}

// ============================================================================
// SECTION: Rounding
// ============================================================================

/// Rounds `value` to `n_decimals` fractional digits, half away from zero.
#[must_use]
pub fn round_to(value: f64, n_decimals: u32) -> f64 {
    let factor = 10f64.powi(n_decimals.min(MAX_PRECISION) as i32);
    (value * factor).round() / factor
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp, reason = "Test-only rounding assertions.")]

    use super::*;

    #[test]
    fn round_to_three_decimals() {
        assert_eq!(round_to(1.0 / 3.0, 3), 0.333);
        assert_eq!(round_to(2.0 / 3.0, 3), 0.667);
        assert_eq!(round_to(7.5, 3), 7.5);
        assert_eq!(round_to(0.0, 3), 0.0);
    }

    #[test]
    fn round_to_caps_precision() {
        assert_eq!(round_to(0.123_456_789_123, MAX_PRECISION + 5), 0.123_456_789);
    }

    #[test]
    fn group_key_serializes_with_wire_names() {
        let key = GroupKey {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(2).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
            label: AnnotationLabel::new("leaf"),
        };
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["type"], "TISSUE");
        assert_eq!(json["label"], "LEAF");
    }

    #[test]
    fn scope_drops_the_label() {
        let key = GroupKey {
            species_id: SpeciesId::from_raw(1).unwrap(),
            gene_id: GeneId::from_raw(2).unwrap(),
            annotation_type: AnnotationType::new("tissue"),
            label: AnnotationLabel::new("leaf"),
        };
        let scope = key.scope();
        assert_eq!(scope.annotation_type, key.annotation_type);
        assert_eq!(scope.gene_id, key.gene_id);
    }
}
