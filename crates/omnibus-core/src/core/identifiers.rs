// crates/omnibus-core/src/core/identifiers.rs
// ============================================================================
// Module: Expression Omnibus Identifiers
// Description: Canonical opaque identifiers and normalized label strings.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Expression
//! Omnibus. Store-assigned identifiers are opaque, non-zero, and 1-based.
//! Annotation and sample labels are case-normalized to upper case at
//! construction so the normalization invariant lives in exactly one place
//! rather than being re-derived per entity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Store-Assigned Identifiers
// ============================================================================

/// Species identifier assigned by the catalog store.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(NonZeroU64);

impl SpeciesId {
    /// Creates a new species identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a species identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Gene identifier assigned by the catalog store.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneId(NonZeroU64);

impl GeneId {
    /// Creates a new gene identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a gene identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for GeneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Gene-annotation identifier assigned by the catalog store.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneAnnotationId(NonZeroU64);

impl GeneAnnotationId {
    /// Creates a new gene-annotation identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a gene-annotation identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for GeneAnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Sample-annotation group identifier assigned by the catalog store.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(NonZeroU64);

impl GroupId {
    /// Creates a new group identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a group identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// NCBI taxonomic identifier for a species.
///
/// # Invariants
/// - Opaque positive integer; uniqueness is enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonId(u32);

impl TaxonId {
    /// Creates a new taxonomic identifier.
    #[must_use]
    pub const fn new(taxid: u32) -> Self {
        Self(taxid)
    }

    /// Returns the raw taxid value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Normalized Labels
// ============================================================================

/// Annotation type label (e.g. a tissue/organ ontology category).
///
/// # Invariants
/// - Upper-cased and whitespace-trimmed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationType(String);

impl AnnotationType {
    /// Creates a normalized annotation type.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    /// Returns the normalized label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Annotation label within a type (e.g. a specific tissue name).
///
/// # Invariants
/// - Upper-cased and whitespace-trimmed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationLabel(String);

impl AnnotationLabel {
    /// Creates a normalized annotation label.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    /// Returns the normalized label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sample accession label.
///
/// # Invariants
/// - Upper-cased and whitespace-trimmed at construction.
/// - Unique within one sample-annotation group; the same label may appear
///   under different annotation labels by design.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleLabel(String);

impl SampleLabel {
    /// Creates a normalized sample label.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    /// Returns the normalized label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes a raw label to its canonical upper-cased, trimmed form.
fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only identifier assertions.")]

    use super::*;

    #[test]
    fn labels_normalize_to_upper_case() {
        assert_eq!(AnnotationType::new("tissue").as_str(), "TISSUE");
        assert_eq!(AnnotationLabel::new("  leaf  ").as_str(), "LEAF");
        assert_eq!(SampleLabel::new("srx123").as_str(), "SRX123");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = SampleLabel::new("Sample 1");
        let twice = SampleLabel::new(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn ids_reject_zero() {
        assert!(SpeciesId::from_raw(0).is_none());
        assert!(GeneId::from_raw(0).is_none());
        assert_eq!(GroupId::from_raw(7).unwrap().get(), 7);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = GeneId::from_raw(42).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
    }
}
