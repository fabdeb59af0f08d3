// crates/omnibus-core/src/runtime/grouping.rs
// ============================================================================
// Module: Expression Grouping Engine
// Description: Pure partition of expression rows into annotation-label groups.
// Purpose: Normalize, validate, and bucket raw TPM rows without any I/O.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The grouping engine takes a flat batch of TPM rows, already scoped to one
//! (species, gene, annotation type), and partitions them by annotation label.
//! It is a pure function: no side effects, no store access. Case
//! normalization of labels happens here, once, so downstream layers only see
//! canonical forms. Malformed rows reject the whole batch before any write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;

use crate::core::AnnotationLabel;
use crate::core::CatalogError;
use crate::core::ExpressionRow;
use crate::core::Sample;
use crate::core::SampleLabel;
use crate::core::round_to;

// ============================================================================
// SECTION: Grouping
// ============================================================================

/// Partitions rows into per-annotation-label sample groups.
///
/// Group keys are the distinct normalized annotation labels, in order of
/// first appearance. Sample values are rounded to `n_decimals`. A sample
/// label appearing twice under the same annotation label keeps its first
/// occurrence, preserving the per-group uniqueness invariant with the same
/// first-writer-wins policy the reconciler applies against the store.
///
/// # Errors
///
/// Returns [`CatalogError::Validation`] when a row carries a non-finite or
/// negative value, or an empty annotation or sample label.
pub fn group_rows(
    rows: &[ExpressionRow],
    n_decimals: u32,
) -> Result<Vec<(AnnotationLabel, Vec<Sample>)>, CatalogError> {
    let mut groups: Vec<(AnnotationLabel, Vec<Sample>)> = Vec::new();
    let mut index: HashMap<AnnotationLabel, usize> = HashMap::new();
    let mut seen: HashSet<(AnnotationLabel, SampleLabel)> = HashSet::new();

    for row in rows {
        validate_row(row)?;
        let annotation_label = AnnotationLabel::new(&row.annotation_label);
        let sample_label = SampleLabel::new(&row.sample_label);
        if !seen.insert((annotation_label.clone(), sample_label.clone())) {
            continue;
        }
        let sample = Sample {
            label: sample_label,
            tpm: round_to(row.tpm, n_decimals),
        };
        if let Some(&slot) = index.get(&annotation_label) {
            groups[slot].1.push(sample);
        } else {
            index.insert(annotation_label.clone(), groups.len());
            groups.push((annotation_label, vec![sample]));
        }
    }
    Ok(groups)
}

/// Rejects rows that must never reach the store.
fn validate_row(row: &ExpressionRow) -> Result<(), CatalogError> {
    if !row.tpm.is_finite() {
        return Err(CatalogError::Validation(format!(
            "sample {} carries a non-finite tpm value",
            row.sample_label
        )));
    }
    if row.tpm < 0.0 {
        return Err(CatalogError::Validation(format!(
            "sample {} carries a negative tpm value",
            row.sample_label
        )));
    }
    if row.annotation_label.trim().is_empty() {
        return Err(CatalogError::Validation(
            "row carries an empty annotation label".to_string(),
        ));
    }
    if row.sample_label.trim().is_empty() {
        return Err(CatalogError::Validation(
            "row carries an empty sample label".to_string(),
        ));
    }
    Ok(())
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
        reason = "Test-only grouping assertions."
    )]

    use proptest::prelude::*;

    use super::*;

    fn row(annotation: &str, sample: &str, tpm: f64) -> ExpressionRow {
        ExpressionRow {
            annotation_label: annotation.to_string(),
            sample_label: sample.to_string(),
            tpm,
        }
    }

    #[test]
    fn partitions_by_annotation_label() {
        let rows =
            vec![row("Anot A", "s1", 10.0), row("Anot A", "s2", 5.0), row("Anot B", "s3", 15.0)];
        let groups = group_rows(&rows, 3).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_str(), "ANOT A");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0.as_str(), "ANOT B");
        assert_eq!(groups[1].1[0].label.as_str(), "S3");
    }

    #[test]
    fn preserves_first_appearance_order() {
        let rows = vec![row("b", "s1", 1.0), row("a", "s2", 1.0), row("b", "s3", 1.0)];
        let groups = group_rows(&rows, 3).unwrap();
        assert_eq!(groups[0].0.as_str(), "B");
        assert_eq!(groups[1].0.as_str(), "A");
    }

    #[test]
    fn rounds_values_to_precision() {
        let rows = vec![row("a", "s1", 1.23456)];
        let groups = group_rows(&rows, 3).unwrap();
        assert_eq!(groups[0].1[0].tpm, 1.235);
    }

    #[test]
    fn case_variants_of_a_label_share_one_group() {
        let rows = vec![row("leaf", "s1", 1.0), row("LEAF", "s2", 2.0), row(" Leaf ", "s3", 3.0)];
        let groups = group_rows(&rows, 3).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn duplicate_sample_in_same_group_keeps_first() {
        let rows = vec![row("a", "s1", 1.0), row("a", "S1", 99.0)];
        let groups = group_rows(&rows, 3).unwrap();
        assert_eq!(groups[0].1.len(), 1);
        assert_eq!(groups[0].1[0].tpm, 1.0);
    }

    #[test]
    fn same_sample_may_appear_under_different_labels() {
        let rows = vec![row("a", "s1", 1.0), row("b", "s1", 2.0)];
        let groups = group_rows(&rows, 3).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 1);
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn rejects_non_finite_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = group_rows(&[row("a", "s1", bad)], 3).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)));
        }
    }

    #[test]
    fn rejects_negative_values_and_empty_labels() {
        assert!(matches!(
            group_rows(&[row("a", "s1", -0.5)], 3),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            group_rows(&[row("  ", "s1", 1.0)], 3),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            group_rows(&[row("a", "", 1.0)], 3),
            Err(CatalogError::Validation(_))
        ));
    }

    proptest! {
        #[test]
        fn every_row_lands_in_exactly_one_group(
            rows in prop::collection::vec(
                ("[a-d]", "[a-z]{1,6}", 0.0f64..1_000.0),
                0..40,
            )
        ) {
            let rows: Vec<ExpressionRow> = rows
                .into_iter()
                .map(|(a, s, tpm)| row(&a, &s, tpm))
                .collect();
            let distinct_pairs: HashSet<(AnnotationLabel, SampleLabel)> = rows
                .iter()
                .map(|r| (AnnotationLabel::new(&r.annotation_label), SampleLabel::new(&r.sample_label)))
                .collect();
            let distinct_labels: HashSet<AnnotationLabel> = rows
                .iter()
                .map(|r| AnnotationLabel::new(&r.annotation_label))
                .collect();

            let groups = group_rows(&rows, 3).unwrap();
            prop_assert_eq!(groups.len(), distinct_labels.len());
            let total: usize = groups.iter().map(|(_, samples)| samples.len()).sum();
            prop_assert_eq!(total, distinct_pairs.len());
        }
    }
}
