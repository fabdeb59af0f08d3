// crates/omnibus-core/src/runtime/aggregate.rs
// ============================================================================
// Module: Expression Aggregate Maintainer
// Description: Running-average and SPM recomputation for group documents.
// Purpose: Keep cached aggregates consistent with the current sample sets.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The aggregate maintainer owns the two derived fields on a group document.
//! `avg_tpm` is recomputed from the full sample list after every append.
//! `spm` (specificity measure) is a group's share of the total average
//! across all sibling groups under one (species, gene, annotation type)
//! scope; it is always recomputed in full from a fresh sibling read rather
//! than incrementally, because sibling membership grows as new annotation
//! labels appear and a delta update would have to special-case them.
//!
//! Concurrent writers touching siblings between the snapshot read and the
//! point updates can leave a stale `spm`; the next batch touching the scope
//! fully recomputes and corrects it (last full recompute wins).

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::CatalogError;
use crate::core::Sample;
use crate::core::SiblingScope;
use crate::core::round_to;
use crate::interfaces::CatalogStore;

// ============================================================================
// SECTION: Averages
// ============================================================================

/// Computes the rounded arithmetic mean of a sample list.
///
/// Defined as 0 for an empty list: empty groups should not normally occur
/// but must not raise.
#[must_use]
pub fn recompute_group_average(samples: &[Sample], n_decimals: u32) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|sample| sample.tpm).sum();
    #[allow(clippy::cast_precision_loss, reason = "Sample counts stay far below 2^52.")]
    round_to(sum / samples.len() as f64, n_decimals)
}

// ============================================================================
// SECTION: SPM
// ============================================================================

/// Recomputes and persists the SPM of every group in a sibling scope.
///
/// Invoked once per input batch, after all groups in the batch have had
/// their averages updated. After it completes, the sibling set is internally
/// consistent as of the snapshot read: all SPM values sum to 1.0 (within
/// rounding) when the total average is positive, and are all 0 when it is 0.
///
/// # Errors
///
/// Returns [`CatalogError::Store`] when the sibling read or a point update
/// fails; remaining updates are aborted at the point of failure.
pub fn recompute_spm(
    store: &dyn CatalogStore,
    scope: &SiblingScope,
    n_decimals: u32,
) -> Result<(), CatalogError> {
    let siblings = store.sibling_groups(scope)?;
    let total = round_to(siblings.iter().map(|group| group.avg_tpm).sum(), n_decimals);
    for group in &siblings {
        let spm = if total == 0.0 {
            0.0
        } else {
            round_to(group.avg_tpm / total, n_decimals)
        };
        store.set_group_spm(group.id, spm)?;
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
        reason = "Test-only aggregate assertions."
    )]

    use crate::core::SampleLabel;
    use crate::runtime::store::InMemoryCatalogStore;
    use crate::runtime::tests::seed_scope;

    use super::*;

    fn sample(label: &str, tpm: f64) -> Sample {
        Sample {
            label: SampleLabel::new(label),
            tpm,
        }
    }

    #[test]
    fn average_of_two_samples() {
        assert_eq!(recompute_group_average(&[sample("s1", 10.0), sample("s2", 5.0)], 3), 7.5);
    }

    #[test]
    fn average_of_empty_list_is_zero() {
        assert_eq!(recompute_group_average(&[], 3), 0.0);
    }

    #[test]
    fn average_is_rounded() {
        let samples = [sample("s1", 1.0), sample("s2", 1.0), sample("s3", 2.0)];
        assert_eq!(recompute_group_average(&samples, 3), 1.333);
    }

    #[test]
    fn spm_normalizes_across_siblings() {
        let store = InMemoryCatalogStore::new();
        let scope = seed_scope(
            &store,
            &[("A", &[("s1", 10.0), ("s2", 5.0)]), ("B", &[("s3", 15.0)])],
            3,
        );
        recompute_spm(&store, &scope, 3).unwrap();

        let siblings = store.sibling_groups(&scope).unwrap();
        assert_eq!(siblings.len(), 2);
        let spm_a = siblings.iter().find(|g| g.key.label.as_str() == "A").unwrap().spm;
        let spm_b = siblings.iter().find(|g| g.key.label.as_str() == "B").unwrap().spm;
        assert_eq!(spm_a, 0.333);
        assert_eq!(spm_b, 0.667);
        assert_eq!(round_to(spm_a + spm_b, 3), 1.0);
    }

    #[test]
    fn spm_is_zero_when_total_average_is_zero() {
        let store = InMemoryCatalogStore::new();
        let scope = seed_scope(&store, &[("A", &[("s1", 0.0)]), ("B", &[("s2", 0.0)])], 3);
        recompute_spm(&store, &scope, 3).unwrap();

        for group in store.sibling_groups(&scope).unwrap() {
            assert_eq!(group.spm, 0.0);
        }
    }

    #[test]
    fn spm_of_a_lone_group_is_one() {
        let store = InMemoryCatalogStore::new();
        let scope = seed_scope(&store, &[("A", &[("s1", 4.2)])], 3);
        recompute_spm(&store, &scope, 3).unwrap();

        let siblings = store.sibling_groups(&scope).unwrap();
        assert_eq!(siblings[0].spm, 1.0);
    }
}
