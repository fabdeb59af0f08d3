// crates/omnibus-core/src/runtime/reconciler.rs
// ============================================================================
// Module: Expression Upsert Reconciler
// Description: Create-or-merge of sample-annotation group documents.
// Purpose: Persist candidate groups with append-if-absent-by-label semantics.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The reconciler decides, per candidate group, whether to create a new
//! document or merge into the existing one. Merging appends only samples
//! whose label is not already present: the existing sample wins and the
//! incoming duplicate is discarded without value comparison. That mirrors
//! the upstream catalog exactly, and it means a legitimate re-upload meant
//! to correct a TPM value is a silent no-op — almost certainly a latent bug
//! in the original rather than intent, preserved here for compatibility.
//!
//! A create that loses the unique-key race to a concurrent writer is
//! retried once as a merge; a second loss surfaces as a conflict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::CatalogError;
use crate::core::GroupDraft;
use crate::core::SampleAnnotationGroup;
use crate::core::SampleLabel;
use crate::interfaces::CatalogStore;
use crate::interfaces::StoreError;
use crate::runtime::aggregate::recompute_group_average;

// ============================================================================
// SECTION: Reconcile
// ============================================================================

/// Persists one candidate group, creating or merging as needed.
///
/// Creating performs one store write. Merging performs at most two: the
/// atomic sample append and the average point update, with the average
/// recomputed over the full resulting sample list. Calling twice with the
/// same candidate leaves `samples` and `avg_tpm` unchanged on the second
/// call.
///
/// # Errors
///
/// Returns [`CatalogError::Conflict`] when the unique-key race stays
/// unresolved after one retry, or [`CatalogError::Store`] on store failure.
pub fn reconcile(
    store: &dyn CatalogStore,
    draft: &GroupDraft,
    n_decimals: u32,
) -> Result<SampleAnnotationGroup, CatalogError> {
    match store.find_group(&draft.key)? {
        Some(existing) => merge(store, draft, &existing, n_decimals),
        None => create(store, draft, n_decimals),
    }
}

/// Persists a brand-new group document, retrying once as a merge if a
/// concurrent writer claims the key first.
fn create(
    store: &dyn CatalogStore,
    draft: &GroupDraft,
    n_decimals: u32,
) -> Result<SampleAnnotationGroup, CatalogError> {
    let avg_tpm = recompute_group_average(&draft.samples, n_decimals);
    match store.insert_group(draft, avg_tpm) {
        Ok(group) => Ok(group),
        Err(StoreError::DuplicateKey(_)) => match store.find_group(&draft.key)? {
            Some(existing) => merge(store, draft, &existing, n_decimals),
            None => Err(CatalogError::conflict(
                format!(
                    "sample annotation group {}/{} contested by a concurrent writer",
                    draft.key.annotation_type, draft.key.label
                ),
                vec![draft.key.label.to_string()],
            )),
        },
        Err(err) => Err(err.into()),
    }
}

/// Appends the surviving new samples to an existing document and refreshes
/// its average over the full resulting sample list.
fn merge(
    store: &dyn CatalogStore,
    draft: &GroupDraft,
    existing: &SampleAnnotationGroup,
    n_decimals: u32,
) -> Result<SampleAnnotationGroup, CatalogError> {
    let current: BTreeSet<&SampleLabel> =
        existing.samples.iter().map(|sample| &sample.label).collect();
    let new_samples: Vec<_> = draft
        .samples
        .iter()
        .filter(|sample| !current.contains(&sample.label))
        .cloned()
        .collect();

    let mut refreshed = store.append_group_samples(existing.id, &new_samples)?;
    let avg_tpm = recompute_group_average(&refreshed.samples, n_decimals);
    store.set_group_avg(refreshed.id, avg_tpm)?;
    refreshed.avg_tpm = avg_tpm;
    Ok(refreshed)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
