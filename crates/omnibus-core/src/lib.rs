// crates/omnibus-core/src/lib.rs
// ============================================================================
// Module: Expression Omnibus Core Library
// Description: Public API surface for the Expression Omnibus core.
// Purpose: Expose catalog types, store interfaces, and the ingest runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Expression Omnibus core provides the domain model of a gene-expression
//! catalog (species, genes, gene annotations, per-sample TPM groups), the
//! backend-agnostic store interface, and the expression write path:
//! grouping, upsert reconciliation, and incremental aggregate maintenance
//! with full-sibling SPM recomputation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CatalogStore;
pub use interfaces::PageOf;
pub use interfaces::PageRequest;
pub use interfaces::SharedCatalogStore;
pub use interfaces::StoreError;
pub use runtime::DuplicateSamplePolicy;
pub use runtime::ExpressionBatch;
pub use runtime::ExpressionPipeline;
pub use runtime::InMemoryCatalogStore;
pub use runtime::group_rows;
pub use runtime::recompute_group_average;
pub use runtime::recompute_spm;
pub use runtime::reconcile;
