// crates/omnibus-core/src/runtime/mod.rs
// ============================================================================
// Module: Expression Omnibus Runtime
// Description: The expression write path: grouping, reconcile, aggregates.
// Purpose: Orchestrate batch ingestion against a catalog store.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime owns everything between a resolved input batch and the store:
//! the pure grouping engine, the upsert reconciler, the aggregate
//! maintainer, and the pipeline that sequences them. It also ships an
//! in-memory store for tests and local demos.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod aggregate;
pub mod grouping;
pub mod pipeline;
pub mod reconciler;
pub mod store;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::recompute_group_average;
pub use aggregate::recompute_spm;
pub use grouping::group_rows;
pub use pipeline::DuplicateSamplePolicy;
pub use pipeline::ExpressionBatch;
pub use pipeline::ExpressionPipeline;
pub use reconciler::reconcile;
pub use store::InMemoryCatalogStore;
