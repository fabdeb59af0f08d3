// crates/omnibus-core/src/core/errors.rs
// ============================================================================
// Module: Expression Omnibus Error Taxonomy
// Description: Terminal error taxonomy for catalog operations.
// Purpose: Provide stable error variants for programmatic handling.
// Dependencies: thiserror, crate::interfaces
// ============================================================================

//! ## Overview
//! Every catalog operation resolves to one of four terminal outcomes:
//! a missing reference, a conflicting key or duplicate, a malformed input
//! rejected before any write, or an underlying store failure surfaced as-is.
//! The core performs no silent recovery beyond the single create-race retry
//! in the reconciler; all other errors abort the in-progress batch at the
//! point of failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Catalog Errors
// ============================================================================

/// Terminal errors for catalog operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Referenced species, gene, or annotation key does not exist.
    #[error("not found: {entity} {key}")]
    NotFound {
        /// Entity kind that was looked up.
        entity: &'static str,
        /// Key that failed to resolve.
        key: String,
    },
    /// Duplicate key detected, or a unique-key race unresolved after retry.
    #[error("conflict: {description}")]
    Conflict {
        /// Human-readable conflict description.
        description: String,
        /// Labels that collided, when known.
        labels: Vec<String>,
    },
    /// Malformed input rejected before any store write.
    #[error("validation: {0}")]
    Validation(String),
    /// Underlying store failure, surfaced as-is.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    /// Builds a not-found error for an entity kind and key.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Builds a conflict error with the colliding labels.
    #[must_use]
    pub fn conflict(description: impl Into<String>, labels: Vec<String>) -> Self {
        Self::Conflict {
            description: description.into(),
            labels,
        }
    }
}
