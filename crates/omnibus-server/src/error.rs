// crates/omnibus-server/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: Maps catalog and auth errors onto HTTP responses.
// Purpose: One stable JSON error shape for every failure path.
// Dependencies: axum, omnibus-core, serde
// ============================================================================

//! ## Overview
//! Every handler failure resolves to an [`ApiError`]: an HTTP status plus a
//! JSON body carrying a human-readable description and, for conflicts, the
//! labels that collided. Store failures never leak internal detail beyond
//! their top-level description.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use omnibus_core::CatalogError;
use omnibus_core::StoreError;
use serde::Serialize;

use crate::auth::AuthError;

// ============================================================================
// SECTION: Error Body
// ============================================================================

/// JSON error payload returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure description.
    pub description: String,
    /// Labels that collided, for conflict responses.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

/// An HTTP-mapped handler error.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: ErrorBody,
}

impl ApiError {
    /// Builds an error with a description and no conflict labels.
    #[must_use]
    pub fn new(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                description: description.into(),
                conflicts: Vec::new(),
            },
        }
    }

    /// Builds a 404 for a missing entity key.
    #[must_use]
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{entity} {key} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound {
                entity,
                key,
            } => Self::not_found(entity, key),
            CatalogError::Conflict {
                description,
                labels,
            } => Self {
                status: StatusCode::CONFLICT,
                body: ErrorBody {
                    description,
                    conflicts: labels,
                },
            },
            CatalogError::Validation(message) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            CatalogError::Store(store) => Self::from(store),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => {
                Self::new(StatusCode::CONFLICT, format!("duplicate key: {key}"))
            }
            StoreError::Invalid(message) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, message),
            StoreError::Io(_)
            | StoreError::Corrupt(_)
            | StoreError::VersionMismatch(_)
            | StoreError::Store(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "catalog store failure")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only error mapping assertions.")]

    use super::*;

    #[test]
    fn conflict_carries_labels() {
        let api: ApiError =
            CatalogError::conflict("samples already exist", vec!["SRX1".to_string()]).into();
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.body.conflicts, vec!["SRX1".to_string()]);
    }

    #[test]
    fn not_found_maps_to_404() {
        let api: ApiError = CatalogError::not_found("species", "taxid 3702").into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert!(api.body.description.contains("taxid 3702"));
    }

    #[test]
    fn store_io_hides_detail() {
        let api: ApiError = StoreError::Io("disk exploded at /var/db".to_string()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.body.description.contains("/var/db"));
    }

    #[test]
    fn duplicate_key_maps_to_conflict() {
        let api: ApiError = StoreError::DuplicateKey("species taxid 3702".to_string()).into();
        assert_eq!(api.status, StatusCode::CONFLICT);
    }
}
