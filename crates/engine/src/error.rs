//! Unified error handling for the engine.

use serde::Serialize;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::store::RepositoryError;

/// Engine-level error type.
///
/// The taxonomy the API layer maps onto HTTP responses: missing entities,
/// caller mistakes, upstream failures and concurrent-mutation conflicts.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing product, mapping or store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-side validation failed (option/variant limits, assignment
    /// quantity over the owned pool, missing required price).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external system rejected the call or the transport failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] GatewayError),

    /// Concurrent mutation of the mapping aggregate was detected.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistence failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The `{success, message}` envelope user-visible responses carry.
///
/// Failure messages include the upstream field-error text when available.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub message: String,
}

impl ResponseEnvelope {
    /// Envelope for a successful operation.
    #[must_use]
    pub const fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

impl From<&SyncError> for ResponseEnvelope {
    fn from(err: &SyncError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}
