//! Boundary to the external commerce systems.
//!
//! The engine talks to every connected store through [`StoreGateway`]. The
//! transport client (HTTP/GraphQL, retries, timeouts) lives one layer below
//! and is not modeled here; implementations route each call to the store
//! identified by `store_id`.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storelink_core::StoreId;

use crate::payload::ProductUpsertPayload;

/// A field-level error returned by the external system's upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path to the offending field (e.g. `variants.0.price`).
    pub field: String,
    pub message: String,
}

/// Errors that can occur when calling an external store.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The external system rejected the payload with field-level errors.
    #[error("field errors: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldError>),

    /// Transport-level failure (reported by the layer below).
    #[error("transport error: {0}")]
    Transport(String),

    /// The external system does not know the referenced resource.
    #[error("remote not found: {0}")]
    NotFound(String),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reference to one variant created or updated by an upsert, in submitted
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVariant {
    pub id: String,
}

/// Authoritative result of an upsert against one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// External product id (e.g. `gid://store/Product/123`).
    pub id: String,
    /// External URL handle, possibly adjusted by the store for uniqueness.
    pub handle: String,
    /// Per-variant external ids, index-aligned with the submitted variants.
    pub variants: Vec<ExternalVariant>,
}

/// Observed quantity of one variant at one fulfillment location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevelReading {
    pub location_id: String,
    pub available: i64,
}

/// Live inventory readings for one external variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInventory {
    pub external_variant_id: String,
    pub levels: Vec<InventoryLevelReading>,
}

impl VariantInventory {
    /// Total available units across all locations.
    #[must_use]
    pub fn total_available(&self) -> i64 {
        self.levels.iter().map(|l| l.available).sum()
    }
}

/// A fulfillment location as reported by the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub fulfills_online_orders: bool,
    pub ships_inventory: bool,
}

/// Gateway to the external commerce systems.
///
/// `upsert_product` uses the external system's idempotent "set" semantics:
/// identical payloads may be retried safely. All methods are plain
/// request/response calls; nothing here supports cancellation.
pub trait StoreGateway: Send + Sync {
    /// Execute a normalized upsert payload against one store.
    fn upsert_product(
        &self,
        store_id: StoreId,
        payload: &ProductUpsertPayload,
    ) -> impl Future<Output = Result<UpsertOutcome, GatewayError>> + Send;

    /// Live inventory readings for every variant of an external product.
    fn get_inventory_levels(
        &self,
        store_id: StoreId,
        external_product_id: &str,
    ) -> impl Future<Output = Result<Vec<VariantInventory>, GatewayError>> + Send;

    /// All fulfillment locations of one store.
    fn get_locations(
        &self,
        store_id: StoreId,
    ) -> impl Future<Output = Result<Vec<RemoteLocation>, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_formatting() {
        let err = GatewayError::FieldErrors(vec![
            FieldError {
                field: "handle".to_string(),
                message: "already taken".to_string(),
            },
            FieldError {
                field: "variants.3.price".to_string(),
                message: "must be positive".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "field errors: handle: already taken; variants.3.price: must be positive"
        );
    }

    #[test]
    fn test_total_available_sums_locations() {
        let inventory = VariantInventory {
            external_variant_id: "v1".to_string(),
            levels: vec![
                InventoryLevelReading {
                    location_id: "l1".to_string(),
                    available: 4,
                },
                InventoryLevelReading {
                    location_id: "l2".to_string(),
                    available: 9,
                },
            ],
        };
        assert_eq!(inventory.total_available(), 13);
    }
}
