//! Inventory assignment and observation ledger.
//!
//! Two numbers live on every variant mapping: `assigned_quantity` is the
//! dashboard's intent (how many units this store owns), and
//! `last_known_external_quantity` is the most recent remote observation.
//! They are never reconciled against each other; assignments change the
//! first, store reads change the second.

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use storelink_core::{MappingStatus, ProductId, StoreId};

use crate::error::SyncError;
use crate::gateway::InventoryLevelReading;
use crate::store::{MappingRepository, MappingStore};
use crate::types::{
    InventoryAction, InventoryHistoryEntry, LocationInventory, ProductMap, VariantMapping,
};

/// One inventory assignment, fully specified by the caller.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentRequest<'a> {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub variant_index: usize,
    /// Units this store should own after the assignment.
    pub quantity: i64,
    /// Units the master variant owns in total. Assignments above this pool
    /// are rejected, never clamped.
    pub pool_quantity: i64,
    pub location_id: Option<&'a str>,
    pub actor: &'a str,
    pub reason: &'a str,
}

/// Assigned-vs-observed quantities for one variant mapping.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VariantInventorySummary {
    pub dashboard_variant_index: usize,
    pub external_variant_id: String,
    pub assigned_quantity: i64,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<String>,
    pub last_known_external_quantity: Option<i64>,
    pub location_inventory: Vec<LocationInventory>,
}

/// Read-only inventory projection for one store mapping.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreInventorySummary {
    pub store_id: StoreId,
    pub status: MappingStatus,
    pub variants: Vec<VariantInventorySummary>,
}

/// Write an assignment onto a variant mapping, appending a history entry.
pub(crate) fn record_assignment(
    variant: &mut VariantMapping,
    quantity: i64,
    location_id: Option<&str>,
    actor: &str,
    reason: &str,
) {
    let tracking = &mut variant.inventory_tracking;
    let previous = tracking.assigned_quantity;
    let now = Utc::now();

    tracking.assigned_quantity = quantity;
    tracking.assigned_at = Some(now);
    tracking.assigned_by = Some(actor.to_string());
    if let Some(location_id) = location_id {
        match tracking
            .location_inventory
            .iter_mut()
            .find(|l| l.location_id == location_id)
        {
            Some(entry) => entry.quantity = quantity,
            None => tracking.location_inventory.push(LocationInventory {
                location_id: location_id.to_string(),
                quantity,
            }),
        }
    }
    tracking.inventory_history.push(InventoryHistoryEntry {
        id: Uuid::new_v4(),
        action: InventoryAction::Assigned,
        quantity,
        previous_quantity: previous,
        reason: reason.to_string(),
        timestamp: now,
        actor: actor.to_string(),
        location_id: location_id.map(str::to_string),
    });
}

/// Inventory operations over the mapping aggregate.
pub struct InventoryLedger<'a, R> {
    store: &'a MappingStore<R>,
}

impl<'a, R: MappingRepository> InventoryLedger<'a, R> {
    /// Operate on an existing mapping store.
    pub const fn new(store: &'a MappingStore<R>) -> Self {
        Self { store }
    }

    /// Assign units of one variant to one store.
    ///
    /// A product must be synced before inventory can be assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for a negative quantity or a
    /// quantity above the master pool, and [`SyncError::NotFound`] when no
    /// mapping exists for the pair or the variant index.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, store_id = %request.store_id, variant_index = request.variant_index))]
    pub async fn assign(&self, request: AssignmentRequest<'_>) -> Result<ProductMap, SyncError> {
        if request.quantity < 0 {
            return Err(SyncError::Validation(format!(
                "assignment quantity {} is negative",
                request.quantity
            )));
        }
        if request.quantity > request.pool_quantity {
            return Err(SyncError::Validation(format!(
                "assignment of {} exceeds the master pool of {}",
                request.quantity, request.pool_quantity
            )));
        }

        let map = self
            .store
            .mutate_mapping(request.product_id, request.store_id, true, move |mapping| {
                let Some(variant) = mapping.variant_mapping_mut(request.variant_index) else {
                    return Err(SyncError::NotFound(format!(
                        "variant {} has no mapping in store {}",
                        request.variant_index, request.store_id
                    )));
                };
                record_assignment(
                    variant,
                    request.quantity,
                    request.location_id,
                    request.actor,
                    request.reason,
                );
                Ok(())
            })
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "no mapping for product {} in store {}",
                    request.product_id, request.store_id
                ))
            })?;

        Ok(map)
    }

    /// Record live inventory readings observed from the external store.
    ///
    /// Overwrites only the observed side of the ledger; assigned quantities
    /// are never touched here.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no mapping exists for the pair
    /// or the variant index.
    #[instrument(skip(self, levels), fields(product_id = %product_id, store_id = %store_id, variant_index))]
    pub async fn record_observation(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        variant_index: usize,
        levels: &[InventoryLevelReading],
    ) -> Result<ProductMap, SyncError> {
        let observed_total: i64 = levels.iter().map(|l| l.available).sum();
        self.store
            .mutate_mapping(product_id, store_id, true, move |mapping| {
                let Some(variant) = mapping.variant_mapping_mut(variant_index) else {
                    return Err(SyncError::NotFound(format!(
                        "variant {variant_index} has no mapping in store {store_id}"
                    )));
                };
                let tracking = &mut variant.inventory_tracking;
                tracking.last_known_external_quantity = Some(observed_total);
                tracking.location_inventory = levels
                    .iter()
                    .map(|l| LocationInventory {
                        location_id: l.location_id.clone(),
                        quantity: l.available,
                    })
                    .collect();
                Ok(())
            })
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "no mapping for product {product_id} in store {store_id}"
                ))
            })
    }

    /// Assigned-vs-observed projection for one product, optionally filtered
    /// to one store. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when the product has never been
    /// synced, or when a store filter matches no mapping.
    pub async fn summary(
        &self,
        product_id: ProductId,
        store_id: Option<StoreId>,
    ) -> Result<Vec<StoreInventorySummary>, SyncError> {
        let map = self
            .store
            .find(product_id)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!("product {product_id} has never been synced"))
            })?;

        let summaries: Vec<StoreInventorySummary> = map
            .store_mappings
            .iter()
            .filter(|m| store_id.is_none_or(|id| m.store_id == id))
            .map(|mapping| StoreInventorySummary {
                store_id: mapping.store_id,
                status: mapping.status,
                variants: mapping
                    .variant_mappings
                    .iter()
                    .map(|v| VariantInventorySummary {
                        dashboard_variant_index: v.dashboard_variant_index,
                        external_variant_id: v.external_variant_id.clone(),
                        assigned_quantity: v.inventory_tracking.assigned_quantity,
                        assigned_at: v.inventory_tracking.assigned_at,
                        assigned_by: v.inventory_tracking.assigned_by.clone(),
                        last_known_external_quantity: v
                            .inventory_tracking
                            .last_known_external_quantity,
                        location_inventory: v.inventory_tracking.location_inventory.clone(),
                    })
                    .collect(),
            })
            .collect();

        if summaries.is_empty() && store_id.is_some() {
            return Err(SyncError::NotFound(format!(
                "no mapping for product {product_id} in the requested store"
            )));
        }
        Ok(summaries)
    }
}
