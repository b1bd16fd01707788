//! The per-(product, store) mapping aggregate.
//!
//! One [`ProductMap`] document exists per master product and embeds one
//! [`StoreMapping`] per connected store, so "all stores for this product" is
//! a single read. The aggregate carries a monotonic `version` used for
//! compare-and-swap persistence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storelink_core::{InventoryPolicy, MappingStatus, ProductId, StoreId};

/// Aggregate-level counters kept in sync by the mapping store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MappingStats {
    /// Stores this product has ever been synced to (soft-deleted included).
    pub total_stores: u32,
    /// Stores whose mapping has not been soft-deleted.
    pub active_stores: u32,
}

/// Per-store sync behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub auto_sync: bool,
    pub sync_prices: bool,
    pub sync_inventory: bool,
    pub sync_media: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: false,
            sync_prices: true,
            sync_inventory: true,
            sync_media: true,
        }
    }
}

/// Store-specific presentation overrides applied at sync time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoreCustomizations {
    pub title: Option<String>,
    pub description_html: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Store-wide price adjustment applied to variants without an explicit
/// per-call override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PriceAdjustments {
    /// Percentage markup/markdown, e.g. `10` raises prices by 10%.
    pub percent: Option<Decimal>,
    /// Fixed amount added after the percentage step.
    pub fixed: Option<Decimal>,
}

impl PriceAdjustments {
    /// Whether any adjustment is configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.percent.is_none() && self.fixed.is_none()
    }

    /// Apply the adjustment to a base price, rounded to cents.
    #[must_use]
    pub fn apply(&self, price: Decimal) -> Decimal {
        let mut adjusted = price;
        if let Some(percent) = self.percent {
            adjusted += price * percent / Decimal::ONE_HUNDRED;
        }
        if let Some(fixed) = self.fixed {
            adjusted += fixed;
        }
        adjusted.round_dp(2)
    }
}

/// What a sync-history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
    Failed,
    Removed,
}

/// One append-only entry in a mapping's sync history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub id: Uuid,
    pub action: SyncAction,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
}

/// What an inventory-history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAction {
    Assigned,
    Released,
}

/// One immutable entry in a variant's inventory history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryHistoryEntry {
    pub id: Uuid,
    pub action: InventoryAction,
    pub quantity: i64,
    pub previous_quantity: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub location_id: Option<String>,
}

/// Last-observed quantity at one external fulfillment location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInventory {
    pub location_id: String,
    pub quantity: i64,
}

/// Inventory bookkeeping for one variant mapping.
///
/// `assigned_quantity` (dashboard intent) and `last_known_external_quantity`
/// (observed remote state) are deliberately independent; nothing in the
/// engine reconciles them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InventoryTracking {
    pub assigned_quantity: i64,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<String>,
    pub last_known_external_quantity: Option<i64>,
    pub inventory_policy: InventoryPolicy,
    pub location_inventory: Vec<LocationInventory>,
    pub inventory_history: Vec<InventoryHistoryEntry>,
}

/// Link between one master variant (by position) and its external
/// representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMapping {
    /// Positional reference into `MasterProduct.variants` - not a stable id.
    pub dashboard_variant_index: usize,
    pub external_variant_id: String,
    pub custom_price: Option<Decimal>,
    pub custom_compare_at_price: Option<Decimal>,
    pub is_active: bool,
    pub inventory_tracking: InventoryTracking,
}

impl VariantMapping {
    /// A fresh mapping for a variant index with no inventory assigned.
    #[must_use]
    pub fn new(dashboard_variant_index: usize, external_variant_id: String) -> Self {
        Self {
            dashboard_variant_index,
            external_variant_id,
            custom_price: None,
            custom_compare_at_price: None,
            is_active: true,
            inventory_tracking: InventoryTracking::default(),
        }
    }
}

/// Link between a master media item (by position) and its external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMapping {
    pub master_media_index: usize,
    pub external_media_id: String,
}

/// How one master product is represented inside one specific store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMapping {
    pub store_id: StoreId,
    pub external_product_id: String,
    pub external_handle: String,
    pub status: MappingStatus,
    pub sync_settings: SyncSettings,
    pub store_customizations: StoreCustomizations,
    pub price_adjustments: PriceAdjustments,
    pub variant_mappings: Vec<VariantMapping>,
    pub media_mappings: Vec<MediaMapping>,
    pub sync_history: Vec<SyncHistoryEntry>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
}

impl StoreMapping {
    /// A fresh mapping with default settings and empty variant/media lists.
    #[must_use]
    pub fn new(store_id: StoreId) -> Self {
        Self {
            store_id,
            external_product_id: String::new(),
            external_handle: String::new(),
            status: MappingStatus::Active,
            sync_settings: SyncSettings::default(),
            store_customizations: StoreCustomizations::default(),
            price_adjustments: PriceAdjustments::default(),
            variant_mappings: Vec::new(),
            media_mappings: Vec::new(),
            sync_history: Vec::new(),
            last_sync_at: None,
            last_successful_sync_at: None,
            last_sync_error: None,
        }
    }

    /// Variant mapping for a dashboard variant index, if present.
    #[must_use]
    pub fn variant_mapping(&self, index: usize) -> Option<&VariantMapping> {
        self.variant_mappings
            .iter()
            .find(|v| v.dashboard_variant_index == index)
    }

    /// Mutable variant mapping for a dashboard variant index, if present.
    pub fn variant_mapping_mut(&mut self, index: usize) -> Option<&mut VariantMapping> {
        self.variant_mappings
            .iter_mut()
            .find(|v| v.dashboard_variant_index == index)
    }

    /// Append an entry to the sync history.
    pub fn record_history(&mut self, action: SyncAction, message: Option<String>) {
        self.sync_history.push(SyncHistoryEntry {
            id: Uuid::new_v4(),
            action,
            timestamp: Utc::now(),
            message,
        });
    }
}

/// The aggregate: one document per master product, embedding all of its
/// store mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMap {
    pub product_id: ProductId,
    /// Monotonic version for compare-and-swap persistence.
    pub version: i64,
    pub store_mappings: Vec<StoreMapping>,
    pub mapping_stats: MappingStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductMap {
    /// An empty aggregate for a product that has never been synced.
    #[must_use]
    pub fn new(product_id: ProductId) -> Self {
        let now = Utc::now();
        Self {
            product_id,
            version: 0,
            store_mappings: Vec::new(),
            mapping_stats: MappingStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The mapping for one store, if present. At most one mapping exists per
    /// (product, store) pair.
    #[must_use]
    pub fn mapping_for(&self, store_id: StoreId) -> Option<&StoreMapping> {
        self.store_mappings.iter().find(|m| m.store_id == store_id)
    }

    /// Mutable mapping for one store, if present.
    pub fn mapping_for_mut(&mut self, store_id: StoreId) -> Option<&mut StoreMapping> {
        self.store_mappings
            .iter_mut()
            .find(|m| m.store_id == store_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_adjustment_percent_and_fixed() {
        let adj = PriceAdjustments {
            percent: Some(Decimal::new(10, 0)),
            fixed: Some(Decimal::new(50, 2)),
        };
        // 20.00 +10% +0.50 = 22.50
        assert_eq!(adj.apply(Decimal::new(2000, 2)), Decimal::new(2250, 2));
    }

    #[test]
    fn test_price_adjustment_empty_is_identity() {
        let adj = PriceAdjustments::default();
        assert!(adj.is_empty());
        assert_eq!(adj.apply(Decimal::new(999, 2)), Decimal::new(999, 2));
    }

    #[test]
    fn test_one_mapping_per_store() {
        let mut map = ProductMap::new(ProductId::new(1));
        map.store_mappings.push(StoreMapping::new(StoreId::new(7)));

        assert!(map.mapping_for(StoreId::new(7)).is_some());
        assert!(map.mapping_for(StoreId::new(8)).is_none());
    }

    #[test]
    fn test_history_is_appended() {
        let mut mapping = StoreMapping::new(StoreId::new(1));
        mapping.record_history(SyncAction::Created, None);
        mapping.record_history(SyncAction::Updated, Some("second".to_string()));

        assert_eq!(mapping.sync_history.len(), 2);
        assert_eq!(mapping.sync_history[0].action, SyncAction::Created);
        assert_eq!(
            mapping.sync_history[1].message.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_variant_mapping_lookup_by_index() {
        let mut mapping = StoreMapping::new(StoreId::new(1));
        mapping
            .variant_mappings
            .push(VariantMapping::new(2, "gid://store/Variant/9".to_string()));

        assert!(mapping.variant_mapping(2).is_some());
        assert!(mapping.variant_mapping(0).is_none());
    }
}
