//! The engine's outward-facing surface.
//!
//! [`SyncService`] wires the pure payload builder, the store gateway, and the
//! mapping store into the operations the CRUD/API layer calls. Single-product
//! operations run synchronously within one call; the only internal
//! concurrency is the bulk coordinator's per-batch fan-out.

use serde::Serialize;
use tracing::{info, instrument, warn};

use storelink_core::{MappingStatus, ProductId, StoreId};

use crate::allocation::{
    AllocationStrategy, LocationAllocation, allocation_efficiency, plan_allocation,
};
use crate::bulk::{BulkItemSuccess, BulkSyncCoordinator, BulkSyncReport, DEFAULT_BATCH_SIZE};
use crate::catalog::MasterCatalog;
use crate::error::SyncError;
use crate::gateway::StoreGateway;
use crate::inventory::{AssignmentRequest, InventoryLedger, StoreInventorySummary};
use crate::payload::{VariantOverride, build_upsert_payload};
use crate::store::{MappingRepository, MappingStore, RepositoryError, SyncOperation};
use crate::types::{
    MasterProduct, PriceAdjustments, ProductMap, StoreCustomizations, StoreMapping, SyncSettings,
};

/// Actor recorded on history entries when the caller does not name one.
const DEFAULT_ACTOR: &str = "system";

/// Caller-supplied knobs for one sync call.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Proceed even when the mapping reports a sync in progress.
    pub force_sync: bool,
    /// Per-variant price overrides, index-aligned with the master variants.
    pub variant_overrides: Vec<VariantOverride>,
    /// Per-variant sync-time inventory assignments; `None` skips a variant.
    pub assigned_inventory: Vec<Option<i64>>,
    /// Location to set initial inventory at. Without it, inventory is left
    /// to a later explicit assignment.
    pub target_location_id: Option<String>,
    /// Who to record on history entries.
    pub actor: Option<String>,
}

/// Result of one successful sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub operation: SyncOperation,
    pub external_product_id: String,
    pub external_handle: String,
    pub mapping: StoreMapping,
}

/// Advisory allocation plan for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRecommendation {
    pub product_id: ProductId,
    pub total_available: i64,
    /// 0-100, advisory only.
    pub efficiency: f64,
    pub allocations: Vec<LocationAllocation>,
}

/// Per-product failure while computing recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationFailure {
    pub product_id: ProductId,
    pub error: String,
}

/// Recommendations plus the products that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AllocationReport {
    pub recommendations: Vec<AllocationRecommendation>,
    pub failures: Vec<AllocationFailure>,
}

/// Product-to-store synchronization service.
pub struct SyncService<C, G, R> {
    catalog: C,
    gateway: G,
    mappings: MappingStore<R>,
}

impl<C, G, R> SyncService<C, G, R>
where
    C: MasterCatalog,
    G: StoreGateway,
    R: MappingRepository,
{
    /// Assemble the service from its three collaborators.
    pub const fn new(catalog: C, gateway: G, repository: R) -> Self {
        Self {
            catalog,
            gateway,
            mappings: MappingStore::new(repository),
        }
    }

    /// The gateway this service talks to stores through.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Sync one master product into one store.
    ///
    /// Builds the normalized payload, executes the upsert, and folds the
    /// result back into the mapping aggregate. Upstream failures propagate
    /// before any reconciliation, so no half-synced aggregate is persisted;
    /// on an already-mapped pair the failure is recorded on the mapping.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] when the master product does not exist.
    /// - [`SyncError::Conflict`] when the mapping reports a sync in progress
    ///   and `force_sync` is not set.
    /// - [`SyncError::Validation`] for payload-limit or assignment-pool
    ///   violations.
    /// - [`SyncError::Upstream`] when the external upsert fails.
    #[instrument(skip(self, options), fields(product_id = %product_id, store_id = %store_id, force_sync = options.force_sync))]
    pub async fn sync(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        options: &SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let master = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("product {product_id}")))?;

        let existing = self.mappings.find(product_id).await?;
        let existing_mapping = existing.as_ref().and_then(|m| m.mapping_for(store_id));
        if let Some(mapping) = existing_mapping
            && mapping.status == MappingStatus::Syncing
            && !options.force_sync
        {
            return Err(SyncError::Conflict(format!(
                "a sync for product {product_id} in store {store_id} is already in progress"
            )));
        }

        validate_assignments(&master, &options.assigned_inventory)?;

        let effective = customize_product(master, existing_mapping);
        let overrides = effective_overrides(&effective, options, existing_mapping);

        let payload =
            build_upsert_payload(&effective, &overrides, options.target_location_id.as_deref())?;

        let outcome = match self.gateway.upsert_product(store_id, &payload).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Upsert failed");
                self.mappings
                    .record_failure(product_id, store_id, &err.to_string())
                    .await?;
                return Err(SyncError::Upstream(err));
            }
        };

        let actor = options.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
        let (operation, map) = self
            .mappings
            .reconcile(
                product_id,
                store_id,
                &outcome,
                &overrides,
                &options.assigned_inventory,
                options.target_location_id.as_deref(),
                actor,
            )
            .await?;

        let mapping = map.mapping_for(store_id).cloned().ok_or_else(|| {
            SyncError::Repository(RepositoryError::DataCorruption(format!(
                "mapping for store {store_id} missing after reconciliation"
            )))
        })?;

        info!(%operation, external_product_id = %outcome.id, "Sync finished");
        Ok(SyncOutcome {
            operation,
            external_product_id: outcome.id,
            external_handle: outcome.handle,
            mapping,
        })
    }

    /// Assign units of one variant to one store.
    ///
    /// The product must exist in the catalog and already be synced to the
    /// store. Quantities above the master variant's own pool are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] or [`SyncError::Validation`] as
    /// described above, or a repository error.
    #[instrument(skip(self), fields(product_id = %product_id, store_id = %store_id, variant_index, quantity))]
    pub async fn assign_inventory(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        variant_index: usize,
        quantity: i64,
        location_id: Option<&str>,
        actor: &str,
    ) -> Result<ProductMap, SyncError> {
        let master = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("product {product_id}")))?;
        let variant = master.variant(variant_index).ok_or_else(|| {
            SyncError::NotFound(format!(
                "product {product_id} has no variant at index {variant_index}"
            ))
        })?;

        InventoryLedger::new(&self.mappings)
            .assign(AssignmentRequest {
                product_id,
                store_id,
                variant_index,
                quantity,
                pool_quantity: variant.inventory_quantity,
                location_id,
                actor,
                reason: "manual assignment",
            })
            .await
    }

    /// Assigned-vs-observed inventory for one product, optionally filtered
    /// to one store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when the product was never synced or
    /// the store filter matches nothing.
    pub async fn get_inventory_summary(
        &self,
        product_id: ProductId,
        store_id: Option<StoreId>,
    ) -> Result<Vec<StoreInventorySummary>, SyncError> {
        InventoryLedger::new(&self.mappings)
            .summary(product_id, store_id)
            .await
    }

    /// Advisory allocation plans for a set of products in one store.
    ///
    /// One product's failure (unsynced, remote query error) never aborts the
    /// others; it becomes a failure entry in the report. Plans are never
    /// written back.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Upstream`] only when the store's location list
    /// itself cannot be fetched; per-product problems land in the report.
    #[instrument(skip(self, product_ids), fields(store_id = %store_id, products = product_ids.len()))]
    pub async fn get_allocation_recommendations(
        &self,
        store_id: StoreId,
        product_ids: &[ProductId],
        strategy: AllocationStrategy,
    ) -> Result<AllocationReport, SyncError> {
        let locations = self.gateway.get_locations(store_id).await?;
        let active_count = locations.iter().filter(|l| l.is_active).count();

        let mut report = AllocationReport::default();
        for &product_id in product_ids {
            match self
                .recommend_one(store_id, product_id, &locations, active_count, strategy)
                .await
            {
                Ok(recommendation) => report.recommendations.push(recommendation),
                Err(err) => report.failures.push(AllocationFailure {
                    product_id,
                    error: err.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Sync many products into one store, in throttled batches.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for an empty id list or zero batch
    /// size; per-product failures land in the report instead.
    #[instrument(skip(self, product_ids), fields(store_id = %store_id, products = product_ids.len()))]
    pub async fn bulk_sync(
        &self,
        store_id: StoreId,
        product_ids: &[ProductId],
        batch_size: Option<usize>,
    ) -> Result<BulkSyncReport, SyncError> {
        let coordinator = BulkSyncCoordinator::new(batch_size.unwrap_or(DEFAULT_BATCH_SIZE));
        let options = SyncOptions::default();

        coordinator
            .run(product_ids, |product_id| {
                let options = &options;
                async move {
                    let outcome = self.sync(product_id, store_id, options).await?;
                    Ok(BulkItemSuccess {
                        product_id,
                        operation: outcome.operation,
                        external_product_id: outcome.external_product_id,
                        handle: outcome.external_handle,
                    })
                }
            })
            .await
    }

    /// Soft-delete the mapping for one store, releasing assigned inventory.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no mapping exists for the pair.
    pub async fn remove_store(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        actor: &str,
    ) -> Result<ProductMap, SyncError> {
        self.mappings.remove(product_id, store_id, actor).await
    }

    /// Replace per-store settings on an existing mapping.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no mapping exists for the pair.
    pub async fn update_sync_settings(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        settings: Option<SyncSettings>,
        customizations: Option<StoreCustomizations>,
        price_adjustments: Option<PriceAdjustments>,
    ) -> Result<ProductMap, SyncError> {
        self.mappings
            .update_settings(product_id, store_id, settings, customizations, price_adjustments)
            .await
    }

    async fn recommend_one(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        locations: &[crate::gateway::RemoteLocation],
        active_count: usize,
        strategy: AllocationStrategy,
    ) -> Result<AllocationRecommendation, SyncError> {
        let map = self
            .mappings
            .find(product_id)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!("product {product_id} has never been synced"))
            })?;
        let mapping = map
            .mapping_for(store_id)
            .filter(|m| m.status.is_active())
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "no active mapping for product {product_id} in store {store_id}"
                ))
            })?;

        let readings = self
            .gateway
            .get_inventory_levels(store_id, &mapping.external_product_id)
            .await?;

        let total_available: i64 = readings
            .iter()
            .map(crate::gateway::VariantInventory::total_available)
            .sum();

        // Current stock per active location, in location-list order.
        let current: Vec<i64> = locations
            .iter()
            .filter(|l| l.is_active)
            .map(|location| {
                readings
                    .iter()
                    .flat_map(|r| &r.levels)
                    .filter(|level| level.location_id == location.id)
                    .map(|level| level.available)
                    .sum()
            })
            .collect();

        Ok(AllocationRecommendation {
            product_id,
            total_available,
            efficiency: allocation_efficiency(&current, active_count),
            allocations: plan_allocation(total_available, locations, strategy),
        })
    }
}

/// Reject sync-time assignments that exceed the master variant's own pool.
fn validate_assignments(
    master: &MasterProduct,
    assigned_inventory: &[Option<i64>],
) -> Result<(), SyncError> {
    for (index, assigned) in assigned_inventory.iter().enumerate() {
        let Some(quantity) = *assigned else { continue };
        if quantity < 0 {
            // Negative means "no assignment for this variant".
            continue;
        }
        let variant = master.variant(index).ok_or_else(|| {
            SyncError::Validation(format!(
                "assigned inventory references variant {index}, which does not exist"
            ))
        })?;
        if quantity > variant.inventory_quantity {
            return Err(SyncError::Validation(format!(
                "assignment of {quantity} to variant {index} exceeds the master pool of {}",
                variant.inventory_quantity
            )));
        }
    }
    Ok(())
}

/// Apply the mapping's store customizations to the master record.
fn customize_product(mut master: MasterProduct, mapping: Option<&StoreMapping>) -> MasterProduct {
    let Some(mapping) = mapping else {
        return master;
    };
    if let Some(title) = &mapping.store_customizations.title {
        master.title.clone_from(title);
    }
    if let Some(description) = &mapping.store_customizations.description_html {
        master.description_html = Some(description.clone());
    }
    if let Some(tags) = &mapping.store_customizations.tags {
        master.tags.clone_from(tags);
    }
    master
}

/// Merge explicit per-call overrides with the mapping's price adjustments.
///
/// Explicit overrides win; variants without one get the store-wide
/// adjustment applied to their master price, when price syncing is enabled.
fn effective_overrides(
    master: &MasterProduct,
    options: &SyncOptions,
    mapping: Option<&StoreMapping>,
) -> Vec<VariantOverride> {
    let mut overrides = options.variant_overrides.clone();

    if let Some(mapping) = mapping
        && mapping.sync_settings.sync_prices
        && !mapping.price_adjustments.is_empty()
    {
        overrides.resize(master.variants.len(), VariantOverride::default());
        for (index, slot) in overrides.iter_mut().enumerate() {
            if slot.price.is_none()
                && let Some(base) = master.variants.get(index).and_then(|v| v.price)
            {
                slot.price = Some(mapping.price_adjustments.apply(base));
            }
        }
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use storelink_core::{InventoryPolicy, ProductStatus};

    use crate::catalog::InMemoryCatalog;
    use crate::gateway::{
        ExternalVariant, GatewayError, InventoryLevelReading, RemoteLocation, UpsertOutcome,
        VariantInventory,
    };
    use crate::payload::ProductUpsertPayload;
    use crate::store::InMemoryMappingRepository;
    use crate::types::MasterVariant;

    struct MockGateway {
        payloads: Mutex<Vec<ProductUpsertPayload>>,
        fail_titles: Vec<String>,
        levels: Vec<VariantInventory>,
        locations: Vec<RemoteLocation>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                payloads: Mutex::new(Vec::new()),
                fail_titles: Vec::new(),
                levels: Vec::new(),
                locations: Vec::new(),
            }
        }
    }

    impl StoreGateway for MockGateway {
        async fn upsert_product(
            &self,
            _store_id: StoreId,
            payload: &ProductUpsertPayload,
        ) -> Result<UpsertOutcome, GatewayError> {
            if self.fail_titles.contains(&payload.title) {
                return Err(GatewayError::Transport("connection reset".to_string()));
            }
            self.payloads
                .lock()
                .map(|mut p| p.push(payload.clone()))
                .ok();
            Ok(UpsertOutcome {
                id: format!("gid://store/Product/{}", payload.handle),
                handle: payload.handle.clone(),
                variants: payload
                    .variants
                    .iter()
                    .enumerate()
                    .map(|(i, _)| ExternalVariant {
                        id: format!("gid://store/Variant/{i}"),
                    })
                    .collect(),
            })
        }

        async fn get_inventory_levels(
            &self,
            _store_id: StoreId,
            _external_product_id: &str,
        ) -> Result<Vec<VariantInventory>, GatewayError> {
            Ok(self.levels.clone())
        }

        async fn get_locations(
            &self,
            _store_id: StoreId,
        ) -> Result<Vec<RemoteLocation>, GatewayError> {
            Ok(self.locations.clone())
        }
    }

    fn master_product(title: &str, price: &str, stock: i64) -> MasterProduct {
        MasterProduct {
            title: title.to_string(),
            handle: None,
            description_html: None,
            vendor: None,
            product_type: None,
            tags: vec![],
            status: ProductStatus::Active,
            gift_card: false,
            seo: None,
            metafields: vec![],
            media: vec![],
            options: vec![],
            variants: vec![MasterVariant {
                price: Some(price.parse().expect("decimal")),
                compare_at_price: None,
                sku: None,
                barcode: None,
                inventory_quantity: stock,
                inventory_policy: InventoryPolicy::Deny,
                inventory_management: None,
                taxable: true,
                weight: None,
                option_values: vec![],
            }],
        }
    }

    fn service_with(
        products: Vec<(ProductId, MasterProduct)>,
        gateway: MockGateway,
    ) -> SyncService<InMemoryCatalog, MockGateway, InMemoryMappingRepository> {
        let mut catalog = InMemoryCatalog::new();
        for (product_id, product) in products {
            catalog.insert(product_id, product);
        }
        SyncService::new(catalog, gateway, InMemoryMappingRepository::new())
    }

    #[tokio::test]
    async fn test_sync_unknown_product_is_not_found() {
        let service = service_with(vec![], MockGateway::new());
        let err = service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect_err("sync");
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sync_creates_then_updates() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "19.99", 10))],
            MockGateway::new(),
        );

        let first = service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("first sync");
        assert_eq!(first.operation, SyncOperation::Created);
        assert_eq!(first.external_handle, "mug");
        assert_eq!(first.mapping.status, MappingStatus::Active);

        let second = service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("second sync");
        assert_eq!(second.operation, SyncOperation::Updated);
    }

    #[tokio::test]
    async fn test_upstream_failure_on_unsynced_pair_persists_nothing() {
        let mut gateway = MockGateway::new();
        gateway.fail_titles.push("Broken".to_string());
        let service = service_with(
            vec![(ProductId::new(2), master_product("Broken", "9.99", 5))],
            gateway,
        );

        let err = service
            .sync(ProductId::new(2), StoreId::new(1), &SyncOptions::default())
            .await
            .expect_err("sync");
        assert!(matches!(err, SyncError::Upstream(_)));
        let summary = service
            .get_inventory_summary(ProductId::new(2), None)
            .await
            .expect_err("summary");
        assert!(matches!(summary, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_marks_mapped_pair_as_error() {
        let mut gateway = MockGateway::new();
        gateway.fail_titles.push("Broken".to_string());
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "19.99", 10))],
            gateway,
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("first sync");

        // Renaming via customization makes the next upsert fail.
        service
            .update_sync_settings(
                ProductId::new(1),
                StoreId::new(1),
                None,
                Some(StoreCustomizations {
                    title: Some("Broken".to_string()),
                    description_html: None,
                    tags: None,
                }),
                None,
            )
            .await
            .expect("settings");

        let err = service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect_err("resync");
        assert!(matches!(err, SyncError::Upstream(_)));

        let summary = service
            .get_inventory_summary(ProductId::new(1), Some(StoreId::new(1)))
            .await
            .expect("summary");
        assert_eq!(summary[0].status, MappingStatus::Error);
    }

    #[tokio::test]
    async fn test_sync_time_assignment_validated_against_pool() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "19.99", 10))],
            MockGateway::new(),
        );

        let options = SyncOptions {
            assigned_inventory: vec![Some(11)],
            ..SyncOptions::default()
        };
        let err = service
            .sync(ProductId::new(1), StoreId::new(1), &options)
            .await
            .expect_err("sync");
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_price_adjustments_applied_on_resync() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            MockGateway::new(),
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("first sync");

        service
            .update_sync_settings(
                ProductId::new(1),
                StoreId::new(1),
                None,
                None,
                Some(PriceAdjustments {
                    percent: Some(Decimal::new(10, 0)),
                    fixed: None,
                }),
            )
            .await
            .expect("settings");

        let outcome = service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("resync");

        // 20.00 + 10% lands in the variant mapping as the effective price.
        let variant = outcome.mapping.variant_mapping(0).expect("variant");
        assert_eq!(variant.custom_price, Some(Decimal::new(2200, 2)));
    }

    #[tokio::test]
    async fn test_explicit_override_beats_price_adjustment() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            MockGateway::new(),
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("first sync");
        service
            .update_sync_settings(
                ProductId::new(1),
                StoreId::new(1),
                None,
                None,
                Some(PriceAdjustments {
                    percent: Some(Decimal::new(10, 0)),
                    fixed: None,
                }),
            )
            .await
            .expect("settings");

        let options = SyncOptions {
            variant_overrides: vec![VariantOverride {
                price: Some(Decimal::new(1500, 2)),
                compare_at_price: None,
            }],
            ..SyncOptions::default()
        };
        let outcome = service
            .sync(ProductId::new(1), StoreId::new(1), &options)
            .await
            .expect("resync");

        let variant = outcome.mapping.variant_mapping(0).expect("variant");
        assert_eq!(variant.custom_price, Some(Decimal::new(1500, 2)));
    }

    #[tokio::test]
    async fn test_store_customizations_rename_product() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            MockGateway::new(),
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("first sync");
        service
            .update_sync_settings(
                ProductId::new(1),
                StoreId::new(1),
                None,
                Some(StoreCustomizations {
                    title: Some("Mug (Outlet)".to_string()),
                    description_html: None,
                    tags: None,
                }),
                None,
            )
            .await
            .expect("settings");

        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("resync");

        let payloads = service.gateway.payloads.lock().expect("lock");
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].title, "Mug (Outlet)");
    }

    #[tokio::test]
    async fn test_assign_inventory_requires_prior_sync() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            MockGateway::new(),
        );

        let err = service
            .assign_inventory(ProductId::new(1), StoreId::new(1), 0, 5, None, "tester")
            .await
            .expect_err("assign");
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_assign_inventory_rejects_over_pool() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            MockGateway::new(),
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("sync");

        let err = service
            .assign_inventory(ProductId::new(1), StoreId::new(1), 0, 11, None, "tester")
            .await
            .expect_err("assign");
        assert!(matches!(err, SyncError::Validation(_)));

        let map = service
            .assign_inventory(ProductId::new(1), StoreId::new(1), 0, 10, Some("loc-1"), "tester")
            .await
            .expect("assign");
        let tracking = &map
            .mapping_for(StoreId::new(1))
            .and_then(|m| m.variant_mapping(0))
            .expect("variant")
            .inventory_tracking;
        assert_eq!(tracking.assigned_quantity, 10);
    }

    #[tokio::test]
    async fn test_allocation_failures_are_isolated() {
        let mut gateway = MockGateway::new();
        gateway.locations = vec![
            RemoteLocation {
                id: "l1".to_string(),
                name: "Main".to_string(),
                is_active: true,
                fulfills_online_orders: true,
                ships_inventory: true,
            },
            RemoteLocation {
                id: "l2".to_string(),
                name: "Annex".to_string(),
                is_active: true,
                fulfills_online_orders: false,
                ships_inventory: true,
            },
        ];
        gateway.levels = vec![VariantInventory {
            external_variant_id: "v1".to_string(),
            levels: vec![
                InventoryLevelReading {
                    location_id: "l1".to_string(),
                    available: 9,
                },
                InventoryLevelReading {
                    location_id: "l2".to_string(),
                    available: 8,
                },
            ],
        }];
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            gateway,
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("sync");

        // Product 2 was never synced; its failure must not hide product 1.
        let report = service
            .get_allocation_recommendations(
                StoreId::new(1),
                &[ProductId::new(1), ProductId::new(2)],
                AllocationStrategy::Balanced,
            )
            .await
            .expect("recommendations");

        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].product_id, ProductId::new(2));

        let recommendation = &report.recommendations[0];
        assert_eq!(recommendation.total_available, 17);
        let quantities: Vec<i64> = recommendation.allocations.iter().map(|a| a.quantity).collect();
        assert_eq!(quantities, vec![9, 8]);
        assert!(recommendation.efficiency > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_sync_counts_add_up() {
        let mut gateway = MockGateway::new();
        gateway.fail_titles.push("Product 3".to_string());
        let products: Vec<(ProductId, MasterProduct)> = (1..=7)
            .map(|i| {
                (
                    ProductId::new(i),
                    master_product(&format!("Product {i}"), "10.00", 5),
                )
            })
            .collect();
        let service = service_with(products, gateway);

        let report = service
            .bulk_sync(
                StoreId::new(1),
                &(1..=7).map(ProductId::new).collect::<Vec<_>>(),
                None,
            )
            .await
            .expect("bulk sync");

        assert_eq!(report.total, 7);
        assert_eq!(report.successful, 6);
        assert_eq!(report.failed, 1);
        assert_eq!(report.successful + report.failed, report.total);
        assert!(report.errors[0].error.contains("transport error"));
    }

    #[tokio::test]
    async fn test_remove_store_soft_deletes() {
        let service = service_with(
            vec![(ProductId::new(1), master_product("Mug", "20.00", 10))],
            MockGateway::new(),
        );
        service
            .sync(ProductId::new(1), StoreId::new(1), &SyncOptions::default())
            .await
            .expect("sync");

        let map = service
            .remove_store(ProductId::new(1), StoreId::new(1), "tester")
            .await
            .expect("remove");
        let mapping = map.mapping_for(StoreId::new(1)).expect("mapping");
        assert_eq!(mapping.status, MappingStatus::Deleted);
        assert_eq!(map.mapping_stats.active_stores, 0);
    }
}
