//! Integration tests for Storelink.
//!
//! The engine is exercised end to end through [`SyncService`] with the
//! in-memory catalog and repository and a scriptable gateway standing in for
//! the external commerce system. No database or network is required.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storelink-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::time::Instant;

use storelink_core::{InventoryPolicy, ProductId, ProductStatus, StoreId};
use storelink_engine::SyncService;
use storelink_engine::catalog::InMemoryCatalog;
use storelink_engine::gateway::{
    ExternalVariant, GatewayError, RemoteLocation, StoreGateway, UpsertOutcome, VariantInventory,
};
use storelink_engine::payload::ProductUpsertPayload;
use storelink_engine::store::InMemoryMappingRepository;
use storelink_engine::types::{MasterProduct, MasterVariant};

/// An upsert observed by the scripted gateway.
#[derive(Debug, Clone)]
pub struct ObservedUpsert {
    pub title: String,
    pub started_at: Instant,
}

/// Scriptable stand-in for the external commerce system.
///
/// Records every upsert with its start instant (for batch-timing
/// assertions) and fails any product whose title was registered as broken.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    pub upserts: Mutex<Vec<ObservedUpsert>>,
    pub broken_titles: Vec<String>,
    pub locations: Vec<RemoteLocation>,
    pub inventory: HashMap<String, Vec<VariantInventory>>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Titles of every observed upsert, in call order.
    ///
    /// # Panics
    ///
    /// Panics when the recording mutex is poisoned.
    #[must_use]
    pub fn upsert_titles(&self) -> Vec<String> {
        self.upserts
            .lock()
            .expect("gateway mutex")
            .iter()
            .map(|u| u.title.clone())
            .collect()
    }

    /// Start instants of every observed upsert, in call order.
    ///
    /// # Panics
    ///
    /// Panics when the recording mutex is poisoned.
    #[must_use]
    pub fn upsert_starts(&self) -> Vec<Instant> {
        self.upserts
            .lock()
            .expect("gateway mutex")
            .iter()
            .map(|u| u.started_at)
            .collect()
    }
}

impl StoreGateway for ScriptedGateway {
    async fn upsert_product(
        &self,
        _store_id: StoreId,
        payload: &ProductUpsertPayload,
    ) -> Result<UpsertOutcome, GatewayError> {
        self.upserts
            .lock()
            .map_err(|_| GatewayError::Transport("gateway mutex poisoned".to_string()))?
            .push(ObservedUpsert {
                title: payload.title.clone(),
                started_at: Instant::now(),
            });

        if self.broken_titles.contains(&payload.title) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        Ok(UpsertOutcome {
            id: format!("gid://store/Product/{}", payload.handle),
            handle: payload.handle.clone(),
            variants: payload
                .variants
                .iter()
                .enumerate()
                .map(|(i, _)| ExternalVariant {
                    id: format!("gid://store/Variant/{}-{i}", payload.handle),
                })
                .collect(),
        })
    }

    async fn get_inventory_levels(
        &self,
        _store_id: StoreId,
        external_product_id: &str,
    ) -> Result<Vec<VariantInventory>, GatewayError> {
        Ok(self
            .inventory
            .get(external_product_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_locations(&self, _store_id: StoreId) -> Result<Vec<RemoteLocation>, GatewayError> {
        Ok(self.locations.clone())
    }
}

/// A single-variant master product with the given title, price and stock.
#[must_use]
pub fn master_product(title: &str, price: &str, stock: i64) -> MasterProduct {
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
        variants: vec![master_variant(price, stock)],
    }
}

/// A master variant with the given price and stock.
///
/// # Panics
///
/// Panics when `price` is not a valid decimal.
#[must_use]
pub fn master_variant(price: &str, stock: i64) -> MasterVariant {
    MasterVariant {
        price: Some(price.parse().expect("valid decimal")),
        compare_at_price: None,
        sku: None,
        barcode: None,
        inventory_quantity: stock,
        inventory_policy: InventoryPolicy::Deny,
        inventory_management: None,
        taxable: true,
        weight: None,
        option_values: vec![],
    }
}

/// An active fulfillment location.
#[must_use]
pub fn remote_location(id: &str, fulfills_online_orders: bool) -> RemoteLocation {
    RemoteLocation {
        id: id.to_string(),
        name: format!("Location {id}"),
        is_active: true,
        fulfills_online_orders,
        ships_inventory: true,
    }
}

/// Initialize test logging once; safe to call from every test.
///
/// Output is controlled with `RUST_LOG`, e.g.
/// `RUST_LOG=storelink_engine=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Assemble a service over in-memory collaborators and the given gateway.
pub fn test_service(
    products: Vec<(ProductId, MasterProduct)>,
    gateway: ScriptedGateway,
) -> SyncService<InMemoryCatalog, ScriptedGateway, InMemoryMappingRepository> {
    let mut catalog = InMemoryCatalog::new();
    for (product_id, product) in products {
        catalog.insert(product_id, product);
    }
    SyncService::new(catalog, gateway, InMemoryMappingRepository::new())
}

/// Catalog of `count` numbered single-variant products.
#[must_use]
pub fn numbered_products(count: i32) -> Vec<(ProductId, MasterProduct)> {
    (1..=count)
        .map(|i| {
            (
                ProductId::new(i),
                master_product(&format!("Product {i}"), "10.00", 25),
            )
        })
        .collect()
}
