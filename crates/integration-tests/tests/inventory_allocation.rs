//! Inventory assignment and allocation recommendations against a scripted
//! store.

use storelink_core::{ProductId, StoreId};
use storelink_engine::SyncError;
use storelink_engine::allocation::AllocationStrategy;
use storelink_engine::gateway::{InventoryLevelReading, VariantInventory};
use storelink_engine::service::SyncOptions;
use storelink_integration_tests::{
    ScriptedGateway, init_tracing, master_product, remote_location, test_service,
};

const PRODUCT: ProductId = ProductId::new(1);
const STORE: StoreId = StoreId::new(1);

fn reading(location_id: &str, available: i64) -> InventoryLevelReading {
    InventoryLevelReading {
        location_id: location_id.to_string(),
        available,
    }
}

#[tokio::test]
async fn test_assignment_lifecycle() {
    init_tracing();
    let service = test_service(
        vec![(PRODUCT, master_product("Mug", "19.99", 30))],
        ScriptedGateway::new(),
    );
    service
        .sync(PRODUCT, STORE, &SyncOptions::default())
        .await
        .expect("sync");

    // Assign within the pool, then reassign lower; both land in history.
    service
        .assign_inventory(PRODUCT, STORE, 0, 20, Some("loc-main"), "ops")
        .await
        .expect("first assignment");
    let map = service
        .assign_inventory(PRODUCT, STORE, 0, 12, Some("loc-main"), "ops")
        .await
        .expect("second assignment");

    let tracking = &map
        .mapping_for(STORE)
        .and_then(|m| m.variant_mapping(0))
        .expect("variant mapping")
        .inventory_tracking;
    assert_eq!(tracking.assigned_quantity, 12);
    assert_eq!(tracking.inventory_history.len(), 2);
    assert_eq!(tracking.inventory_history[1].previous_quantity, 20);

    // Over the pool: rejected, not clamped.
    let err = service
        .assign_inventory(PRODUCT, STORE, 0, 31, None, "ops")
        .await
        .expect_err("over-pool assignment");
    assert!(matches!(err, SyncError::Validation(_)));

    let summary = service
        .get_inventory_summary(PRODUCT, Some(STORE))
        .await
        .expect("summary");
    assert_eq!(summary[0].variants[0].assigned_quantity, 12);
}

#[tokio::test]
async fn test_balanced_seventeen_over_four_locations() {
    let mut gateway = ScriptedGateway::new();
    gateway.locations = vec![
        remote_location("l1", true),
        remote_location("l2", true),
        remote_location("l3", false),
        remote_location("l4", false),
    ];
    gateway.inventory.insert(
        "gid://store/Product/mug".to_string(),
        vec![VariantInventory {
            external_variant_id: "v1".to_string(),
            levels: vec![reading("l1", 10), reading("l2", 7)],
        }],
    );
    let service = test_service(vec![(PRODUCT, master_product("Mug", "19.99", 30))], gateway);
    service
        .sync(PRODUCT, STORE, &SyncOptions::default())
        .await
        .expect("sync");

    let report = service
        .get_allocation_recommendations(STORE, &[PRODUCT], AllocationStrategy::Balanced)
        .await
        .expect("recommendations");

    assert!(report.failures.is_empty());
    let recommendation = &report.recommendations[0];
    assert_eq!(recommendation.total_available, 17);
    let quantities: Vec<i64> = recommendation
        .allocations
        .iter()
        .map(|a| a.quantity)
        .collect();
    assert_eq!(quantities, vec![5, 4, 4, 4]);
}

#[tokio::test]
async fn test_priority_twenty_over_two_plus_two() {
    let mut gateway = ScriptedGateway::new();
    gateway.locations = vec![
        remote_location("p1", true),
        remote_location("p2", true),
        remote_location("s1", false),
        remote_location("s2", false),
    ];
    gateway.inventory.insert(
        "gid://store/Product/mug".to_string(),
        vec![VariantInventory {
            external_variant_id: "v1".to_string(),
            levels: vec![reading("p1", 20)],
        }],
    );
    let service = test_service(vec![(PRODUCT, master_product("Mug", "19.99", 30))], gateway);
    service
        .sync(PRODUCT, STORE, &SyncOptions::default())
        .await
        .expect("sync");

    let report = service
        .get_allocation_recommendations(STORE, &[PRODUCT], AllocationStrategy::Priority)
        .await
        .expect("recommendations");

    let quantities: Vec<i64> = report.recommendations[0]
        .allocations
        .iter()
        .map(|a| a.quantity)
        .collect();
    assert_eq!(quantities, vec![5, 5, 5, 5]);
}

#[tokio::test]
async fn test_recommendations_skip_broken_products_only() {
    let mut gateway = ScriptedGateway::new();
    gateway.locations = vec![remote_location("l1", true)];
    gateway.inventory.insert(
        "gid://store/Product/mug".to_string(),
        vec![VariantInventory {
            external_variant_id: "v1".to_string(),
            levels: vec![reading("l1", 6)],
        }],
    );
    let service = test_service(vec![(PRODUCT, master_product("Mug", "19.99", 30))], gateway);
    service
        .sync(PRODUCT, STORE, &SyncOptions::default())
        .await
        .expect("sync");

    let report = service
        .get_allocation_recommendations(
            STORE,
            &[PRODUCT, ProductId::new(42)],
            AllocationStrategy::Balanced,
        )
        .await
        .expect("recommendations");

    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].product_id, ProductId::new(42));
}

#[tokio::test]
async fn test_observed_quantities_stay_separate_from_assignments() {
    let mut gateway = ScriptedGateway::new();
    gateway.inventory.insert(
        "gid://store/Product/mug".to_string(),
        vec![VariantInventory {
            external_variant_id: "v1".to_string(),
            levels: vec![reading("l1", 3)],
        }],
    );
    let service = test_service(vec![(PRODUCT, master_product("Mug", "19.99", 30))], gateway);

    let options = SyncOptions {
        assigned_inventory: vec![Some(25)],
        target_location_id: Some("l1".to_string()),
        ..SyncOptions::default()
    };
    service.sync(PRODUCT, STORE, &options).await.expect("sync");

    let summary = service
        .get_inventory_summary(PRODUCT, Some(STORE))
        .await
        .expect("summary");
    let variant = &summary[0].variants[0];

    // Assigned is the dashboard's intent; the observed side stays untouched
    // until a store reading is recorded.
    assert_eq!(variant.assigned_quantity, 25);
    assert_eq!(variant.last_known_external_quantity, None);
}
