//! Persistence and reconciliation of the mapping aggregate.
//!
//! One [`crate::types::ProductMap`] document is stored per master product.
//! Every mutation goes through a compare-and-swap on the aggregate's
//! `version`; a mismatch means a concurrent sync won the race, and the
//! operation is retried once against the fresh document.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{info, instrument};

use storelink_core::{MappingStatus, ProductId, StoreId};

pub use memory::InMemoryMappingRepository;
pub use postgres::PgMappingRepository;

use crate::error::SyncError;
use crate::gateway::UpsertOutcome;
use crate::inventory::record_assignment;
use crate::payload::VariantOverride;
use crate::types::{
    InventoryAction, PriceAdjustments, ProductMap, StoreCustomizations, StoreMapping, SyncAction,
    SyncSettings, VariantMapping,
};

/// Reason recorded on history entries written during reconciliation.
const SYNC_ASSIGNMENT_REASON: &str = "sync-time assignment";

/// How often a conflicted mutation is retried against a reloaded aggregate.
const CONFLICT_RETRIES: usize = 1;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Version mismatch on compare-and-swap save.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Storage for mapping aggregates.
///
/// `save` is conditional: it succeeds only when the stored version equals
/// `map.version`, then bumps the version on both sides. New aggregates save
/// at version 0.
pub trait MappingRepository: Send + Sync {
    /// Load the aggregate for one product, if it exists.
    fn find(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<ProductMap>, RepositoryError>> + Send;

    /// Persist the aggregate with compare-and-swap on `map.version`.
    fn save(
        &self,
        map: &mut ProductMap,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Whether a sync created a new store mapping or mutated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Created,
    Updated,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Reconciliation and lifecycle operations on the mapping aggregate.
pub struct MappingStore<R> {
    repository: R,
}

impl<R: MappingRepository> MappingStore<R> {
    /// Wrap a repository.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// The underlying repository.
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Fold a successful upsert back into the aggregate.
    ///
    /// Called only after the external upsert succeeded; any upstream failure
    /// aborts before this point, so no partially-synced aggregate is ever
    /// persisted. External variants are assumed index-aligned with the
    /// submitted variant order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Conflict`] when a concurrent mutation wins the
    /// compare-and-swap twice in a row, or a repository error.
    #[instrument(skip(self, outcome, overrides, assigned_inventory), fields(product_id = %product_id, store_id = %store_id))]
    pub async fn reconcile(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        outcome: &UpsertOutcome,
        overrides: &[VariantOverride],
        assigned_inventory: &[Option<i64>],
        target_location_id: Option<&str>,
        actor: &str,
    ) -> Result<(SyncOperation, ProductMap), SyncError> {
        let mut attempts = 0;
        loop {
            let mut map = self
                .repository
                .find(product_id)
                .await?
                .unwrap_or_else(|| ProductMap::new(product_id));

            let operation = apply_reconcile(
                &mut map,
                store_id,
                outcome,
                overrides,
                assigned_inventory,
                target_location_id,
                actor,
            );

            match self.repository.save(&mut map).await {
                Ok(()) => {
                    info!(%operation, external_product_id = %outcome.id, "Reconciled store mapping");
                    return Ok((operation, map));
                }
                Err(RepositoryError::Conflict(message)) => {
                    if attempts >= CONFLICT_RETRIES {
                        return Err(SyncError::Conflict(message));
                    }
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Record an upsert failure on an already-mapped pair.
    ///
    /// A failure on a pair that was never successfully synced persists
    /// nothing: aggregates are created lazily on first success only.
    ///
    /// # Errors
    ///
    /// Returns a repository error; conflicts are retried once.
    #[instrument(skip(self, error_text), fields(product_id = %product_id, store_id = %store_id))]
    pub async fn record_failure(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        error_text: &str,
    ) -> Result<(), SyncError> {
        self.mutate_mapping(product_id, store_id, false, |mapping| {
            mapping.status = MappingStatus::Error;
            mapping.last_sync_at = Some(Utc::now());
            mapping.last_sync_error = Some(error_text.to_string());
            mapping.record_history(SyncAction::Failed, Some(error_text.to_string()));
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Soft-delete the mapping for one store.
    ///
    /// Marks the mapping `Deleted`, releases any assigned inventory with
    /// history entries, and decrements the active-store counter. The record
    /// itself is kept for the audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no mapping exists for the pair.
    #[instrument(skip(self), fields(product_id = %product_id, store_id = %store_id))]
    pub async fn remove(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        actor: &str,
    ) -> Result<ProductMap, SyncError> {
        let actor = actor.to_string();
        self.mutate_aggregate(product_id, store_id, move |map| {
            let Some(mapping) = map.mapping_for_mut(store_id) else {
                return Ok(());
            };
            if mapping.status == MappingStatus::Deleted {
                return Ok(());
            }
            for variant in &mut mapping.variant_mappings {
                let tracking = &mut variant.inventory_tracking;
                if tracking.assigned_quantity > 0 {
                    let previous = tracking.assigned_quantity;
                    tracking.assigned_quantity = 0;
                    tracking
                        .inventory_history
                        .push(crate::types::InventoryHistoryEntry {
                            id: uuid::Uuid::new_v4(),
                            action: InventoryAction::Released,
                            quantity: 0,
                            previous_quantity: previous,
                            reason: "store mapping removed".to_string(),
                            timestamp: Utc::now(),
                            actor: actor.clone(),
                            location_id: None,
                        });
                }
                variant.is_active = false;
            }
            mapping.status = MappingStatus::Deleted;
            mapping.record_history(SyncAction::Removed, None);
            map.mapping_stats.active_stores = map.mapping_stats.active_stores.saturating_sub(1);
            Ok(())
        })
        .await
    }

    /// Replace per-store settings on an existing mapping.
    ///
    /// Fields passed as `None` are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no mapping exists for the pair.
    #[instrument(skip(self, settings, customizations, price_adjustments), fields(product_id = %product_id, store_id = %store_id))]
    pub async fn update_settings(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        settings: Option<SyncSettings>,
        customizations: Option<StoreCustomizations>,
        price_adjustments: Option<PriceAdjustments>,
    ) -> Result<ProductMap, SyncError> {
        self.mutate_mapping(product_id, store_id, true, move |mapping| {
            if let Some(settings) = settings {
                mapping.sync_settings = settings;
            }
            if let Some(customizations) = customizations.clone() {
                mapping.store_customizations = customizations;
            }
            if let Some(adjustments) = price_adjustments {
                mapping.price_adjustments = adjustments;
            }
            Ok(())
        })
        .await?
        .ok_or_else(|| {
            SyncError::NotFound(format!("no mapping for product {product_id} in store {store_id}"))
        })
    }

    /// Load the aggregate for one product.
    ///
    /// # Errors
    ///
    /// Returns a repository error.
    pub async fn find(&self, product_id: ProductId) -> Result<Option<ProductMap>, SyncError> {
        Ok(self.repository.find(product_id).await?)
    }

    /// Apply a closure to an existing mapping and save with conflict retry.
    ///
    /// Returns `Ok(None)` when the aggregate or mapping does not exist and
    /// `required` is false; the closure is never applied in that case. The
    /// closure may be called more than once and must be idempotent on a
    /// freshly loaded aggregate.
    pub(crate) async fn mutate_mapping<F>(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        required: bool,
        mutate: F,
    ) -> Result<Option<ProductMap>, SyncError>
    where
        F: Fn(&mut StoreMapping) -> Result<(), SyncError> + Send,
    {
        let mut attempts = 0;
        loop {
            let Some(mut map) = self.repository.find(product_id).await? else {
                if required {
                    return Err(SyncError::NotFound(format!(
                        "product {product_id} has never been synced"
                    )));
                }
                return Ok(None);
            };

            {
                let Some(mapping) = map.mapping_for_mut(store_id) else {
                    if required {
                        return Err(SyncError::NotFound(format!(
                            "no mapping for product {product_id} in store {store_id}"
                        )));
                    }
                    return Ok(None);
                };
                mutate(mapping)?;
            }
            map.updated_at = Utc::now();

            match self.repository.save(&mut map).await {
                Ok(()) => return Ok(Some(map)),
                Err(RepositoryError::Conflict(message)) => {
                    if attempts >= CONFLICT_RETRIES {
                        return Err(SyncError::Conflict(message));
                    }
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Apply a closure to the whole aggregate and save with conflict retry.
    ///
    /// For mutations that touch more than one mapping's state, such as the
    /// aggregate-level counters. The mapping for `store_id` must exist. Like
    /// [`Self::mutate_mapping`], the closure may run more than once and must
    /// be idempotent on a freshly loaded aggregate.
    async fn mutate_aggregate<F>(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        mutate: F,
    ) -> Result<ProductMap, SyncError>
    where
        F: Fn(&mut ProductMap) -> Result<(), SyncError> + Send,
    {
        let mut attempts = 0;
        loop {
            let Some(mut map) = self.repository.find(product_id).await? else {
                return Err(SyncError::NotFound(format!(
                    "product {product_id} has never been synced"
                )));
            };
            if map.mapping_for(store_id).is_none() {
                return Err(SyncError::NotFound(format!(
                    "no mapping for product {product_id} in store {store_id}"
                )));
            }

            mutate(&mut map)?;
            map.updated_at = Utc::now();

            match self.repository.save(&mut map).await {
                Ok(()) => return Ok(map),
                Err(RepositoryError::Conflict(message)) => {
                    if attempts >= CONFLICT_RETRIES {
                        return Err(SyncError::Conflict(message));
                    }
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Fold an upsert outcome into the aggregate in memory.
fn apply_reconcile(
    map: &mut ProductMap,
    store_id: StoreId,
    outcome: &UpsertOutcome,
    overrides: &[VariantOverride],
    assigned_inventory: &[Option<i64>],
    target_location_id: Option<&str>,
    actor: &str,
) -> SyncOperation {
    let now = Utc::now();

    let operation = if map.mapping_for(store_id).is_some() {
        SyncOperation::Updated
    } else {
        map.store_mappings.push(StoreMapping::new(store_id));
        map.mapping_stats.total_stores += 1;
        map.mapping_stats.active_stores += 1;
        SyncOperation::Created
    };

    // Reviving a soft-deleted mapping restores it to the counter.
    if map
        .mapping_for(store_id)
        .is_some_and(|m| m.status == MappingStatus::Deleted)
    {
        map.mapping_stats.active_stores += 1;
    }

    // Lookup cannot fail: the mapping was just inserted above if absent.
    if let Some(mapping) = map.mapping_for_mut(store_id) {
        mapping.external_product_id = outcome.id.clone();
        mapping.external_handle = outcome.handle.clone();
        mapping.status = MappingStatus::Active;
        mapping.last_sync_at = Some(now);
        mapping.last_successful_sync_at = Some(now);
        mapping.last_sync_error = None;
        mapping.record_history(
            match operation {
                SyncOperation::Created => SyncAction::Created,
                SyncOperation::Updated => SyncAction::Updated,
            },
            Some(format!("external product {}", outcome.id)),
        );

        for (index, external_variant) in outcome.variants.iter().enumerate() {
            if mapping.variant_mapping(index).is_none() {
                mapping
                    .variant_mappings
                    .push(VariantMapping::new(index, external_variant.id.clone()));
            }
            // Lookup cannot fail after the insert above.
            if let Some(variant) = mapping.variant_mapping_mut(index) {
                variant.external_variant_id = external_variant.id.clone();
                variant.is_active = true;
                if let Some(override_for) = overrides.get(index) {
                    if let Some(price) = override_for.price {
                        variant.custom_price = Some(price);
                    }
                    if let Some(compare_at) = override_for.compare_at_price {
                        variant.custom_compare_at_price = Some(compare_at);
                    }
                }
                if let Some(&Some(quantity)) = assigned_inventory.get(index)
                    && quantity >= 0
                {
                    record_assignment(
                        variant,
                        quantity,
                        target_location_id,
                        actor,
                        SYNC_ASSIGNMENT_REASON,
                    );
                }
            }
        }
    }

    map.updated_at = now;
    operation
}
