//! `PostgreSQL`-backed mapping repository.
//!
//! Each aggregate is a single `jsonb` document keyed by product id, with the
//! version held in its own column for the compare-and-swap. Writing the whole
//! document on every save keeps partial updates impossible.

use sqlx::PgPool;

use storelink_core::ProductId;

use crate::store::{MappingRepository, RepositoryError};
use crate::types::ProductMap;

/// Mapping repository over a `product_maps` table.
#[derive(Debug, Clone)]
pub struct PgMappingRepository {
    pool: PgPool,
}

impl PgMappingRepository {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MappingRepository for PgMappingRepository {
    async fn find(&self, product_id: ProductId) -> Result<Option<ProductMap>, RepositoryError> {
        let document: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT document FROM product_maps WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        document
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| {
                    RepositoryError::DataCorruption(format!(
                        "product map {product_id} failed to deserialize: {e}"
                    ))
                })
            })
            .transpose()
    }

    async fn save(&self, map: &mut ProductMap) -> Result<(), RepositoryError> {
        let expected_version = map.version;
        map.version += 1;

        let document = serde_json::to_value(&*map).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "product map {} failed to serialize: {e}",
                map.product_id
            ))
        })?;

        // Insert only wins when no row exists and the caller holds version 0;
        // the conditional update enforces the compare-and-swap otherwise.
        let saved: Option<i64> = sqlx::query_scalar(
            r"
            INSERT INTO product_maps (product_id, version, document, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (product_id) DO UPDATE
                SET version = $2, document = $3, updated_at = now()
                WHERE product_maps.version = $4
            RETURNING version
            ",
        )
        .bind(map.product_id)
        .bind(map.version)
        .bind(document)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        if saved.is_none() {
            map.version = expected_version;
            return Err(RepositoryError::Conflict(format!(
                "product map {} was modified concurrently (expected version {expected_version})",
                map.product_id
            )));
        }
        Ok(())
    }
}
