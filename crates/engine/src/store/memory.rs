//! In-memory repository for tests and embedded use.

use std::collections::HashMap;

use tokio::sync::RwLock;

use storelink_core::ProductId;

use crate::store::{MappingRepository, RepositoryError};
use crate::types::ProductMap;

/// Mapping repository backed by a `HashMap`.
///
/// Honors the same compare-and-swap contract as the Postgres repository, so
/// conflict handling can be exercised without a database.
#[derive(Debug, Default)]
pub struct InMemoryMappingRepository {
    maps: RwLock<HashMap<ProductId, ProductMap>>,
}

impl InMemoryMappingRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingRepository for InMemoryMappingRepository {
    async fn find(&self, product_id: ProductId) -> Result<Option<ProductMap>, RepositoryError> {
        Ok(self.maps.read().await.get(&product_id).cloned())
    }

    async fn save(&self, map: &mut ProductMap) -> Result<(), RepositoryError> {
        let mut maps = self.maps.write().await;
        let stored_version = maps.get(&map.product_id).map_or(0, |m| m.version);
        if stored_version != map.version {
            return Err(RepositoryError::Conflict(format!(
                "product map {} is at version {stored_version}, expected {}",
                map.product_id, map.version
            )));
        }
        map.version += 1;
        maps.insert(map.product_id, map.clone());
        Ok(())
    }
}
