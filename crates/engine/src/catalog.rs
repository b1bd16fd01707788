//! Read-only access to the dashboard's master product records.

use std::collections::HashMap;
use std::future::Future;

use storelink_core::ProductId;

use crate::store::RepositoryError;
use crate::types::MasterProduct;

/// Source-of-truth product reads.
///
/// The engine never writes through this boundary; master records are owned
/// by the dashboard's own CRUD layer.
pub trait MasterCatalog: Send + Sync {
    /// Fetch a master product by id.
    fn get_product(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<MasterProduct>, RepositoryError>> + Send;
}

/// In-memory catalog for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: HashMap<ProductId, MasterProduct>,
}

impl InMemoryCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product.
    pub fn insert(&mut self, product_id: ProductId, product: MasterProduct) {
        self.products.insert(product_id, product);
    }
}

impl MasterCatalog for InMemoryCatalog {
    async fn get_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<MasterProduct>, RepositoryError> {
        Ok(self.products.get(&product_id).cloned())
    }
}
