//! Batched multi-product sync with a fixed-window throttle.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument};

use storelink_core::ProductId;

use crate::error::SyncError;
use crate::store::SyncOperation;

/// Products synced concurrently per batch when the caller does not choose.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Fixed pause between batches.
const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Per-product success entry in a bulk report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemSuccess {
    pub product_id: ProductId,
    pub operation: SyncOperation,
    pub external_product_id: String,
    pub handle: String,
}

/// Per-product failure entry in a bulk report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemFailure {
    pub product_id: ProductId,
    pub error: String,
}

/// Outcome of one bulk run: counts plus full per-item lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct BulkSyncReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkItemSuccess>,
    pub errors: Vec<BulkItemFailure>,
}

/// Runs many single-product sync pipelines in sequential batches.
///
/// Within a batch every pipeline runs concurrently; between batches a fixed
/// one-second delay is inserted. This is a fixed-window throttle, not an
/// adaptive rate limiter.
#[derive(Debug, Clone, Copy)]
pub struct BulkSyncCoordinator {
    batch_size: usize,
}

impl Default for BulkSyncCoordinator {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BulkSyncCoordinator {
    /// Coordinator with an explicit batch size.
    #[must_use]
    pub const fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Sync every product through `sync_one`, batch by batch.
    ///
    /// One product's failure never aborts its batch or any later batch; it
    /// becomes an error entry in the report instead. `successful + failed`
    /// always equals the number of ids given.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for an empty id list or a zero
    /// batch size. Per-item failures are never propagated.
    #[instrument(skip(self, product_ids, sync_one), fields(total = product_ids.len(), batch_size = self.batch_size))]
    pub async fn run<F, Fut>(
        &self,
        product_ids: &[ProductId],
        sync_one: F,
    ) -> Result<BulkSyncReport, SyncError>
    where
        F: Fn(ProductId) -> Fut,
        Fut: Future<Output = Result<BulkItemSuccess, SyncError>>,
    {
        if product_ids.is_empty() {
            return Err(SyncError::Validation(
                "bulk sync requires at least one product id".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SyncError::Validation(
                "batch size must be at least 1".to_string(),
            ));
        }

        let mut report = BulkSyncReport {
            total: product_ids.len(),
            ..BulkSyncReport::default()
        };

        let batch_count = product_ids.len().div_ceil(self.batch_size);
        for (batch_index, batch) in product_ids.chunks(self.batch_size).enumerate() {
            let outcomes = join_all(batch.iter().map(|&product_id| {
                let sync = sync_one(product_id);
                async move { (product_id, sync.await) }
            }))
            .await;

            for (product_id, outcome) in outcomes {
                match outcome {
                    Ok(success) => {
                        report.successful += 1;
                        report.results.push(success);
                    }
                    Err(err) => {
                        report.failed += 1;
                        report.errors.push(BulkItemFailure {
                            product_id,
                            error: err.to_string(),
                        });
                    }
                }
            }

            if batch_index + 1 < batch_count {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }

        info!(
            successful = report.successful,
            failed = report.failed,
            "Bulk sync finished"
        );
        Ok(report)
    }
}
