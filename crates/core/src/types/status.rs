//! Status enums shared across Storelink components.

use serde::{Deserialize, Serialize};

/// Master product status on the dashboard.
///
/// Maps to the external system's product status values on upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    #[default]
    Draft,
    Archived,
}

/// Inventory policy for a variant.
///
/// `Deny` stops selling when inventory reaches zero; `Continue` allows
/// overselling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryPolicy {
    #[default]
    Deny,
    Continue,
}

/// Lifecycle status of a per-store mapping.
///
/// Mappings are soft-deleted: the `Deleted` record is kept for the audit
/// trail, and a later successful sync revives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    #[default]
    Active,
    Syncing,
    Error,
    Paused,
    Deleted,
}

impl MappingStatus {
    /// Whether the mapping still counts toward a product's active stores.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active | Self::Syncing)
    }
}
