//! Master product read model.
//!
//! The dashboard's source-of-truth product record, independent of any
//! external store. The engine never mutates these types; they arrive through
//! the [`crate::catalog::MasterCatalog`] boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storelink_core::{InventoryPolicy, ProductStatus};

/// Maximum number of options the external system accepts per product.
pub const MAX_OPTIONS: usize = 3;

/// Maximum number of variants the external system accepts per product.
pub const MAX_VARIANTS: usize = 100;

/// A declared value of a product option (e.g. "Small" under "Size").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub name: String,
}

/// A product option axis (e.g. "Size", "Color").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    /// 1-based display position.
    pub position: i32,
    pub option_values: Vec<OptionValue>,
}

/// The option value a variant carries for one option axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOptionValue {
    pub option_name: String,
    pub name: String,
}

/// Weight of a variant, with the unit as stored on the dashboard
/// (lowercased, e.g. "kilograms").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantWeight {
    pub value: f64,
    pub unit: String,
}

/// A master product variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterVariant {
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    /// The dashboard-owned inventory pool for this variant. Assignments to
    /// stores are validated against this ceiling.
    pub inventory_quantity: i64,
    pub inventory_policy: InventoryPolicy,
    /// Inventory management system name, when tracked.
    pub inventory_management: Option<String>,
    pub taxable: bool,
    pub weight: Option<VariantWeight>,
    pub option_values: Vec<VariantOptionValue>,
}

/// Search-engine metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Seo {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A custom metafield carried through to the external system verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: String,
}

/// A media attachment on the master record. Upload/transcoding happens
/// outside this engine; only the reference is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterMedia {
    pub url: String,
    pub alt_text: Option<String>,
}

/// The dashboard master product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterProduct {
    pub title: String,
    /// Explicit URL handle; when absent the sync derives one from the title.
    pub handle: Option<String>,
    pub description_html: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub status: ProductStatus,
    pub gift_card: bool,
    pub seo: Option<Seo>,
    pub metafields: Vec<Metafield>,
    pub media: Vec<MasterMedia>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<MasterVariant>,
}

impl MasterProduct {
    /// Variant at a positional index, if present.
    #[must_use]
    pub fn variant(&self, index: usize) -> Option<&MasterVariant> {
        self.variants.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_lookup_by_index() {
        let product = MasterProduct {
            title: "Tea".to_string(),
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
                price: Some(Decimal::new(1999, 2)),
                compare_at_price: None,
                sku: Some("TEA-1".to_string()),
                barcode: None,
                inventory_quantity: 10,
                inventory_policy: InventoryPolicy::Deny,
                inventory_management: None,
                taxable: true,
                weight: None,
                option_values: vec![],
            }],
        };

        assert!(product.variant(0).is_some());
        assert!(product.variant(1).is_none());
    }
}
