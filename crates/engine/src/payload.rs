//! Pure translation of a master product into a normalized upsert payload.
//!
//! [`build_upsert_payload`] performs no I/O and is deterministic: identical
//! inputs always yield byte-identical payloads, which is what makes retried
//! upserts idempotent against the external system's "set" semantics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storelink_core::{InventoryPolicy, ProductStatus};

use crate::error::SyncError;
use crate::types::{MasterProduct, Metafield, Seo, MAX_OPTIONS, MAX_VARIANTS};

/// Synthetic option injected when a product defines variants but no options.
/// The external system requires every variant to reference at least one
/// option value.
const SYNTHETIC_OPTION_NAME: &str = "Title";
const SYNTHETIC_OPTION_VALUE: &str = "Default";

/// Per-variant overrides supplied with a single sync call, index-aligned
/// with `MasterProduct.variants`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VariantOverride {
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
}

/// An option axis in the upsert payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    pub name: String,
    pub position: i32,
    pub values: Vec<OptionValueInput>,
}

/// One declared value of an option axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValueInput {
    pub name: String,
}

/// The option value a serialized variant carries for one axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOptionValueInput {
    pub option_name: String,
    pub name: String,
}

/// Inventory quantity to set at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuantityInput {
    pub location_id: String,
    pub quantity: i64,
}

/// Weight nested under the variant's measurement block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightInput {
    pub value: f64,
    /// Unit normalized to uppercase (e.g. `KILOGRAMS`).
    pub unit: String,
}

/// Measurement block on a serialized variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementInput {
    pub weight: WeightInput,
}

/// A serialized variant in the upsert payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    /// Required, stringified with the dashboard's decimal precision.
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Omitted entirely for gift cards: the external system rejects taxable
    /// gift cards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxable: Option<bool>,
    pub inventory_policy: InventoryPolicy,
    /// Populated only when a target location was supplied with the sync;
    /// otherwise inventory is deferred to a later explicit assignment.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub inventory_quantities: Vec<LocationQuantityInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementInput>,
    /// Exactly one value per defined option, regardless of how sparse the
    /// master variant's values were.
    pub option_values: Vec<VariantOptionValueInput>,
}

/// The full normalized upsert payload.
///
/// An explicit struct rather than ad hoc conditional JSON: the complete
/// payload shape is visible at compile time, optional fields are `Option`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpsertPayload {
    pub title: String,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    pub status: ProductStatus,
    pub gift_card: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<Seo>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub metafields: Vec<Metafield>,
    pub product_options: Vec<OptionInput>,
    pub variants: Vec<VariantInput>,
}

/// Slugify a title into a URL handle: lowercase alphanumerics joined by
/// hyphens.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_hyphen = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Build the normalized upsert payload for one master product.
///
/// Pure function of `(master, overrides, target_location_id)`. Overrides are
/// index-aligned with `master.variants`; a shorter slice means no override
/// for the remaining variants.
///
/// # Errors
///
/// Returns [`SyncError::Validation`] when the product exceeds the external
/// system's option/variant limits or a variant ends up without a price.
pub fn build_upsert_payload(
    master: &MasterProduct,
    overrides: &[VariantOverride],
    target_location_id: Option<&str>,
) -> Result<ProductUpsertPayload, SyncError> {
    if master.options.len() > MAX_OPTIONS {
        return Err(SyncError::Validation(format!(
            "product defines {} options, the external system accepts at most {MAX_OPTIONS}",
            master.options.len()
        )));
    }
    if master.variants.len() > MAX_VARIANTS {
        return Err(SyncError::Validation(format!(
            "product defines {} variants, the external system accepts at most {MAX_VARIANTS}",
            master.variants.len()
        )));
    }

    let handle = master
        .handle
        .as_deref()
        .filter(|h| !h.is_empty())
        .map_or_else(|| slugify(&master.title), str::to_string);

    // Option normalization: blank value names are dropped, and a product
    // with variants but no options gets exactly one synthetic option.
    let mut product_options: Vec<OptionInput> = master
        .options
        .iter()
        .map(|option| OptionInput {
            name: option.name.clone(),
            position: option.position,
            values: option
                .option_values
                .iter()
                .filter(|value| !value.name.trim().is_empty())
                .map(|value| OptionValueInput {
                    name: value.name.clone(),
                })
                .collect(),
        })
        .collect();

    if product_options.is_empty() && !master.variants.is_empty() {
        product_options.push(OptionInput {
            name: SYNTHETIC_OPTION_NAME.to_string(),
            position: 1,
            values: vec![OptionValueInput {
                name: SYNTHETIC_OPTION_VALUE.to_string(),
            }],
        });
    }

    let mut variants = Vec::with_capacity(master.variants.len());
    for (index, variant) in master.variants.iter().enumerate() {
        let override_for = overrides.get(index);

        let price = override_for
            .and_then(|o| o.price)
            .or(variant.price)
            .ok_or_else(|| {
                SyncError::Validation(format!("variant {index} has no price"))
            })?;

        let compare_at_price = override_for
            .and_then(|o| o.compare_at_price)
            .or(variant.compare_at_price);

        let inventory_quantities = target_location_id.map_or_else(Vec::new, |location_id| {
            vec![LocationQuantityInput {
                location_id: location_id.to_string(),
                quantity: variant.inventory_quantity,
            }]
        });

        let measurement = variant.weight.as_ref().map(|weight| MeasurementInput {
            weight: WeightInput {
                value: weight.value,
                unit: weight.unit.to_uppercase(),
            },
        });

        let option_values = product_options
            .iter()
            .enumerate()
            .map(|(option_index, option)| {
                let name = variant
                    .option_values
                    .iter()
                    .find(|v| v.option_name == option.name)
                    .map(|v| v.name.clone())
                    .or_else(|| {
                        variant
                            .option_values
                            .get(option_index)
                            .map(|v| v.name.clone())
                    })
                    .or_else(|| option.values.first().map(|v| v.name.clone()))
                    .unwrap_or_else(|| SYNTHETIC_OPTION_VALUE.to_string());
                VariantOptionValueInput {
                    option_name: option.name.clone(),
                    name,
                }
            })
            .collect();

        variants.push(VariantInput {
            price: price.to_string(),
            compare_at_price: compare_at_price.map(|p| p.to_string()),
            sku: variant.sku.clone(),
            barcode: variant.barcode.clone(),
            taxable: if master.gift_card {
                None
            } else {
                Some(variant.taxable)
            },
            inventory_policy: variant.inventory_policy,
            inventory_quantities,
            measurement,
            option_values,
        });
    }

    Ok(ProductUpsertPayload {
        title: master.title.clone(),
        handle,
        description_html: master.description_html.clone(),
        vendor: master.vendor.clone(),
        product_type: master.product_type.clone(),
        tags: master.tags.clone(),
        status: master.status,
        gift_card: master.gift_card,
        seo: master.seo.clone(),
        metafields: master.metafields.clone(),
        product_options,
        variants,
    })
}
