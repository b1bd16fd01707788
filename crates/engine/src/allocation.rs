//! Advisory inventory allocation across fulfillment locations.
//!
//! Planning is pure arithmetic over a live total and the store's location
//! list. Nothing here writes anything back; acting on a plan requires an
//! explicit inventory assignment afterwards.

use serde::{Deserialize, Serialize};

use crate::gateway::RemoteLocation;

/// How units are spread across locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Even split, remainder to the first locations in list order.
    #[default]
    Balanced,
    /// Half the pool to online-fulfilling locations, half to the rest.
    Priority,
}

/// Suggested quantity for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationAllocation {
    pub location_id: String,
    pub location_name: String,
    pub quantity: i64,
}

/// Distribute `total_available` units across `locations`.
///
/// Inactive locations are skipped. The result preserves the input's natural
/// order, which is also the tie-break for remainders: deterministic, but
/// order-dependent.
#[must_use]
pub fn plan_allocation(
    total_available: i64,
    locations: &[RemoteLocation],
    strategy: AllocationStrategy,
) -> Vec<LocationAllocation> {
    let active: Vec<&RemoteLocation> = locations.iter().filter(|l| l.is_active).collect();
    if active.is_empty() {
        return Vec::new();
    }
    let total = total_available.max(0);

    match strategy {
        AllocationStrategy::Balanced => balanced(total, &active),
        AllocationStrategy::Priority => priority(total, &active),
    }
}

fn balanced(total: i64, active: &[&RemoteLocation]) -> Vec<LocationAllocation> {
    let count = active.len() as i64;
    let per_location = total / count;
    let remainder = total % count;

    active
        .iter()
        .enumerate()
        .map(|(index, location)| LocationAllocation {
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            quantity: per_location + i64::from((index as i64) < remainder),
        })
        .collect()
}

fn priority(total: i64, active: &[&RemoteLocation]) -> Vec<LocationAllocation> {
    let primary_count = active.iter().filter(|l| l.fulfills_online_orders).count() as i64;
    let secondary_count = active.len() as i64 - primary_count;

    let primary_pool = total / 2;
    let secondary_pool = total - primary_pool;

    let per_primary = if primary_count > 0 {
        (primary_pool / primary_count).max(0)
    } else {
        0
    };
    let per_secondary = if secondary_count > 0 {
        (secondary_pool / secondary_count).max(0)
    } else {
        0
    };

    active
        .iter()
        .map(|location| LocationAllocation {
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            quantity: if location.fulfills_online_orders {
                per_primary
            } else {
                per_secondary
            },
        })
        .collect()
}

/// Advisory 0-100 score for how well stock is spread today.
///
/// Weighted 70% coverage (locations holding any stock) and 30% balance
/// (variance relative to the mean; an empty or all-zero spread scores 0).
/// Never gates an allocation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn allocation_efficiency(quantities: &[i64], active_location_count: usize) -> f64 {
    if active_location_count == 0 {
        return 0.0;
    }

    let stocked = quantities.iter().filter(|&&q| q > 0).count();
    let coverage = (stocked as f64 / active_location_count as f64) * 100.0;

    let balance = if quantities.is_empty() {
        0.0
    } else {
        let mean = quantities.iter().sum::<i64>() as f64 / quantities.len() as f64;
        if mean == 0.0 {
            0.0
        } else {
            let variance = quantities
                .iter()
                .map(|&q| {
                    let diff = q as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / quantities.len() as f64;
            (100.0 - 10.0 * variance / mean).max(0.0)
        }
    };

    0.7f64.mul_add(coverage, 0.3 * balance)
}
