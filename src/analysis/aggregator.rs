//! Receiving aggregation and statistics.
//!
//! This module builds the reports that only need the receiving export:
//! quantities per product, pallet statistics per product, and pallets
//! grouped by time, location and operator.

use crate::models::{
    GroupedPallets, GroupedRow, ReceivingRecord, ReceivingTable, SkuPalletStats, SkuQuantity,
    SummaryMetrics,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Round half to even at the given number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Total received quantity per product code, sorted by code.
pub fn codes_and_quantities(receiving: &ReceivingTable) -> Vec<SkuQuantity> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();

    for record in receiving.records.iter().filter(|r| !r.sku.is_empty()) {
        *totals.entry(record.sku.as_str()).or_default() += record.initial_quantity;
    }

    totals
        .into_iter()
        .map(|(sku, quantity)| SkuQuantity {
            sku: sku.to_string(),
            quantity,
        })
        .collect()
}

/// Pallet count and mean/min/max units per pallet for each product code.
pub fn pallet_stats_by_sku(receiving: &ReceivingTable) -> Vec<SkuPalletStats> {
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for record in receiving.records.iter().filter(|r| !r.sku.is_empty()) {
        grouped
            .entry(record.sku.as_str())
            .or_default()
            .push(record.initial_quantity);
    }

    grouped
        .into_iter()
        .map(|(sku, quantities)| {
            let pallets = quantities.len();
            let sum: f64 = quantities.iter().sum();
            let min = quantities.iter().copied().fold(f64::INFINITY, f64::min);
            let max = quantities.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            SkuPalletStats {
                sku: sku.to_string(),
                pallets,
                mean: round_to(sum / pallets as f64, 2),
                min,
                max,
            }
        })
        .collect()
}

/// Pivot pallets by (`HH:MM`, location) and operator.
///
/// When the receiving export has an RFID column, a pallet counts when its
/// tag is filled; otherwise when its SKU is filled. Rows without a
/// timestamp or operator are left out.
pub fn grouped_pallets(receiving: &ReceivingTable, rfid_column: Option<&str>) -> GroupedPallets {
    let by_rfid = rfid_column.is_some_and(|c| receiving.has_column(c));
    let counts_as_pallet = |record: &ReceivingRecord| {
        if by_rfid {
            record.rfid.is_some()
        } else {
            !record.sku.is_empty()
        }
    };

    let mut users: BTreeSet<&str> = BTreeSet::new();
    let mut cells: BTreeMap<(String, String), BTreeMap<&str, u64>> = BTreeMap::new();

    for record in &receiving.records {
        let Some(hour) = record.time_bucket() else {
            continue;
        };
        if record.admin_username.is_empty() {
            continue;
        }

        users.insert(record.admin_username.as_str());
        let per_user = cells.entry((hour, record.location())).or_default();
        let count = per_user.entry(record.admin_username.as_str()).or_default();
        if counts_as_pallet(record) {
            *count += 1;
        }
    }

    let users: Vec<&str> = users.into_iter().collect();
    let mut totals = vec![0u64; users.len()];

    let rows = cells
        .into_iter()
        .map(|((hour, location), per_user)| {
            let counts: Vec<u64> = users
                .iter()
                .map(|user| per_user.get(user).copied().unwrap_or(0))
                .collect();
            for (total, count) in totals.iter_mut().zip(&counts) {
                *total += count;
            }
            GroupedRow {
                hour,
                location,
                counts,
            }
        })
        .collect();

    GroupedPallets {
        users: users.into_iter().map(String::from).collect(),
        rows,
        totals,
    }
}

/// Headline numbers over the whole receiving export.
pub fn summary_metrics(receiving: &ReceivingTable) -> SummaryMetrics {
    let products: HashSet<&str> = receiving
        .records
        .iter()
        .filter(|r| !r.sku.is_empty())
        .map(|r| r.sku.as_str())
        .collect();
    let pallets = receiving.len();
    let units: f64 = receiving.records.iter().map(|r| r.initial_quantity).sum();
    let mean_per_pallet = if pallets > 0 {
        round_to(units / pallets as f64, 2)
    } else {
        0.0
    };

    SummaryMetrics {
        products: products.len(),
        pallets,
        units,
        mean_per_pallet,
    }
}
