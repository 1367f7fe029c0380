//! Filtered views and chart series over the computed reports.

use crate::models::{
    BucketDistribution, GroupedPallets, HourActivity, SkuPalletStats, SkuVariation, StorageTable,
};
use std::collections::BTreeMap;

/// Smallest and largest allowed product count for [`top_products_by_mean`].
pub const TOP_PRODUCTS_RANGE: (usize, usize) = (5, 20);

/// Default product count for [`top_products_by_mean`].
pub const DEFAULT_TOP_PRODUCTS: usize = 10;

/// Keep grouped rows matching the selected hours and locations.
///
/// An empty selection keeps everything. Totals are left as computed over
/// the full report.
pub fn filter_grouped(grouped: &GroupedPallets, hours: &[String], locations: &[String]) -> GroupedPallets {
    let rows = grouped
        .rows
        .iter()
        .filter(|row| hours.is_empty() || hours.contains(&row.hour))
        .filter(|row| locations.is_empty() || locations.contains(&row.location))
        .cloned()
        .collect();

    GroupedPallets {
        users: grouped.users.clone(),
        rows,
        totals: grouped.totals.clone(),
    }
}

/// Keep storage rows for the selected buckets; `totals_only` drops every bucket row.
pub fn filter_storage(table: &StorageTable, buckets: &[String], totals_only: bool) -> StorageTable {
    let rows = if totals_only {
        Vec::new()
    } else {
        table
            .rows
            .iter()
            .filter(|row| buckets.is_empty() || buckets.contains(&row.bucket))
            .cloned()
            .collect()
    };

    StorageTable {
        streets: table.streets.clone(),
        rows,
        total: table.total.clone(),
    }
}

/// The `n` products with the highest mean units per pallet.
pub fn top_products_by_mean(stats: &[SkuPalletStats], n: usize) -> Vec<SkuPalletStats> {
    let n = n.clamp(TOP_PRODUCTS_RANGE.0, TOP_PRODUCTS_RANGE.1);
    let mut sorted = stats.to_vec();
    sorted.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    sorted.truncate(n);
    sorted
}

/// The `n` products with the largest max/min quantity ratio.
///
/// A product whose smallest pallet is empty is ranked by its largest pallet.
pub fn outliers_by_variation(stats: &[SkuPalletStats], n: usize) -> Vec<SkuVariation> {
    let n = n.clamp(TOP_PRODUCTS_RANGE.0, TOP_PRODUCTS_RANGE.1);
    let mut variations: Vec<SkuVariation> = stats
        .iter()
        .map(|s| SkuVariation {
            sku: s.sku.clone(),
            variation: if s.min > 0.0 { s.max / s.min } else { s.max },
        })
        .collect();
    variations.sort_by(|a, b| b.variation.total_cmp(&a.variation));
    variations.truncate(n);
    variations
}

/// Pallets per hour over all operators and locations.
///
/// Returns `None` unless at least two hours have activity.
pub fn activity_by_hour(grouped: &GroupedPallets) -> Option<Vec<HourActivity>> {
    let mut per_hour: BTreeMap<&str, u64> = BTreeMap::new();
    for row in &grouped.rows {
        *per_hour.entry(row.hour.as_str()).or_default() += row.counts.iter().sum::<u64>();
    }

    if per_hour.len() <= 1 {
        return None;
    }

    Some(
        per_hour
            .into_iter()
            .map(|(hour, pallets)| HourActivity {
                hour: hour.to_string(),
                pallets,
            })
            .collect(),
    )
}

/// Checked/untracked columns of each bucket row.
pub fn storage_distribution(table: &StorageTable) -> Vec<BucketDistribution> {
    table
        .rows
        .iter()
        .map(|row| BucketDistribution {
            bucket: row.bucket.clone(),
            checked: row.checked,
            untracked: row.untracked,
            untracked_pct: row.untracked_pct.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupedRow, StorageRow};

    fn grouped() -> GroupedPallets {
        let row = |hour: &str, location: &str, counts: Vec<u64>| GroupedRow {
            hour: hour.to_string(),
            location: location.to_string(),
            counts,
        };
        GroupedPallets {
            users: vec!["ana".to_string(), "bruno".to_string()],
            rows: vec![
                row("08:00", "1,1,1", vec![1, 2]),
                row("08:00", "2,1,1", vec![0, 1]),
                row("09:30", "1,1,1", vec![3, 0]),
            ],
            totals: vec![4, 3],
        }
    }

    fn storage_row(bucket: &str, checked: f64) -> StorageRow {
        StorageRow {
            bucket: bucket.to_string(),
            checked,
            untracked: 0.0,
            untracked_pct: "0%".to_string(),
            per_street: vec![checked],
        }
    }

    fn storage_table() -> StorageTable {
        StorageTable {
            streets: vec!["Rua A".to_string()],
            rows: vec![storage_row("08:00", 5.0), storage_row("09:00", 7.0)],
            total: storage_row("TOTAL", 12.0),
        }
    }

    fn stats(sku: &str, mean: f64) -> SkuPalletStats {
        SkuPalletStats {
            sku: sku.to_string(),
            pallets: 1,
            mean,
            min: mean,
            max: mean,
        }
    }

    #[test]
    fn test_filter_grouped_by_hour_and_location() {
        let filtered = filter_grouped(&grouped(), &["08:00".to_string()], &[]);
        assert_eq!(filtered.rows.len(), 2);
        assert_eq!(filtered.totals, vec![4, 3]);

        let filtered = filter_grouped(&grouped(), &[], &["1,1,1".to_string()]);
        let hours: Vec<&str> = filtered.rows.iter().map(|r| r.hour.as_str()).collect();
        assert_eq!(hours, vec!["08:00", "09:30"]);

        let filtered = filter_grouped(&grouped(), &["09:30".to_string()], &["2,1,1".to_string()]);
        assert!(filtered.rows.is_empty());
    }

    #[test]
    fn test_filter_storage() {
        let filtered = filter_storage(&storage_table(), &["09:00".to_string()], false);
        assert_eq!(filtered.rows.len(), 1);
        assert_eq!(filtered.total.checked, 12.0);

        let totals = filter_storage(&storage_table(), &[], true);
        assert!(totals.rows.is_empty());
        assert_eq!(totals.total.bucket, "TOTAL");
    }

    #[test]
    fn test_top_products_clamps_count() {
        let all: Vec<SkuPalletStats> = (0..30).map(|i| stats(&format!("S{:02}", i), i as f64)).collect();

        let top = top_products_by_mean(&all, 3);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].sku, "S29");

        assert_eq!(top_products_by_mean(&all, 50).len(), 20);
        assert_eq!(top_products_by_mean(&all[..2], 10).len(), 2);
    }

    #[test]
    fn test_outliers_by_variation() {
        let spread = |sku: &str, min: f64, max: f64| SkuPalletStats {
            sku: sku.to_string(),
            pallets: 2,
            mean: (min + max) / 2.0,
            min,
            max,
        };
        let all = vec![
            spread("A", 10.0, 20.0),
            spread("B", 0.0, 7.0),
            spread("C", 2.0, 16.0),
            spread("D", 5.0, 5.0),
        ];

        let outliers = outliers_by_variation(&all, 10);
        let ranked: Vec<(&str, f64)> = outliers.iter().map(|o| (o.sku.as_str(), o.variation)).collect();
        assert_eq!(ranked, vec![("C", 8.0), ("B", 7.0), ("A", 2.0), ("D", 1.0)]);
    }

    #[test]
    fn test_outliers_clamps_count() {
        let all: Vec<SkuPalletStats> = (1..=30).map(|i| stats(&format!("S{:02}", i), i as f64)).collect();

        // min == max for every product.
        let outliers = outliers_by_variation(&all, 1);
        assert_eq!(outliers.len(), 5);
        assert!(outliers.iter().all(|o| o.variation == 1.0));
        assert_eq!(outliers_by_variation(&all, 100).len(), 20);
    }

    #[test]
    fn test_activity_by_hour() {
        let activity = activity_by_hour(&grouped()).unwrap();
        assert_eq!(
            activity,
            vec![
                HourActivity { hour: "08:00".to_string(), pallets: 4 },
                HourActivity { hour: "09:30".to_string(), pallets: 3 },
            ]
        );

        let single = filter_grouped(&grouped(), &["08:00".to_string()], &[]);
        assert_eq!(activity_by_hour(&single), None);
    }

    #[test]
    fn test_storage_distribution_skips_total() {
        let distribution = storage_distribution(&storage_table());
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution[1].bucket, "09:00");
        assert_eq!(distribution[1].checked, 7.0);
    }
}
