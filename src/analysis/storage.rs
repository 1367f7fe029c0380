//! Receiving/movement reconciliation.
//!
//! Every received pallet is placed on a street by joining it to the
//! movement export, by RFID tag when both exports carry one and by the
//! `x` coordinate against `ground_position_alias` otherwise. Units are
//! then totalled per `HH:MM` bucket and street, with the share of units
//! that could not be placed.

use super::aggregator::round_to;
use crate::models::{
    JoinMethod, MovementTable, Period, ReceivingRecord, ReceivingTable, StorageOutcome,
    StorageReport, StorageRow, StorageTable, Traceability, STORAGE_TOTAL_LABEL,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Number of placeholder streets.
const PLACEHOLDER_STREETS: u64 = 5;

/// A receiving row after the join.
#[derive(Debug, Clone)]
struct JoinedRow<'a> {
    record: &'a ReceivingRecord,
    /// Receiving-side join key (RFID tag or `x`), empty when missing.
    key: &'a str,
    street: Option<String>,
}

/// Build the storage report.
///
/// `rfid_receiving` and `rfid_movement` are the detected RFID column names;
/// the RFID join is used only when both are known.
pub fn storage_report(
    receiving: &ReceivingTable,
    movement: &MovementTable,
    rfid_receiving: Option<&str>,
    rfid_movement: Option<&str>,
    period: &Period,
) -> StorageOutcome {
    let records: Vec<&ReceivingRecord> = receiving
        .records
        .iter()
        .filter(|r| period.contains(r.timestamp))
        .collect();

    if period.is_active() && records.is_empty() {
        info!("No receiving rows inside the selected period");
        return StorageOutcome::NoDataInPeriod;
    }

    let join_method = match (rfid_receiving, rfid_movement) {
        (Some(receiving_column), Some(movement_column))
            if receiving.has_column(receiving_column) && movement.has_column(movement_column) =>
        {
            JoinMethod::Rfid {
                receiving_column: receiving_column.to_string(),
                movement_column: movement_column.to_string(),
            }
        }
        _ => JoinMethod::Coordinate,
    };

    if !movement.has_column("name") {
        return StorageOutcome::InsufficientData;
    }
    if join_method == JoinMethod::Coordinate
        && !(movement.has_column("ground_position_alias") && receiving.has_column("x"))
    {
        return StorageOutcome::InsufficientData;
    }

    debug!("Joining receiving and movement by {}", join_method);
    let mut joined = left_join(&records, movement, &join_method);

    if joined.iter().all(|row| row.street.is_none()) {
        debug!("Join placed no pallet on a street, synthesizing street labels");
        for row in &mut joined {
            row.street = Some(placeholder_street(row.key));
        }
    }

    let table = build_table(&joined);

    let traceability = match join_method {
        JoinMethod::Rfid { .. } => Some(traceability(&joined, &join_method)),
        JoinMethod::Coordinate => None,
    };

    StorageOutcome::Report(StorageReport {
        join_method,
        table,
        traceability,
        period: period.describe(),
    })
}

fn join_key<'a>(record: &'a ReceivingRecord, method: &JoinMethod) -> &'a str {
    match method {
        JoinMethod::Rfid { .. } => record.rfid.as_deref().unwrap_or(""),
        JoinMethod::Coordinate => record.x.as_str(),
    }
}

/// Left join: one row per matching movement row, or one unplaced row.
fn left_join<'a>(
    records: &[&'a ReceivingRecord],
    movement: &'a MovementTable,
    method: &JoinMethod,
) -> Vec<JoinedRow<'a>> {
    let mut index: HashMap<&str, Vec<Option<&str>>> = HashMap::new();
    for entry in &movement.records {
        let key = match method {
            JoinMethod::Rfid { .. } => entry.rfid.as_deref().unwrap_or(""),
            JoinMethod::Coordinate => entry.ground_position_alias.as_str(),
        };
        if !key.is_empty() {
            index.entry(key).or_default().push(entry.name.as_deref());
        }
    }

    let mut joined = Vec::with_capacity(records.len());
    for &record in records {
        let key = join_key(record, method);
        match index.get(key).filter(|_| !key.is_empty()) {
            Some(names) => joined.extend(names.iter().map(|name| JoinedRow {
                record,
                key,
                street: name.map(str::to_string),
            })),
            None => joined.push(JoinedRow {
                record,
                key,
                street: None,
            }),
        }
    }
    joined
}

/// First eight bytes of the SHA-256 digest, big-endian.
fn stable_hash(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Street label derived from a join key.
pub fn placeholder_street(key: &str) -> String {
    let hash = stable_hash(key);
    street_label(hash % PLACEHOLDER_STREETS + 1, hash % 2 == 0)
}

fn street_label(number: u64, even: bool) -> String {
    format!("Rua {} {}", number, if even { "Par" } else { "Ímpar" })
}

/// `untracked / checked` as a whole percentage; `0%` when nothing was checked.
pub fn untracked_percentage(untracked: f64, checked: f64) -> String {
    if checked > 0.0 {
        format!("{}%", round_to(untracked / checked * 100.0, 0) as i64)
    } else {
        "0%".to_string()
    }
}

fn build_table(joined: &[JoinedRow<'_>]) -> StorageTable {
    let mut streets: Vec<String> = Vec::new();
    for street in joined.iter().filter_map(|row| row.street.as_ref()) {
        if !streets.contains(street) {
            streets.push(street.clone());
        }
    }
    if streets.is_empty() {
        streets = (1..=PLACEHOLDER_STREETS)
            .map(|i| street_label(i, i % 2 == 0))
            .collect();
    }
    let street_index: HashMap<&str, usize> = streets
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let bucketed: Vec<(String, &JoinedRow<'_>)> = joined
        .iter()
        .filter_map(|row| row.record.time_bucket().map(|bucket| (bucket, row)))
        .collect();
    let buckets: BTreeSet<&str> = bucketed.iter().map(|(b, _)| b.as_str()).collect();

    let rows: Vec<StorageRow> = buckets
        .into_iter()
        .map(|bucket| {
            let mut checked = 0.0;
            let mut untracked = 0.0;
            let mut per_street = vec![0.0; streets.len()];

            for (_, row) in bucketed.iter().filter(|(b, _)| b == bucket) {
                let quantity = row.record.initial_quantity;
                checked += quantity;
                match row.street.as_deref().and_then(|s| street_index.get(s)) {
                    Some(&i) => per_street[i] += quantity,
                    None => untracked += quantity,
                }
            }

            StorageRow {
                bucket: bucket.to_string(),
                checked,
                untracked,
                untracked_pct: untracked_percentage(untracked, checked),
                per_street,
            }
        })
        .collect();

    let total = total_row(&rows, streets.len());

    StorageTable {
        streets,
        rows,
        total,
    }
}

fn total_row(rows: &[StorageRow], street_count: usize) -> StorageRow {
    let checked: f64 = rows.iter().map(|r| r.checked).sum();
    let untracked: f64 = rows.iter().map(|r| r.untracked).sum();
    let mut per_street = vec![0.0; street_count];
    for row in rows {
        for (total, value) in per_street.iter_mut().zip(&row.per_street) {
            *total += value;
        }
    }

    StorageRow {
        bucket: STORAGE_TOTAL_LABEL.to_string(),
        checked,
        untracked,
        untracked_pct: untracked_percentage(untracked, checked),
        per_street,
    }
}

fn traceability(joined: &[JoinedRow<'_>], method: &JoinMethod) -> Traceability {
    let tracked = joined.iter().filter(|row| row.record.rfid.is_some()).count();
    let total = joined.len();
    let pct = if total > 0 {
        round_to(tracked as f64 / total as f64 * 100.0, 1)
    } else {
        0.0
    };

    Traceability {
        method: method.to_string(),
        tracked,
        total,
        tracked_pct: format!("{:.1}%", pct),
    }
}
