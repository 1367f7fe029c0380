//! Data models for the RFID reports.
//!
//! This module contains the input records read from the movement and
//! receiving exports, and every report structure built from them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the totals row in the grouped pallets report.
pub const GROUPED_TOTAL_LABEL: &str = "Total";

/// Label of the totals row in the storage report.
pub const STORAGE_TOTAL_LABEL: &str = "TOTAL";

/// Text encoding a pair of input files was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "UTF-8"),
            Encoding::Latin1 => write!(f, "Latin-1"),
        }
    }
}

/// One row of the movement export.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementRecord {
    /// Ground position the pallet was moved to.
    pub ground_position_alias: String,
    /// RFID tag, when the export has an RFID column and the cell is filled.
    pub rfid: Option<String>,
    /// Street label of the position.
    pub name: Option<String>,
}

/// One row of the receiving export.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivingRecord {
    /// Product code.
    pub sku: String,
    /// Units on the pallet when it was received.
    pub initial_quantity: f64,
    pub x: String,
    pub y: String,
    pub z: String,
    /// When the pallet was checked in.
    pub timestamp: Option<NaiveDateTime>,
    /// Operator who checked the pallet in.
    pub admin_username: String,
    /// RFID tag, when the export has an RFID column and the cell is filled.
    pub rfid: Option<String>,
}

impl ReceivingRecord {
    /// `HH:MM` bucket of the receiving timestamp.
    pub fn time_bucket(&self) -> Option<String> {
        self.timestamp.map(|ts| ts.format("%H:%M").to_string())
    }

    /// Location key `x,y,z`, each coordinate cut at its decimal point.
    pub fn location(&self) -> String {
        format!(
            "{},{},{}",
            integer_part(&self.x),
            integer_part(&self.y),
            integer_part(&self.z)
        )
    }
}

fn integer_part(coordinate: &str) -> &str {
    coordinate.split('.').next().unwrap_or("0")
}

/// Records of one export together with the column names it was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    /// Cleaned column names, in file order.
    pub columns: Vec<String>,
    pub records: Vec<R>,
}

impl<R> Table<R> {
    /// Whether the export carried a column with this exact name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub type MovementTable = Table<MovementRecord>;
pub type ReceivingTable = Table<ReceivingRecord>;

/// Both exports, cleaned and ready for aggregation.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub movement: MovementTable,
    pub receiving: ReceivingTable,
    /// First movement column whose name contains `rfid`.
    pub rfid_column_movement: Option<String>,
    /// First receiving column whose name contains `rfid`.
    pub rfid_column_receiving: Option<String>,
    /// Encoding both files were decoded with.
    pub encoding: Encoding,
}

impl Dataset {
    /// True when both exports carry an RFID column.
    pub fn has_rfid(&self) -> bool {
        self.rfid_column_movement.is_some() && self.rfid_column_receiving.is_some()
    }
}

/// Received quantity for one product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuQuantity {
    pub sku: String,
    pub quantity: f64,
}

/// Pallet statistics for one product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuPalletStats {
    pub sku: String,
    pub pallets: usize,
    /// Mean units per pallet, rounded to two decimals.
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Max/min spread of the per-pallet quantity of one product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuVariation {
    pub sku: String,
    /// `max / min`, or `max` when the minimum is not positive.
    pub variation: f64,
}

/// One (time, location) row of the grouped pallets pivot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedRow {
    /// `HH:MM` bucket.
    pub hour: String,
    /// `x,y,z` location key.
    pub location: String,
    /// Pallet count per operator, aligned with [`GroupedPallets::users`].
    pub counts: Vec<u64>,
}

/// Pallets counted per time bucket, location and operator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupedPallets {
    /// Operator usernames, sorted.
    pub users: Vec<String>,
    pub rows: Vec<GroupedRow>,
    /// Per-operator totals over all rows.
    pub totals: Vec<u64>,
}

/// Headline numbers over the whole receiving export.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Distinct product codes.
    pub products: usize,
    /// Received pallets (rows).
    pub pallets: usize,
    /// Units over all pallets.
    pub units: f64,
    /// Mean units per pallet, rounded to two decimals.
    pub mean_per_pallet: f64,
}

/// Inclusive timestamp window applied to the receiving export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Period {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl Period {
    pub fn new(from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        Self { from, to }
    }

    /// True when at least one bound is set.
    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Whether a record with this timestamp passes the window.
    ///
    /// Records without a timestamp only pass an inactive window.
    pub fn contains(&self, timestamp: Option<NaiveDateTime>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(ts) = timestamp else {
            return false;
        };
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts <= to)
    }

    /// Human-readable description, e.g. `De: 2024-03-01 08:00:00 Até: 2024-03-01 12:00:00`.
    pub fn describe(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        let mut text = String::new();
        if let Some(from) = self.from {
            text.push_str(&format!("De: {}", from.format("%Y-%m-%d %H:%M:%S")));
        }
        if let Some(to) = self.to {
            text.push_str(&format!(" Até: {}", to.format("%Y-%m-%d %H:%M:%S")));
        }
        Some(text)
    }
}

/// How receiving rows were matched to movement rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JoinMethod {
    /// Matched on the RFID tag of both exports.
    Rfid {
        receiving_column: String,
        movement_column: String,
    },
    /// Matched receiving `x` against movement `ground_position_alias`.
    Coordinate,
}

impl fmt::Display for JoinMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMethod::Rfid {
                receiving_column,
                movement_column,
            } => write!(f, "RFID ({} e {})", receiving_column, movement_column),
            JoinMethod::Coordinate => write!(f, "Coordenada (x e ground_position_alias)"),
        }
    }
}

/// One time bucket of the storage report (or its totals row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRow {
    /// `HH:MM` bucket, or [`STORAGE_TOTAL_LABEL`].
    pub bucket: String,
    /// Units checked in during the bucket.
    pub checked: f64,
    /// Units whose pallet could not be placed on a street.
    pub untracked: f64,
    /// `untracked / checked` as a whole percentage, e.g. `25%`.
    pub untracked_pct: String,
    /// Units per street, aligned with [`StorageTable::streets`].
    pub per_street: Vec<f64>,
}

/// Units per time bucket and street.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageTable {
    pub streets: Vec<String>,
    pub rows: Vec<StorageRow>,
    pub total: StorageRow,
}

/// RFID coverage of the joined rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traceability {
    /// Join method label.
    pub method: String,
    /// Joined rows that carry an RFID tag.
    pub tracked: usize,
    /// All joined rows.
    pub total: usize,
    /// `tracked / total` with one decimal, e.g. `87.5%`.
    pub tracked_pct: String,
}

/// A successfully computed storage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageReport {
    pub join_method: JoinMethod,
    pub table: StorageTable,
    /// Present for RFID joins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceability: Option<Traceability>,
    /// Description of the applied period filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

/// Result of the receiving/movement reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StorageOutcome {
    Report(StorageReport),
    /// The period filter left no receiving rows.
    NoDataInPeriod,
    /// The exports lack the columns needed for the join.
    InsufficientData,
}

impl StorageOutcome {
    /// Column header and message for the non-report outcomes.
    pub fn message(&self) -> Option<(&'static str, &'static str)> {
        match self {
            StorageOutcome::Report(_) => None,
            StorageOutcome::NoDataInPeriod => {
                Some(("Mensagem", "Não há dados no período selecionado"))
            }
            StorageOutcome::InsufficientData => Some((
                "Erro",
                "Dados insuficientes para gerar relatório de armazenamento",
            )),
        }
    }

    pub fn report(&self) -> Option<&StorageReport> {
        match self {
            StorageOutcome::Report(report) => Some(report),
            _ => None,
        }
    }
}

/// Pallets received per hour over all operators and locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourActivity {
    pub hour: String,
    pub pallets: u64,
}

/// Checked/untracked columns of one storage bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDistribution {
    pub bucket: String,
    pub checked: f64,
    pub untracked: f64,
    pub untracked_pct: String,
}

/// "Codes and quantities" page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodesPage {
    pub quantities: Vec<SkuQuantity>,
    pub pallet_stats: Vec<SkuPalletStats>,
    /// Products with the highest mean per pallet.
    pub top_products: Vec<SkuPalletStats>,
    /// Products with the widest spread between smallest and largest pallet.
    pub outliers: Vec<SkuVariation>,
}

/// "Grouped pallets" page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedPage {
    pub table: GroupedPallets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Vec<HourActivity>>,
}

/// "Stored" page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePage {
    pub outcome: StorageOutcome,
    pub distribution: Vec<BucketDistribution>,
}

/// Metadata about a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub movement_path: String,
    pub receiving_path: String,
    pub generated_at: DateTime<Utc>,
    pub encoding: Encoding,
    pub movement_rows: usize,
    pub receiving_rows: usize,
    pub rfid_column_movement: Option<String>,
    pub rfid_column_receiving: Option<String>,
    /// Human-readable descriptions of the applied view filters.
    pub filters: Vec<String>,
    pub duration_seconds: f64,
}

/// The complete report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: SummaryMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<CodesPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped: Option<GroupedPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StoragePage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn record(x: &str, y: &str, z: &str) -> ReceivingRecord {
        ReceivingRecord {
            sku: "A1".to_string(),
            initial_quantity: 10.0,
            x: x.to_string(),
            y: y.to_string(),
            z: z.to_string(),
            timestamp: Some(at(9, 5)),
            admin_username: "ana".to_string(),
            rfid: None,
        }
    }

    #[test]
    fn test_location_truncates_decimals() {
        assert_eq!(record("12.0", "3", "1.5").location(), "12,3,1");
        assert_eq!(record("0", "0", "0").location(), "0,0,0");
    }

    #[test]
    fn test_time_bucket() {
        assert_eq!(record("1", "1", "1").time_bucket().as_deref(), Some("09:05"));
        let mut no_time = record("1", "1", "1");
        no_time.timestamp = None;
        assert_eq!(no_time.time_bucket(), None);
    }

    #[test]
    fn test_period_contains() {
        let open = Period::default();
        assert!(open.contains(None));
        assert!(open.contains(Some(at(1, 0))));

        let window = Period::new(Some(at(8, 0)), Some(at(10, 0)));
        assert!(window.contains(Some(at(8, 0))));
        assert!(window.contains(Some(at(10, 0))));
        assert!(!window.contains(Some(at(10, 1))));
        assert!(!window.contains(None));
    }

    #[test]
    fn test_period_describe() {
        assert_eq!(Period::default().describe(), None);
        let window = Period::new(Some(at(8, 0)), Some(at(10, 0)));
        assert_eq!(
            window.describe().as_deref(),
            Some("De: 2024-03-01 08:00:00 Até: 2024-03-01 10:00:00")
        );
        let upper = Period::new(None, Some(at(10, 0)));
        assert_eq!(upper.describe().as_deref(), Some(" Até: 2024-03-01 10:00:00"));
    }

    #[test]
    fn test_join_method_label() {
        let rfid = JoinMethod::Rfid {
            receiving_column: "rfid_tag".to_string(),
            movement_column: "RFID".to_string(),
        };
        assert_eq!(rfid.to_string(), "RFID (rfid_tag e RFID)");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            StorageOutcome::NoDataInPeriod.message(),
            Some(("Mensagem", "Não há dados no período selecionado"))
        );
        assert_eq!(StorageOutcome::InsufficientData.message().map(|m| m.0), Some("Erro"));
    }

    #[test]
    fn test_table_has_column() {
        let table: ReceivingTable = Table {
            columns: vec!["sku".to_string(), "x".to_string()],
            records: Vec::new(),
        };
        assert!(table.has_column("x"));
        assert!(!table.has_column("X"));
        assert!(table.is_empty());
    }
}
