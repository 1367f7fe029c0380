//! CSV loading for the movement and receiving exports.
//!
//! Both exports are `;`-delimited. Files are decoded as UTF-8 when both
//! are valid UTF-8, otherwise both are decoded as Latin-1. Malformed rows
//! are skipped with a warning instead of failing the load.

pub mod text;

use crate::models::{
    Dataset, Encoding, MovementRecord, MovementTable, ReceivingRecord, ReceivingTable, Table,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use text::parse_timestamp;

/// Errors that prevent an export from being loaded at all.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header row could not be parsed.
    #[error("failed to read CSV header of {}: {source}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file has no header row.
    #[error("{} has no header row", .0.display())]
    Empty(PathBuf),
}

/// Options controlling how exports are parsed.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { delimiter: b';' }
    }
}

impl From<&crate::config::InputConfig> for LoadOptions {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            delimiter: config.delimiter_byte(),
        }
    }
}

/// Header and rows of a parsed export, before typing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Cleaned column names.
    pub headers: Vec<String>,
    /// Rows, each padded to the header width.
    pub rows: Vec<Vec<String>>,
    /// Rows dropped as malformed.
    pub skipped: usize,
}

impl RawTable {
    /// Index of a column by exact name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First column whose name contains `rfid`, case-insensitively.
    pub fn rfid_column(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.to_lowercase().contains("rfid"))
            .map(String::as_str)
    }
}

/// Load and clean both exports.
pub fn load_dataset(
    movement_path: &Path,
    receiving_path: &Path,
    options: &LoadOptions,
) -> Result<Dataset, LoadError> {
    let movement_bytes = read_bytes(movement_path)?;
    let receiving_bytes = read_bytes(receiving_path)?;

    let (movement_text, movement_encoding) = text::decode_text(&movement_bytes);
    let (receiving_text, receiving_encoding) = text::decode_text(&receiving_bytes);

    let (movement_text, receiving_text, encoding) =
        if movement_encoding == Encoding::Utf8 && receiving_encoding == Encoding::Utf8 {
            (movement_text, receiving_text, Encoding::Utf8)
        } else {
            warn!("Input is not valid UTF-8, decoding both files as Latin-1");
            (
                text::decode_latin1(&movement_bytes),
                text::decode_latin1(&receiving_bytes),
                Encoding::Latin1,
            )
        };

    let movement_raw = parse_table(&movement_text, options.delimiter, movement_path)?;
    let receiving_raw = parse_table(&receiving_text, options.delimiter, receiving_path)?;

    let rfid_column_movement = movement_raw.rfid_column().map(str::to_string);
    let rfid_column_receiving = receiving_raw.rfid_column().map(str::to_string);
    debug!(
        "RFID columns: movement={:?}, receiving={:?}",
        rfid_column_movement, rfid_column_receiving
    );

    let movement = movement_table(movement_raw, rfid_column_movement.as_deref());
    let receiving = receiving_table(receiving_raw, rfid_column_receiving.as_deref());

    info!(
        "Loaded {} movement rows and {} receiving rows ({})",
        movement.len(),
        receiving.len(),
        encoding
    );

    Ok(Dataset {
        movement,
        receiving,
        rfid_column_movement,
        rfid_column_receiving,
        encoding,
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse decoded CSV text into a raw table.
///
/// `source` is only used for error messages and logging.
pub fn parse_table(text: &str, delimiter: u8, source: &Path) -> Result<RawTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::Header {
            path: source.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::Empty(source.to_path_buf()));
    }

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect::<Vec<_>>()),
            Err(e) => {
                warn!("Skipping malformed row {} in {}: {}", index + 2, source.display(), e);
                skipped += 1;
            }
        }
    }

    let delimiter_char = char::from(delimiter);
    let (headers, rows) = if headers.len() == 1 && headers[0].contains(delimiter_char) {
        debug!(
            "{} was read as a single quoted column, splitting on '{}'",
            source.display(),
            delimiter_char
        );
        resplit(&headers[0], rows, delimiter_char)
    } else {
        (headers, rows)
    };

    let headers: Vec<String> = headers.iter().map(|h| text::clean_header(h)).collect();
    let width = headers.len();

    let mut table = RawTable {
        headers,
        rows: Vec::with_capacity(rows.len()),
        skipped,
    };
    for (index, mut row) in rows.into_iter().enumerate() {
        if row.len() > width {
            warn!(
                "Skipping row {} in {}: expected {} fields, saw {}",
                index + 2,
                source.display(),
                width,
                row.len()
            );
            table.skipped += 1;
            continue;
        }
        row.resize(width, String::new());
        table.rows.push(row);
    }

    if table.skipped > 0 {
        info!("Skipped {} malformed rows in {}", table.skipped, source.display());
    }

    Ok(table)
}

/// Split a single-column table whose lines were quoted whole.
fn resplit(header: &str, rows: Vec<Vec<String>>, delimiter: char) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = header.split(delimiter).map(str::to_string).collect();
    let rows = rows
        .into_iter()
        .map(|row| {
            row.first()
                .map(|cell| cell.split(delimiter).map(str::to_string).collect())
                .unwrap_or_default()
        })
        .collect();
    (headers, rows)
}

fn cell<'a>(row: &'a [String], index: Option<usize>) -> &'a str {
    index.and_then(|i| row.get(i)).map_or("", String::as_str)
}

/// Coordinate cell; missing coordinates read as `0`.
fn coordinate(row: &[String], index: Option<usize>) -> String {
    text::present(cell(row, index)).unwrap_or_else(|| "0".to_string())
}

fn movement_table(raw: RawTable, rfid_column: Option<&str>) -> MovementTable {
    let alias = raw.column("ground_position_alias");
    let name = raw.column("name");
    let rfid = rfid_column.and_then(|c| raw.column(c));

    let records = raw
        .rows
        .iter()
        .map(|row| MovementRecord {
            ground_position_alias: text::present(cell(row, alias)).unwrap_or_default(),
            rfid: text::present(cell(row, rfid)),
            name: text::present(cell(row, name)),
        })
        .collect();

    Table {
        columns: raw.headers,
        records,
    }
}

fn receiving_table(raw: RawTable, rfid_column: Option<&str>) -> ReceivingTable {
    let sku = raw.column("sku");
    let quantity = raw.column("initial_quantity");
    let x = raw.column("x");
    let y = raw.column("y");
    let z = raw.column("z");
    let timestamp = raw.column("timestamp");
    let username = raw.column("admin_username");
    let rfid = rfid_column.and_then(|c| raw.column(c));

    let records: Vec<ReceivingRecord> = raw
        .rows
        .iter()
        .map(|row| ReceivingRecord {
            sku: text::present(cell(row, sku)).unwrap_or_default(),
            initial_quantity: text::parse_quantity(cell(row, quantity)),
            x: coordinate(row, x),
            y: coordinate(row, y),
            z: coordinate(row, z),
            timestamp: text::parse_timestamp(cell(row, timestamp)),
            admin_username: text::present(cell(row, username)).unwrap_or_default(),
            rfid: text::present(cell(row, rfid)),
        })
        .collect();

    let unparsed = records.iter().filter(|r| r.timestamp.is_none()).count();
    if timestamp.is_some() && unparsed > 0 {
        warn!("{} receiving rows have no parsable timestamp", unparsed);
    }

    Table {
        columns: raw.headers,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
    }

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_parse_table_pads_and_skips() {
        let csv = "sku;initial_quantity;x\nA;10;1\nB;5\nC;1;2;3\n";
        let table = parse_table(csv, b';', Path::new("test.csv")).unwrap();

        assert_eq!(table.headers, vec!["sku", "initial_quantity", "x"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["B", "5", ""]);
        assert_eq!(table.skipped, 1);
    }

    #[test]
    fn test_parse_table_cleans_headers() {
        let csv = "\" sku \";\"x \"\nA;1\n";
        let table = parse_table(csv, b';', Path::new("test.csv")).unwrap();
        assert_eq!(table.headers, vec!["sku", "x"]);
    }

    #[test]
    fn test_parse_table_resplits_quoted_lines() {
        let csv = "\"sku;initial_quantity\"\n\"A;10\"\n\"B;4\"\n";
        let table = parse_table(csv, b';', Path::new("test.csv")).unwrap();

        assert_eq!(table.headers, vec!["sku", "initial_quantity"]);
        assert_eq!(table.rows, vec![vec!["A", "10"], vec!["B", "4"]]);
    }

    #[test]
    fn test_parse_table_empty_input() {
        let result = parse_table("", b';', Path::new("empty.csv"));
        assert!(matches!(result, Err(LoadError::Empty(_))));
    }

    #[test]
    fn test_rfid_column_detection() {
        let csv = "sku;Pallet_RFID;rfid_2\nA;E1;E2\n";
        let table = parse_table(csv, b';', Path::new("test.csv")).unwrap();
        assert_eq!(table.rfid_column(), Some("Pallet_RFID"));

        let plain = parse_table("sku;x\nA;1\n", b';', Path::new("test.csv")).unwrap();
        assert_eq!(plain.rfid_column(), None);
    }

    #[test]
    fn test_load_fixtures() {
        let dataset = load_dataset(
            &fixture("movement.csv"),
            &fixture("receiving.csv"),
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(dataset.encoding, Encoding::Utf8);
        assert_eq!(dataset.rfid_column_movement.as_deref(), Some("rfid"));
        assert_eq!(dataset.rfid_column_receiving.as_deref(), Some("rfid"));
        assert!(dataset.has_rfid());
        assert_eq!(dataset.movement.len(), 5);
        assert_eq!(dataset.receiving.len(), 8);

        let missing_coordinate = dataset
            .receiving
            .records
            .iter()
            .find(|r| r.sku == "SKU-300")
            .unwrap();
        assert_eq!(missing_coordinate.z, "0");
        assert_eq!(missing_coordinate.initial_quantity, 0.0);
    }

    #[test]
    fn test_load_latin1_files() {
        let dir = TempDir::new().unwrap();
        let movement = write_file(
            &dir,
            "movement.csv",
            b"ground_position_alias;name\n10;Rua Cinco \xcdmpar\n",
        );
        let receiving = write_file(
            &dir,
            "receiving.csv",
            b"sku;initial_quantity;x;y;z;timestamp;admin_username\nA;3;10;1;1;2024-03-01 08:00:00;jo\xe3o\n",
        );

        let dataset = load_dataset(&movement, &receiving, &LoadOptions::default()).unwrap();

        assert_eq!(dataset.encoding, Encoding::Latin1);
        assert_eq!(
            dataset.movement.records[0].name.as_deref(),
            Some("Rua Cinco Ímpar")
        );
        assert_eq!(dataset.receiving.records[0].admin_username, "joão");
        assert!(!dataset.has_rfid());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let receiving = write_file(&dir, "receiving.csv", b"sku\nA\n");
        let result = load_dataset(
            &dir.path().join("absent.csv"),
            &receiving,
            &LoadOptions::default(),
        );
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }
}
