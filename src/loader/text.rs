//! Cell-level decoding and cleaning helpers.

use crate::models::Encoding;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Cell values treated as missing, in addition to the empty string.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Decode file bytes as UTF-8, or `None` when they are not valid UTF-8.
pub fn decode_utf8(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes)
        .ok()
        .map(|text| strip_bom(text).to_string())
}

/// Decode file bytes as Latin-1. Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode file bytes, falling back to Latin-1 when they are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> (String, Encoding) {
    match decode_utf8(bytes) {
        Some(text) => (text, Encoding::Utf8),
        None => (decode_latin1(bytes), Encoding::Latin1),
    }
}

fn strip_bom(text: &str) -> &str {
    text.trim_start_matches('\u{FEFF}')
}

/// Strip surrounding quotes and spaces from a column name.
pub fn clean_header(name: &str) -> String {
    name.trim_matches(|c| c == '"' || c == ' ').to_string()
}

/// Whether a raw cell counts as missing.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed)
}

/// Trimmed cell value, or `None` when missing.
pub fn present(value: &str) -> Option<String> {
    if is_missing(value) {
        None
    } else {
        Some(value.trim().to_string())
    }
}

/// Parse a quantity cell; anything unparsable counts as zero.
pub fn parse_quantity(value: &str) -> f64 {
    if is_missing(value) {
        return 0.0;
    }
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a timestamp cell leniently; unparsable values yield `None`.
///
/// Timestamps with an offset keep their local wall-clock time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if is_missing(value) {
        return None;
    }
    let text = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_local());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_decode_utf8_with_bom() {
        let (text, encoding) = decode_text("\u{FEFF}sku;x".as_bytes());
        assert_eq!(text, "sku;x");
        assert_eq!(encoding, Encoding::Utf8);
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // "Ímpar" in Latin-1
        let bytes = [0xCD, b'm', b'p', b'a', b'r'];
        let (text, encoding) = decode_text(&bytes);
        assert_eq!(text, "Ímpar");
        assert_eq!(encoding, Encoding::Latin1);
    }

    #[test]
    fn test_clean_header() {
        assert_eq!(clean_header("\" sku \""), "sku");
        assert_eq!(clean_header("initial_quantity"), "initial_quantity");
    }

    #[test]
    fn test_missing_markers() {
        assert!(is_missing(""));
        assert!(is_missing("  "));
        assert!(is_missing("NaN"));
        assert!(is_missing("null"));
        assert!(!is_missing("0"));
        assert_eq!(present(" E200 "), Some("E200".to_string()));
        assert_eq!(present("nan"), None);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("12"), 12.0);
        assert_eq!(parse_quantity(" 7.5 "), 7.5);
        assert_eq!(parse_quantity("abc"), 0.0);
        assert_eq!(parse_quantity(""), 0.0);
        assert_eq!(parse_quantity("inf"), 0.0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let iso = parse_timestamp("2024-03-01 09:15:30").unwrap();
        assert_eq!((iso.hour(), iso.minute(), iso.second()), (9, 15, 30));

        let fractional = parse_timestamp("2024-03-01T09:15:30.250").unwrap();
        assert_eq!(fractional.minute(), 15);

        let offset = parse_timestamp("2024-03-01T09:15:30-03:00").unwrap();
        assert_eq!(offset.hour(), 9);

        let spaced_offset = parse_timestamp("2024-03-01 09:15:30+00:00").unwrap();
        assert_eq!(spaced_offset.hour(), 9);

        let brazilian = parse_timestamp("01/03/2024 14:05").unwrap();
        assert_eq!((brazilian.hour(), brazilian.minute()), (14, 5));

        let date_only = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(date_only.hour(), 0);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("NaT"), None);
    }
}
