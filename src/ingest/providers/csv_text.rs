// src/ingest/providers/csv_text.rs
//! Delimited-text decode with header-based keys and per-cell dynamic typing.

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::error::ImportError;
use crate::ingest::providers::unique_headers;
use crate::ingest::types::{RawRow, RawValue};

/// Largest integer a double represents exactly; larger "numbers" stay text.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$").expect("float regex")
});

// Full ISO-8601 timestamp with a zone; seconds and fraction optional.
static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-[01]\d-[0-3]\dT[0-2]\d:[0-5]\d)(:[0-5]\d(?:\.\d+)?)?([+-][0-2]\d:[0-5]\d|Z)$")
        .expect("iso datetime regex")
});

/// Type one CSV cell: booleans, numbers and zoned ISO timestamps are
/// recognized; blank cells are empty; everything else stays text.
pub fn dynamic_value(cell: &str) -> RawValue {
    match cell {
        "" => return RawValue::Empty,
        "true" | "TRUE" => return RawValue::Bool(true),
        "false" | "FALSE" => return RawValue::Bool(false),
        _ => {}
    }
    if FLOAT.is_match(cell) {
        if let Ok(n) = cell.trim().parse::<f64>() {
            if n.abs() <= MAX_SAFE_INTEGER {
                return RawValue::Number(n);
            }
        }
    }
    if let Some(caps) = ISO_DATETIME.captures(cell) {
        let seconds = caps.get(2).map_or(":00", |m| m.as_str());
        let rfc3339 = format!("{}{}{}", &caps[1], seconds, &caps[3]);
        if let Ok(dt) = DateTime::parse_from_rfc3339(&rfc3339) {
            return RawValue::DateTime(dt.with_timezone(&Utc).naive_utc());
        }
    }
    RawValue::Text(cell.to_string())
}

/// Parse CSV text with a header row. Headers are trimmed, short rows simply
/// lack the trailing keys, and blank lines are skipped. A line of empty
/// fields (`,,,`) is still a row.
pub fn parse_csv_rows(text: &str) -> Result<Vec<RawRow>, ImportError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = unique_headers(
        reader
            .headers()
            .map_err(|e| ImportError::Csv(format!("failed to read headers: {e}")))?
            .iter(),
    );

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ImportError::Csv(format!("row {}: {e}", i + 1)))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.clone(), dynamic_value(cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
