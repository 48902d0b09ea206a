// src/ingest/providers/excel.rs
use std::io::Cursor;

use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use shuttle_axum::axum::body::Bytes;

use crate::ingest::coerce::{datetime_to_serial, serial_to_datetime};
use crate::ingest::error::ImportError;
use crate::ingest::providers::{unique_headers, RowSource};
use crate::ingest::types::{RawRow, RawValue};
use crate::ingest::BatchSource;

/// Uploads above this are rejected before decode.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

static EXCEL_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(xlsx|xls)$").expect("excel extension regex"));

/// Check the file name and size of an upload before touching its bytes.
pub fn validate_upload(filename: &str, size: usize, limit: usize) -> Result<(), ImportError> {
    if !EXCEL_EXT.is_match(filename.trim()) {
        return Err(ImportError::UnsupportedFileType {
            filename: filename.to_string(),
        });
    }
    if size > limit {
        return Err(ImportError::TooLarge { size, limit });
    }
    Ok(())
}

/// Decode the first worksheet of an `.xlsx`/`.xls` payload into raw rows.
pub fn decode_workbook(bytes: Bytes) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ImportError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::EmptyWorkbook)?
        .map_err(|e| ImportError::Workbook(e.to_string()))?;
    Ok(rows_from_range(&range))
}

/// First row is the header. Every data row carries every header key, with
/// blank cells as empty text; rows with no content at all are skipped.
pub fn rows_from_range(range: &Range<Data>) -> Vec<RawRow> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers = unique_headers(header_row.iter().map(|c| cell_to_raw(c).to_text()));

    rows.filter(|r| r.iter().any(|c| cell_to_raw(c).is_present()))
        .map(|r| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let v = r.get(i).map(cell_to_raw).unwrap_or(RawValue::Text(String::new()));
                    (h.clone(), v)
                })
                .collect()
        })
        .collect()
}

fn cell_to_raw(cell: &Data) -> RawValue {
    match cell {
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => RawValue::Number(dt.as_f64()),
        Data::DateTime(dt) => date_cell(dt),
        Data::DateTimeIso(s) => parse_iso_cell(s),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => RawValue::Text(String::new()),
    }
}

/// `as_datetime` applies the workbook's date system (1900 or 1904). The
/// result is mapped back to a 1900-system serial so out-of-range values stay
/// numeric and the date coercion flags them.
fn date_cell(dt: &ExcelDateTime) -> RawValue {
    let serial = match dt.as_datetime() {
        Some(t) if dt.as_f64().is_finite() => datetime_to_serial(t),
        _ => f64::NAN,
    };
    serial_to_datetime(serial)
        .map(RawValue::DateTime)
        .unwrap_or(RawValue::Number(serial))
}

fn parse_iso_cell(s: &str) -> RawValue {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return RawValue::DateTime(dt);
    }
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => RawValue::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default()),
        Err(_) => RawValue::Text(s.to_string()),
    }
}

/// An uploaded spreadsheet waiting to be decoded.
pub struct ExcelUpload {
    filename: String,
    bytes: Bytes,
    limit: usize,
}

impl ExcelUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>, limit: usize) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            limit,
        }
    }
}

#[async_trait]
impl RowSource for ExcelUpload {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError> {
        validate_upload(&self.filename, self.bytes.len(), self.limit)?;
        let bytes = self.bytes.clone();
        // Decoding a large workbook is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || decode_workbook(bytes))
            .await
            .map_err(|e| ImportError::Workbook(e.to_string()))?
    }

    fn source(&self) -> BatchSource {
        BatchSource::Excel
    }
}
