// src/ingest/coerce.rs
//! Total coercions from a resolved [`RawValue`] to the canonical field types.
//!
//! Every function here returns a value for every input. A malformed cell is
//! never an error: it falls back to the field default so one dirty row cannot
//! sink a whole import.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::counter;

use crate::ingest::types::RawValue;

/// Days from the spreadsheet epoch (1899-12-30) to the Unix epoch.
pub const SPREADSHEET_UNIX_EPOCH_DAYS: f64 = 25_569.0;

/// Serials below this fall on or before 1900-02-28, where the 1900 leap-year
/// bug makes the conversion ambiguous. Treated as unsupported.
pub const MIN_SUPPORTED_SERIAL: f64 = 61.0;

const SECS_PER_DAY: f64 = 86_400.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

/// Resolve a date cell to a calendar date.
///
/// 1. absent/empty -> `today`
/// 2. text -> generic date parse (with or without a time part)
/// 3. number -> spreadsheet serial day count
/// 4. typed date -> as-is
/// 5. anything else, or an unparsable value -> `today`
///
/// Time of day and timezone are discarded.
pub fn coerce_date(value: Option<&RawValue>, today: NaiveDate) -> NaiveDate {
    let Some(value) = value.filter(|v| v.is_present()) else {
        return today;
    };
    let parsed = match value {
        RawValue::Text(s) => parse_text_date(s),
        RawValue::Number(serial) => {
            let out = serial_to_date(*serial);
            if out.is_none() {
                counter!("ingest_unsupported_dates_total").increment(1);
                tracing::debug!(target: "ingest", serial = *serial, "unsupported spreadsheet serial date");
            }
            out
        }
        RawValue::DateTime(dt) => Some(dt.date()),
        RawValue::Bool(_) | RawValue::Empty => None,
    };
    parsed.unwrap_or(today)
}

/// Same as [`coerce_date`], rendered as `YYYY-MM-DD`.
pub fn coerce_date_string(value: Option<&RawValue>, today: NaiveDate) -> String {
    coerce_date(value, today).format("%Y-%m-%d").to_string()
}

/// Generic textual date parse. Strings with and without a time component go
/// through the same path; zoned timestamps are normalized to UTC first.
pub fn parse_text_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Convert a spreadsheet serial day count (1900 date system) to a UTC date.
///
/// `None` for non-finite serials, serials in the unsupported pre-1900-03-01
/// range, and results outside the representable range.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    serial_to_datetime(serial).map(|dt| dt.date())
}

/// Serial day count to a naive UTC timestamp, keeping the time of day.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < MIN_SUPPORTED_SERIAL {
        return None;
    }
    let millis = ((serial - SPREADSHEET_UNIX_EPOCH_DAYS) * SECS_PER_DAY * 1_000.0).round();
    if !(i64::MIN as f64..=i64::MAX as f64).contains(&millis) {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.naive_utc())
}

/// Inverse of [`serial_to_datetime`]: a naive UTC timestamp as a 1900-system
/// serial day count.
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64 / (SECS_PER_DAY * 1_000.0) + SPREADSHEET_UNIX_EPOCH_DAYS
}

/// Integer coercion: stringify, then take the leading integer
/// (`"42"` -> 42, `"3.7"` -> 3, `"-5"` -> -5, `"abc"` -> 0). Absent -> 0.
pub fn coerce_int(value: Option<&RawValue>) -> i64 {
    match value.filter(|v| v.is_present()) {
        None => 0,
        Some(RawValue::Number(n)) if n.is_finite() => n.trunc() as i64,
        Some(RawValue::Number(_)) => 0,
        Some(other) => parse_leading_int(&other.to_text()),
    }
}

/// Leading-integer parse: optional whitespace, optional sign, digits.
/// Anything after the digits is ignored; no digits -> 0. Saturates on overflow.
pub fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return 0;
    }
    let digits = &rest[..digits_len];
    match digits.parse::<i64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    }
}

/// Text coercion: stringify and trim. Absent -> empty string.
pub fn coerce_text(value: Option<&RawValue>) -> String {
    value
        .filter(|v| v.is_present())
        .map(|v| v.to_text().trim().to_string())
        .unwrap_or_default()
}

/// Categorical pass-through: stringified, not validated, not trimmed.
pub fn coerce_label(value: Option<&RawValue>, default: &str) -> String {
    value
        .filter(|v| v.is_present())
        .map(RawValue::to_text)
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn serial_44197_is_new_year_2021() {
        let v = RawValue::Number(44197.0);
        assert_eq!(coerce_date(Some(&v), today()), d(2021, 1, 1));
    }

    #[test]
    fn timestamps_map_back_to_serials() {
        let noon = d(2021, 1, 1).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(datetime_to_serial(noon), 44197.5);
        assert_eq!(serial_to_datetime(datetime_to_serial(noon)), Some(noon));
    }

    #[test]
    fn fractional_serial_drops_time_of_day() {
        // 44197.75 = 2021-01-01 18:00 UTC
        let v = RawValue::Number(44197.75);
        assert_eq!(coerce_date(Some(&v), today()), d(2021, 1, 1));
    }

    #[test]
    fn pre_1900_serials_are_unsupported() {
        for s in [0.0, 1.0, 60.0, -3.0, f64::NAN, f64::INFINITY] {
            assert_eq!(serial_to_date(s), None, "serial {s}");
            assert_eq!(coerce_date(Some(&RawValue::Number(s)), today()), today());
        }
        assert_eq!(serial_to_date(61.0), Some(d(1900, 3, 1)));
    }

    #[test]
    fn text_dates_with_and_without_time() {
        let cases = [
            ("2021-03-15", d(2021, 3, 15)),
            ("2021-03-15T08:30:00", d(2021, 3, 15)),
            ("2021-03-15T23:30:00-05:00", d(2021, 3, 16)),
            ("2021-03-15 10:00", d(2021, 3, 15)),
            ("03/15/2021", d(2021, 3, 15)),
            ("March 15, 2021", d(2021, 3, 15)),
            ("  2021/03/15  ", d(2021, 3, 15)),
        ];
        for (input, want) in cases {
            let v = RawValue::from(input);
            assert_eq!(coerce_date(Some(&v), today()), want, "input {input:?}");
        }
    }

    #[test]
    fn garbage_or_missing_dates_fall_back_to_today() {
        assert_eq!(coerce_date(None, today()), today());
        assert_eq!(coerce_date(Some(&RawValue::from("")), today()), today());
        assert_eq!(coerce_date(Some(&RawValue::from("not a date")), today()), today());
        assert_eq!(coerce_date(Some(&RawValue::Bool(true)), today()), today());
        assert_eq!(coerce_date(Some(&RawValue::from("2021-02-30")), today()), today());
    }

    #[test]
    fn typed_dates_pass_through() {
        let dt = d(2022, 7, 4).and_hms_opt(13, 0, 0).unwrap();
        assert_eq!(coerce_date(Some(&RawValue::DateTime(dt)), today()), d(2022, 7, 4));
    }

    #[test]
    fn integers_use_leading_digits() {
        assert_eq!(coerce_int(Some(&RawValue::from("42"))), 42);
        assert_eq!(coerce_int(Some(&RawValue::from("abc"))), 0);
        assert_eq!(coerce_int(None), 0);
        assert_eq!(coerce_int(Some(&RawValue::from(" 12 likes"))), 12);
        assert_eq!(coerce_int(Some(&RawValue::from("3.7"))), 3);
        assert_eq!(coerce_int(Some(&RawValue::from("-5"))), -5);
        assert_eq!(coerce_int(Some(&RawValue::Number(9.9))), 9);
        assert_eq!(coerce_int(Some(&RawValue::Bool(true))), 0);
        assert_eq!(parse_leading_int("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn text_is_trimmed_and_labels_are_not() {
        assert_eq!(coerce_text(Some(&RawValue::from("  hi there \n"))), "hi there");
        assert_eq!(coerce_text(Some(&RawValue::Number(7.0))), "7");
        assert_eq!(coerce_text(None), "");
        assert_eq!(coerce_label(Some(&RawValue::from(" Tiktok")), "Website"), " Tiktok");
        assert_eq!(coerce_label(None, "Website"), "Website");
        assert_eq!(coerce_label(Some(&RawValue::from("")), "Website"), "Website");
    }
}
