// tests/ingest_normalize.rs
use chrono::NaiveDate;
use social_listening::ingest::error::ImportError;
use social_listening::ingest::{import_batch, normalize_rows_at, BatchSource};
use social_listening::{RawRow, RawValue};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
}

fn row(pairs: &[(&str, RawValue)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn one(pairs: &[(&str, RawValue)]) -> social_listening::Mention {
    normalize_rows_at(&[row(pairs)], today()).remove(0)
}

#[test]
fn instagram_row_end_to_end() {
    let m = one(&[
        ("Date", "2021-06-01".into()),
        ("Content", "Great product".into()),
        ("Sentiment", "positive".into()),
        ("Channel", "Instagram".into()),
        ("Shares", "5".into()),
    ]);
    assert_eq!(m.id, 1);
    assert_eq!(m.date, "2021-06-01");
    assert_eq!(m.content, "Great product");
    // Labels pass through untouched.
    assert_eq!(m.sentiment, "positive");
    assert_eq!(m.channel, "Instagram");
    assert_eq!(m.shares, 5);
    assert_eq!((m.comments, m.reactions, m.total_engagement), (0, 0, 0));
    assert_eq!(m.category, "Business Branding");
}

#[test]
fn first_alias_wins() {
    let m = one(&[
        ("sentiment", "Negative".into()),
        ("Sentiment", "Positive".into()),
        ("Category", "Product".into()),
        ("category", "Other".into()),
    ]);
    assert_eq!(m.sentiment, "Negative");
    assert_eq!(m.category, "Product");
}

#[test]
fn blank_first_alias_falls_through() {
    let m = one(&[("content", "".into()), ("Content", "from second".into())]);
    assert_eq!(m.content, "from second");
}

#[test]
fn zero_counts_as_present() {
    let m = one(&[("Share", 0_i64.into()), ("Shares", 9_i64.into())]);
    assert_eq!(m.shares, 0);
}

#[test]
fn serial_date_converts() {
    let m = one(&[("date", RawValue::Number(44197.0))]);
    assert_eq!(m.date, "2021-01-01");
}

#[test]
fn unparseable_and_missing_dates_use_processing_date() {
    assert_eq!(one(&[("date", "not a date".into())]).date, "2024-05-17");
    assert_eq!(one(&[]).date, "2024-05-17");
    // Serials in the 1900 leap-year-bug range are not trusted.
    assert_eq!(one(&[("date", RawValue::Number(12.0))]).date, "2024-05-17");
}

#[test]
fn text_dates_in_common_shapes() {
    assert_eq!(one(&[("date", "2021-03-15".into())]).date, "2021-03-15");
    assert_eq!(
        one(&[("Date", "2021-03-15T10:20:00Z".into())]).date,
        "2021-03-15"
    );
}

#[test]
fn integers_are_lenient() {
    assert_eq!(one(&[("Comments", "42".into())]).comments, 42);
    assert_eq!(one(&[("Comments", "abc".into())]).comments, 0);
    assert_eq!(one(&[("Comments", "12 likes".into())]).comments, 12);
    assert_eq!(one(&[("Reactions", RawValue::Number(7.9))]).reactions, 7);
    assert_eq!(one(&[]).reactions, 0);
}

#[test]
fn ids_and_order_follow_input() {
    let rows: Vec<RawRow> = (0..5)
        .map(|i| row(&[("content", format!("post {i}").into())]))
        .collect();
    let out = normalize_rows_at(&rows, today());
    assert_eq!(out.len(), 5);
    for (i, m) in out.iter().enumerate() {
        assert_eq!(m.id, i as u64 + 1);
        assert_eq!(m.content, format!("post {i}"));
    }
}

#[test]
fn empty_batch_never_reaches_the_normalizer() {
    let err = import_batch(BatchSource::Excel, Vec::new(), today()).unwrap_err();
    assert!(matches!(err, ImportError::EmptyWorkbook));
    assert_eq!(err.to_string(), "The Excel file is empty.");

    let err = import_batch(BatchSource::GoogleSheets, Vec::new(), today()).unwrap_err();
    assert_eq!(err.to_string(), "No data rows found in Google Sheets");
}
