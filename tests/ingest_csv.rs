// tests/ingest_csv.rs
use chrono::NaiveDate;
use social_listening::ingest::providers::csv_text::parse_csv_rows;
use social_listening::ingest::{import_batch, BatchSource};
use social_listening::RawValue;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
}

#[test]
fn export_with_mixed_headers_normalizes() {
    let csv = "date,Content Type,Sub Category,Type of Speaker,Comment,Reaction,Share,user\n\
               03/15/2021,Video,Retail,Influencer,3,14,2,@shop\n\
               garbage,,,,x,1.9,-4,\n";
    let rows = parse_csv_rows(csv).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("Comment"), Some(&RawValue::Number(3.0)));

    let out = import_batch(BatchSource::GoogleSheets, rows, today()).unwrap();
    let a = &out[0];
    assert_eq!(a.date, "2021-03-15");
    assert_eq!(a.content_type, "Video");
    assert_eq!(a.sub_category, "Retail");
    assert_eq!(a.type_of_speaker, "Influencer");
    assert_eq!((a.comments, a.reactions, a.shares), (3, 14, 2));
    assert_eq!(a.username, "@shop");

    let b = &out[1];
    assert_eq!(b.date, "2024-02-29");
    assert_eq!(b.content_type, "Post");
    assert_eq!(b.sub_category, "Corporate");
    assert_eq!((b.comments, b.reactions, b.shares), (0, 1, -4));
    assert_eq!(b.username, "");
}

#[test]
fn duplicate_headers_do_not_clobber() {
    let rows = parse_csv_rows("Content,Content\nfirst,second\n").unwrap();
    assert_eq!(rows[0].get("Content"), Some(&RawValue::from("first")));
    assert_eq!(rows[0].get("Content_1"), Some(&RawValue::from("second")));
}

#[test]
fn short_rows_are_tolerated() {
    let rows = parse_csv_rows("Date,Content,Shares\n2021-01-01\n").unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].get("Shares").is_none());

    let out = import_batch(BatchSource::GoogleSheets, rows, today()).unwrap();
    assert_eq!(out[0].shares, 0);
    assert_eq!(out[0].date, "2021-01-01");
}
