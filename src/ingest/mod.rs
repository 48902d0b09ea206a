// src/ingest/mod.rs
pub mod coerce;
pub mod error;
pub mod providers;
pub mod schema;
pub mod types;

use chrono::{NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::coerce::{coerce_date_string, coerce_int, coerce_label, coerce_text};
use crate::ingest::error::ImportError;
use crate::ingest::providers::RowSource;
use crate::ingest::schema::{Coercion, Field, MENTION_SCHEMA};
use crate::ingest::types::{Mention, RawRow};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_batches_total", "Import batches normalized.");
        describe_counter!("ingest_rows_total", "Raw rows normalized into mentions.");
        describe_counter!(
            "ingest_batch_errors_total",
            "Import batches rejected before normalization."
        );
        describe_counter!(
            "ingest_unsupported_dates_total",
            "Spreadsheet serial dates outside the supported range."
        );
        describe_histogram!("ingest_normalize_ms", "Batch normalization time in milliseconds.");
    });
}

/// Where a batch came from; only used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSource {
    Excel,
    GoogleSheets,
}

impl BatchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchSource::Excel => "excel",
            BatchSource::GoogleSheets => "google_sheets",
        }
    }
}

/// Value produced by one schema entry before it is slotted into a [`Mention`].
enum Resolved {
    Text(String),
    Int(i64),
}

impl Resolved {
    fn into_text(self) -> String {
        match self {
            Resolved::Text(s) => s,
            Resolved::Int(n) => n.to_string(),
        }
    }

    fn into_int(self) -> i64 {
        match self {
            Resolved::Int(n) => n,
            Resolved::Text(_) => 0,
        }
    }
}

/// Normalize one raw row into a mention with the given 1-based `id`.
/// `today` is the processing date used as the date fallback.
pub fn normalize_row(id: u64, row: &RawRow, today: NaiveDate) -> Mention {
    let mut m = Mention {
        id,
        date: String::new(),
        content: String::new(),
        sentiment: String::new(),
        channel: String::new(),
        content_type: String::new(),
        total_engagement: 0,
        username: String::new(),
        category: String::new(),
        sub_category: String::new(),
        type_of_speaker: String::new(),
        comments: 0,
        reactions: 0,
        shares: 0,
    };

    for spec in MENTION_SCHEMA {
        let raw = spec.resolve(row);
        let value = match spec.coercion {
            Coercion::Date => Resolved::Text(coerce_date_string(raw, today)),
            Coercion::Text => Resolved::Text(coerce_text(raw)),
            Coercion::Label => Resolved::Text(coerce_label(raw, spec.default)),
            Coercion::Integer => Resolved::Int(coerce_int(raw)),
        };
        match spec.field {
            Field::Date => m.date = value.into_text(),
            Field::Content => m.content = value.into_text(),
            Field::Sentiment => m.sentiment = value.into_text(),
            Field::Channel => m.channel = value.into_text(),
            Field::ContentType => m.content_type = value.into_text(),
            Field::TotalEngagement => m.total_engagement = value.into_int(),
            Field::Username => m.username = value.into_text(),
            Field::Category => m.category = value.into_text(),
            Field::SubCategory => m.sub_category = value.into_text(),
            Field::TypeOfSpeaker => m.type_of_speaker = value.into_text(),
            Field::Comments => m.comments = value.into_int(),
            Field::Reactions => m.reactions = value.into_int(),
            Field::Shares => m.shares = value.into_int(),
        }
    }
    m
}

/// Normalize a batch against an explicit processing date.
/// Output length and order match the input; ids run `1..=N`.
pub fn normalize_rows_at(rows: &[RawRow], today: NaiveDate) -> Vec<Mention> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| normalize_row(i as u64 + 1, row, today))
        .collect()
}

/// Normalize a batch using today's UTC date as the processing date.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<Mention> {
    normalize_rows_at(rows, Utc::now().date_naive())
}

/// Batch entry point shared by every import path: rejects an empty batch
/// before the normalizer runs, then normalizes the whole batch in one pass.
pub fn import_batch(
    source: BatchSource,
    rows: Vec<RawRow>,
    today: NaiveDate,
) -> Result<Vec<Mention>, ImportError> {
    ensure_metrics_described();

    if rows.is_empty() {
        counter!("ingest_batch_errors_total", "source" => source.as_str()).increment(1);
        return Err(match source {
            BatchSource::Excel => ImportError::EmptyWorkbook,
            BatchSource::GoogleSheets => ImportError::NoRows,
        });
    }

    let t0 = std::time::Instant::now();
    let mentions = normalize_rows_at(&rows, today);
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;

    histogram!("ingest_normalize_ms").record(ms);
    counter!("ingest_batches_total", "source" => source.as_str()).increment(1);
    counter!("ingest_rows_total").increment(mentions.len() as u64);

    tracing::info!(
        target: "ingest",
        source = source.as_str(),
        rows = mentions.len(),
        elapsed_ms = ms,
        "batch normalized"
    );
    Ok(mentions)
}

/// Record a batch that failed before normalization (decode, HTTP, validation).
pub fn record_batch_error(source: BatchSource, err: &ImportError) {
    ensure_metrics_described();
    counter!("ingest_batch_errors_total", "source" => source.as_str()).increment(1);
    tracing::warn!(target: "ingest", source = source.as_str(), error = %err, "import rejected");
}

/// Run one import: a single fetch/decode from `provider`, then the batch
/// normalizer. Either the whole batch comes back or an error does.
pub async fn run_import(
    provider: &dyn RowSource,
    today: NaiveDate,
) -> Result<Vec<Mention>, ImportError> {
    let source = provider.source();
    let rows = match provider.fetch_rows().await {
        Ok(rows) => rows,
        Err(e) => {
            record_batch_error(source, &e);
            return Err(e);
        }
    };
    import_batch(source, rows, today).inspect_err(|e| {
        tracing::warn!(target: "ingest", source = source.as_str(), error = %e, "import rejected");
    })
}
