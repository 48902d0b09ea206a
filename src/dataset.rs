//! The active dataset and its filter state.
//!
//! The dataset is replaced wholesale on each successful import, which also
//! resets filters. A failed import never reaches this module.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::Mention;
use crate::ingest::BatchSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Empty lists mean "no constraint". Matching is case-insensitive since the
/// categorical values are passed through from the source untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filters {
    pub sentiment: Vec<String>,
    pub channels: Vec<String>,
    pub categories: Vec<String>,
    pub date_range: DateRange,
}

impl Filters {
    pub fn is_active(&self) -> bool {
        !self.sentiment.is_empty()
            || !self.channels.is_empty()
            || !self.categories.is_empty()
            || self.date_range.start.is_some()
            || self.date_range.end.is_some()
    }

    pub fn matches(&self, m: &Mention) -> bool {
        any_of(&self.sentiment, &m.sentiment)
            && any_of(&self.channels, &m.channel)
            && any_of(&self.categories, &m.category)
            && self.in_range(&m.date)
    }

    fn in_range(&self, date: &str) -> bool {
        let DateRange { start, end } = &self.date_range;
        if start.is_none() && end.is_none() {
            return true;
        }
        let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            return false;
        };
        start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e)
    }
}

fn any_of(wanted: &[String], value: &str) -> bool {
    wanted.is_empty() || wanted.iter().any(|w| w.eq_ignore_ascii_case(value))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub total: usize,
    pub filtered: usize,
    pub filters_active: bool,
    pub source: Option<&'static str>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    mentions: Arc<Vec<Mention>>,
    filters: Filters,
    source: Option<BatchSource>,
    loaded_at: Option<DateTime<Utc>>,
}

/// Session-scoped holder of the active dataset.
#[derive(Debug, Default)]
pub struct DatasetStore {
    inner: RwLock<State>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly imported batch and reset filters.
    pub fn replace(&self, mentions: Vec<Mention>, source: BatchSource) {
        let count = mentions.len();
        let mut g = self.inner.write().expect("dataset rwlock poisoned");
        *g = State {
            mentions: Arc::new(mentions),
            filters: Filters::default(),
            source: Some(source),
            loaded_at: Some(Utc::now()),
        };
        tracing::info!(target: "dataset", source = source.as_str(), count, "dataset replaced");
    }

    /// Whole dataset, ignoring filters. Cheap: the batch is shared, not copied.
    pub fn all(&self) -> Arc<Vec<Mention>> {
        Arc::clone(&self.inner.read().expect("dataset rwlock poisoned").mentions)
    }

    pub fn filtered(&self) -> Vec<Mention> {
        let g = self.inner.read().expect("dataset rwlock poisoned");
        g.mentions
            .iter()
            .filter(|m| g.filters.matches(m))
            .cloned()
            .collect()
    }

    pub fn filters(&self) -> Filters {
        self.inner
            .read()
            .expect("dataset rwlock poisoned")
            .filters
            .clone()
    }

    pub fn set_filters(&self, filters: Filters) {
        self.inner.write().expect("dataset rwlock poisoned").filters = filters;
    }

    pub fn reset_filters(&self) {
        self.set_filters(Filters::default());
    }

    pub fn info(&self) -> DatasetInfo {
        let g = self.inner.read().expect("dataset rwlock poisoned");
        DatasetInfo {
            total: g.mentions.len(),
            filtered: g.mentions.iter().filter(|m| g.filters.matches(m)).count(),
            filters_active: g.filters.is_active(),
            source: g.source.map(BatchSource::as_str),
            loaded_at: g.loaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize_rows_at;
    use crate::ingest::types::{RawRow, RawValue};

    fn mention(date: &str, sentiment: &str, channel: &str) -> Mention {
        let mut row = RawRow::new();
        row.insert("date".into(), RawValue::from(date));
        row.insert("sentiment".into(), RawValue::from(sentiment));
        row.insert("Channel".into(), RawValue::from(channel));
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        normalize_rows_at(&[row], today).remove(0)
    }

    fn store() -> DatasetStore {
        let s = DatasetStore::new();
        s.replace(
            vec![
                mention("2021-06-01", "Positive", "Instagram"),
                mention("2021-06-05", "negative", "Twitter"),
                mention("2021-07-01", "Neutral", "Instagram"),
            ],
            BatchSource::Excel,
        );
        s
    }

    #[test]
    fn filters_combine_and_ignore_case() {
        let s = store();
        s.set_filters(Filters {
            sentiment: vec!["positive".into(), "NEGATIVE".into()],
            ..Default::default()
        });
        assert_eq!(s.filtered().len(), 2);

        s.set_filters(Filters {
            channels: vec!["instagram".into()],
            date_range: DateRange {
                start: NaiveDate::from_ymd_opt(2021, 6, 2),
                end: None,
            },
            ..Default::default()
        });
        let out = s.filtered();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, "2021-07-01");

        let info = s.info();
        assert_eq!((info.total, info.filtered, info.filters_active), (3, 1, true));
    }

    #[test]
    fn replace_resets_filters() {
        let s = store();
        s.set_filters(Filters {
            channels: vec!["Twitter".into()],
            ..Default::default()
        });
        s.replace(vec![mention("2022-01-01", "Neutral", "Website")], BatchSource::GoogleSheets);
        assert_eq!(s.filters(), Filters::default());
        assert_eq!(s.filtered().len(), 1);
        assert_eq!(s.info().source, Some("google_sheets"));
    }

    #[test]
    fn filters_use_camel_case_keys() {
        let f: Filters = serde_json::from_str(
            r#"{"sentiment":["Positive"],"dateRange":{"start":"2021-06-01","end":null}}"#,
        )
        .unwrap();
        assert_eq!(f.date_range.start, NaiveDate::from_ymd_opt(2021, 6, 1));
        assert!(f.channels.is_empty());

        let json = serde_json::to_value(&f).unwrap();
        assert!(json.get("dateRange").is_some());
        assert!(json.get("date_range").is_none());
        let info = serde_json::to_value(store().info()).unwrap();
        assert!(info.get("filtersActive").is_some());
    }
}
