// src/ingest/providers/mod.rs
//! Row sources: each one performs a single I/O step (reading an uploaded
//! file, one HTTP GET) and hands back raw rows for the normalizer.

pub mod csv_text;
pub mod excel;
pub mod google_sheets;

use std::collections::{HashMap, HashSet};

use crate::ingest::error::ImportError;
use crate::ingest::types::RawRow;
use crate::ingest::BatchSource;

#[async_trait::async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError>;
    fn source(&self) -> BatchSource;
}

/// Make header names usable as map keys: blank headers become `__EMPTY`,
/// repeats get a numeric suffix (`Name`, `Name_1`, `Name_2`). A suffix that
/// collides with a name already emitted is skipped, so no column is lost.
pub(crate) fn unique_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    raw.into_iter()
        .map(|h| {
            let base = match h.as_ref() {
                "" => "__EMPTY".to_string(),
                other => other.to_string(),
            };
            let mut name = base.clone();
            while taken.contains(&name) {
                let n = next_suffix.entry(base.clone()).or_insert(0);
                *n += 1;
                name = format!("{base}_{n}");
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}
