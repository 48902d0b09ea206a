// src/ingest/providers/google_sheets.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Url};

use crate::config::settings::GoogleSheetsSettings;
use crate::ingest::error::ImportError;
use crate::ingest::providers::csv_text::parse_csv_rows;
use crate::ingest::providers::RowSource;
use crate::ingest::types::RawRow;
use crate::ingest::BatchSource;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://docs.google.com";

/// Fetches the CSV export of a public Google Sheet.
#[derive(Debug, Clone)]
pub struct GoogleSheetsSource {
    client: Client,
    base_url: Url,
}

impl GoogleSheetsSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid Google Sheets base url {base_url:?}"))?;
        let client = Client::builder()
            .user_agent(concat!("social-listening-dashboard/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building Google Sheets http client")?;
        Ok(Self { client, base_url })
    }

    /// Export URL for the configured sheet: by tab `gid` when set, otherwise
    /// by sheet name, otherwise the first tab.
    pub fn export_url(&self, sheet: &GoogleSheetsSettings) -> Result<Url, ImportError> {
        let id = sheet.sheet_id.trim();
        if id.is_empty() {
            return Err(ImportError::MissingSheetId);
        }
        let gid = sheet.gid.trim();
        let name = sheet.sheet_name.trim();

        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ImportError::Network("base url cannot carry a path".into()))?;
            path.pop_if_empty().extend(["spreadsheets", "d", id]);
            if gid.is_empty() && !name.is_empty() {
                path.extend(["gviz", "tq"]);
            } else {
                path.push("export");
            }
        }
        {
            let mut q = url.query_pairs_mut();
            if !gid.is_empty() {
                q.append_pair("format", "csv").append_pair("gid", gid);
            } else if !name.is_empty() {
                q.append_pair("tqx", "out:csv").append_pair("sheet", name);
            } else {
                q.append_pair("format", "csv");
            }
        }
        Ok(url)
    }

    /// One GET of the CSV export. Non-OK status and blank bodies are batch errors.
    pub async fn fetch_csv(&self, sheet: &GoogleSheetsSettings) -> Result<String, ImportError> {
        let url = self.export_url(sheet)?;
        tracing::info!(target: "ingest", url = %url, "fetching google sheet export");

        let resp = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ImportError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ImportError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ImportError::Network(e.to_string()))?;
        if body.trim().is_empty() {
            return Err(ImportError::EmptyPayload);
        }
        Ok(body)
    }

    pub async fn fetch_rows(&self, sheet: &GoogleSheetsSettings) -> Result<Vec<RawRow>, ImportError> {
        let body = self.fetch_csv(sheet).await?;
        parse_csv_rows(&body)
    }

    /// Bind sheet coordinates for a single import.
    pub fn import_for<'a>(&'a self, sheet: &'a GoogleSheetsSettings) -> GoogleSheetImport<'a> {
        GoogleSheetImport {
            source: self,
            sheet,
        }
    }
}

pub struct GoogleSheetImport<'a> {
    source: &'a GoogleSheetsSource,
    sheet: &'a GoogleSheetsSettings,
}

#[async_trait]
impl RowSource for GoogleSheetImport<'_> {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError> {
        self.source.fetch_rows(self.sheet).await
    }

    fn source(&self) -> BatchSource {
        BatchSource::GoogleSheets
    }
}
