// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod chat;
pub mod config;
pub mod dataset;
pub mod ingest;
pub mod metrics;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::ingest::types::{Mention, RawRow, RawValue};
pub use crate::ingest::{normalize_rows, normalize_rows_at};

use shuttle_axum::axum::Router;
use tracing::info;

/// Build the full application from on-disk/env configuration.
///
/// ```ignore
/// let router = social_listening::app().await?;
/// ```
pub async fn app() -> anyhow::Result<Router> {
    let cfg = config::ServerConfig::load_default()?;
    let state = AppState::from_config(&cfg)?;
    info!(
        target: "api",
        settings = %cfg.settings_path.display(),
        sheets = %cfg.sheets_base_url,
        max_upload_bytes = cfg.max_upload_bytes,
        "dashboard configured"
    );
    Ok(create_router(state))
}
