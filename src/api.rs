use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shuttle_axum::axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Query, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::chat::{Assistant, ChatError, ChatMessage, ChatProvider, ChatSession, OpenAiChatProvider};
use crate::config::settings::{AppSettings, SettingsPatch};
use crate::config::{ServerConfig, SettingsStore};
use crate::dataset::{DatasetInfo, DatasetStore, Filters};
use crate::ingest::error::ImportError;
use crate::ingest::providers::excel::{validate_upload, ExcelUpload};
use crate::ingest::providers::google_sheets::GoogleSheetsSource;
use crate::ingest::schema::known_columns;
use crate::ingest::types::Mention;
use crate::ingest::{run_import, BatchSource};
use crate::metrics::Metrics;
use crate::summary::{self, View, ViewSummary};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub dataset: Arc<DatasetStore>,
    pub assistant: Arc<Assistant>,
    pub sheets: Arc<GoogleSheetsSource>,
    pub max_upload_bytes: usize,
    pub metrics: Metrics,
}

impl AppState {
    /// Production wiring: settings from disk, hosted chat provider.
    pub fn from_config(cfg: &ServerConfig) -> Result<Self> {
        let provider = OpenAiChatProvider::new(&cfg.chat_completions_url)?;
        Self::with_provider(
            cfg,
            SettingsStore::load(cfg.settings_path.clone()),
            Arc::new(provider),
        )
    }

    pub fn with_provider(
        cfg: &ServerConfig,
        settings: SettingsStore,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        Ok(Self {
            settings: Arc::new(settings),
            dataset: Arc::new(DatasetStore::new()),
            assistant: Arc::new(Assistant::new(provider)),
            sheets: Arc::new(GoogleSheetsSource::new(&cfg.sheets_base_url)?),
            max_upload_bytes: cfg.max_upload_bytes,
            metrics: Metrics::init(),
        })
    }

    fn commit(&self, mentions: Vec<Mention>, source: BatchSource) -> ImportSummary {
        let rows = mentions.len();
        self.dataset.replace(mentions, source);
        let info = self.dataset.info();
        ImportSummary {
            source: source.as_str(),
            rows,
            loaded_at: info.loaded_at,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;
    let metrics = state.metrics.clone();

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/settings", get(get_settings).put(put_settings))
        .route(
            "/import/excel",
            post(import_excel).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/import/google-sheets", post(import_google_sheets))
        .route("/import/columns", get(supported_columns))
        .route("/mentions", get(list_mentions))
        .route(
            "/filters",
            get(get_filters).put(put_filters).delete(reset_filters),
        )
        .route("/summary", get(get_summary))
        .route("/chat", get(get_chat).post(post_chat).delete(clear_chat))
        .route("/chat/toggle", post(toggle_chat))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
        .merge(metrics.router())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ---- errors ----

#[derive(Debug)]
pub enum ApiError {
    Import(ImportError),
    Chat(ChatError),
    Body(BytesRejection),
    Settings(anyhow::Error),
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        ApiError::Import(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Chat(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Import(e) => match e {
                ImportError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ImportError::UnsupportedFileType { .. } | ImportError::MissingSheetId => {
                    StatusCode::BAD_REQUEST
                }
                ImportError::EmptyWorkbook
                | ImportError::Workbook(_)
                | ImportError::Csv(_)
                | ImportError::NoRows => StatusCode::UNPROCESSABLE_ENTITY,
                ImportError::HttpStatus { .. }
                | ImportError::Network(_)
                | ImportError::EmptyPayload => StatusCode::BAD_GATEWAY,
            },
            ApiError::Chat(e) => match e {
                ChatError::MissingApiKey | ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
                ChatError::Api(_) | ChatError::Connection(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Import(e) => {
                if e.is_client_error() {
                    tracing::info!(target: "api", error = %e, "import refused");
                } else {
                    tracing::warn!(target: "api", error = %e, "import failed upstream");
                }
                e.to_string()
            }
            ApiError::Chat(e) => e.to_string(),
            ApiError::Body(rejection) => rejection.body_text(),
            ApiError::Settings(e) => {
                tracing::error!(target: "api", error = ?e, "settings not persisted");
                format!("Failed to save settings: {e}")
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---- settings ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    #[serde(flatten)]
    settings: AppSettings,
    api_key_set: bool,
    api_key_valid: bool,
}

impl SettingsView {
    fn of(s: &AppSettings) -> Self {
        Self {
            settings: s.redacted(),
            api_key_set: s.ai_settings.resolved_api_key().is_some(),
            api_key_valid: s.ai_settings.is_api_key_valid(),
        }
    }
}

async fn get_settings(State(state): State<AppState>) -> Json<SettingsView> {
    Json(SettingsView::of(&state.settings.get()))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SettingsView>, ApiError> {
    let updated = state.settings.update(patch).map_err(ApiError::Settings)?;
    Ok(Json(SettingsView::of(&updated)))
}

// ---- imports ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub source: &'static str,
    pub rows: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct UploadQuery {
    #[serde(default)]
    filename: String,
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

async fn import_excel(
    State(state): State<AppState>,
    Query(q): Query<UploadQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ImportSummary>, ApiError> {
    let cap = state.max_upload_bytes;
    // File type first, whether or not the body fit under the cap.
    validate_upload(&q.filename, 0, cap)?;
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let size = declared_length(&headers).unwrap_or(cap.saturating_add(1));
            return Err(ImportError::TooLarge { size, limit: cap }.into());
        }
        Err(rejection) => return Err(ApiError::Body(rejection)),
    };
    let upload = ExcelUpload::new(q.filename, body, cap);
    let mentions = run_import(&upload, today()).await?;
    Ok(Json(state.commit(mentions, BatchSource::Excel)))
}

async fn import_google_sheets(
    State(state): State<AppState>,
) -> Result<Json<ImportSummary>, ApiError> {
    let sheet = state.settings.get().google_sheets_settings;
    let import = state.sheets.import_for(&sheet);
    let mentions = run_import(&import, today()).await?;
    Ok(Json(state.commit(mentions, BatchSource::GoogleSheets)))
}

/// Source column names the importer understands, for the upload form.
async fn supported_columns() -> Json<Vec<&'static str>> {
    Json(known_columns())
}

// ---- dataset ----

#[derive(Serialize)]
struct MentionsResp {
    info: DatasetInfo,
    mentions: Vec<Mention>,
}

async fn list_mentions(State(state): State<AppState>) -> Json<MentionsResp> {
    Json(MentionsResp {
        info: state.dataset.info(),
        mentions: state.dataset.filtered(),
    })
}

async fn get_filters(State(state): State<AppState>) -> Json<Filters> {
    Json(state.dataset.filters())
}

async fn put_filters(
    State(state): State<AppState>,
    Json(filters): Json<Filters>,
) -> Json<DatasetInfo> {
    state.dataset.set_filters(filters);
    Json(state.dataset.info())
}

async fn reset_filters(State(state): State<AppState>) -> Json<DatasetInfo> {
    state.dataset.reset_filters();
    Json(state.dataset.info())
}

#[derive(Deserialize)]
struct SummaryQuery {
    #[serde(default)]
    view: View,
}

async fn get_summary(
    State(state): State<AppState>,
    Query(q): Query<SummaryQuery>,
) -> Json<ViewSummary> {
    Json(summary::summarize(q.view, &state.dataset.filtered()))
}

// ---- chat ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    message: String,
    /// Caller-supplied context wins over `include_context`.
    #[serde(default)]
    context: Option<Value>,
    #[serde(default)]
    include_context: bool,
}

#[derive(Serialize)]
struct ChatResp {
    reply: ChatMessage,
    session: ChatSession,
}

/// What the assistant gets to see of the dashboard: the overview aggregates
/// over the filtered data plus the active filters. Never the raw mentions.
fn dashboard_context(state: &AppState) -> Value {
    let filtered = state.dataset.filtered();
    json!({
        "dataset": state.dataset.info(),
        "filters": state.dataset.filters(),
        "overview": summary::overview(&filtered),
    })
}

async fn get_chat(State(state): State<AppState>) -> Json<ChatSession> {
    Json(state.assistant.session())
}

async fn clear_chat(State(state): State<AppState>) -> Json<ChatSession> {
    state.assistant.clear();
    Json(state.assistant.session())
}

async fn toggle_chat(State(state): State<AppState>) -> Json<Value> {
    let is_open = state.assistant.toggle();
    Json(json!({ "isOpen": is_open }))
}

async fn post_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResp>, ApiError> {
    let context = match body.context {
        Some(ctx) => Some(ctx),
        None if body.include_context => Some(dashboard_context(&state)),
        None => None,
    };
    let ai = state.settings.get().ai_settings;
    let reply = state
        .assistant
        .send_message(&ai, &body.message, context.as_ref())
        .await?;
    Ok(Json(ChatResp {
        reply,
        session: state.assistant.session(),
    }))
}
