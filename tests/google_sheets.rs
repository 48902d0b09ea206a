// tests/google_sheets.rs
//
// Google Sheets import against a local stand-in for the CSV export endpoint.
// The dashboard router is driven in-process; only the "sheet" listens on a socket.

use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, routing::get, Router};
use serde_json::Value;
use shuttle_axum::axum::body::{self, Body};
use shuttle_axum::axum::http::Request;
use tempfile::TempDir;
use tower::ServiceExt as _;

use social_listening::chat::MockChatProvider;
use social_listening::config::settings::{AppSettings, GoogleSheetsSettings};
use social_listening::config::{ServerConfig, SettingsStore};
use social_listening::ingest::providers::google_sheets::GoogleSheetsSource;
use social_listening::ingest::{run_import, BatchSource};
use social_listening::{create_router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

const SHEET_CSV: &str = "\u{feff}Date,Content,Sentiment,Channel,Shares,Total Engagement\n\
2021-06-01,Great product,positive,Instagram,5,12\n\
,,,,,\n\
\n\
2021-06-02T08:00:00Z,\"Late, but fine\",Neutral,Twitter,,3\n";

async fn export(Path(id): Path<String>) -> (StatusCode, String) {
    match id.as_str() {
        "public" => (StatusCode::OK, SHEET_CSV.to_string()),
        "blank" => (StatusCode::OK, "   \n".to_string()),
        "headers-only" => (StatusCode::OK, "Date,Content\n".to_string()),
        _ => (StatusCode::UNAUTHORIZED, "login required".to_string()),
    }
}

/// Serve the fake export endpoint on an ephemeral port; returns its base url.
async fn spawn_sheet_server() -> String {
    let app = Router::new().route("/spreadsheets/d/{id}/export", get(export));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local sheet server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("sheet server");
    });
    format!("http://{addr}/")
}

fn sheet(id: &str) -> GoogleSheetsSettings {
    GoogleSheetsSettings {
        sheet_id: id.into(),
        sheet_name: String::new(),
        gid: "0".into(),
    }
}

fn today() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[tokio::test]
async fn public_sheet_imports_typed_rows() {
    let base = spawn_sheet_server().await;
    let src = GoogleSheetsSource::new(&base).unwrap();
    let s = sheet("public");
    let import = src.import_for(&s);

    let mentions = run_import(&import, today()).await.expect("import ok");
    assert_eq!(mentions.len(), 3, "blank line is skipped, empty fields are a row");

    let first = &mentions[0];
    assert_eq!(first.date, "2021-06-01");
    assert_eq!(first.sentiment, "positive");
    assert_eq!(first.shares, 5);
    assert_eq!(first.total_engagement, 12);

    let defaulted = &mentions[1];
    assert_eq!(defaulted.id, 2);
    assert_eq!(defaulted.date, "2024-01-01");
    assert_eq!(defaulted.content, "");
    assert_eq!(defaulted.total_engagement, 0);

    let third = &mentions[2];
    assert_eq!(third.id, 3);
    assert_eq!(third.date, "2021-06-02");
    assert_eq!(third.content, "Late, but fine");
    assert_eq!(third.shares, 0);
}

#[tokio::test]
async fn upstream_failures_are_batch_errors() {
    let base = spawn_sheet_server().await;
    let src = GoogleSheetsSource::new(&base).unwrap();

    let private = sheet("private");
    let err = run_import(&src.import_for(&private), today())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "HTTP error! status: 401. Sheet may not be public or URL is incorrect."
    );

    let blank = sheet("blank");
    let err = run_import(&src.import_for(&blank), today())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No data received from Google Sheets");

    let headers_only = sheet("headers-only");
    let err = run_import(&src.import_for(&headers_only), today())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No data rows found in Google Sheets");
}

#[tokio::test]
async fn import_route_replaces_dataset_and_failure_keeps_it() {
    let base = spawn_sheet_server().await;
    let dir = TempDir::new().unwrap();
    let cfg = ServerConfig {
        settings_path: dir.path().join("settings.json"),
        sheets_base_url: base,
        ..ServerConfig::default()
    };
    let settings = AppSettings {
        google_sheets_settings: sheet("public"),
        ..AppSettings::default()
    };
    let store = SettingsStore::with_settings(cfg.settings_path.clone(), settings);
    let state = AppState::with_provider(&cfg, store, Arc::new(MockChatProvider::replying("ok")))
        .expect("state");
    let app = create_router(state.clone());

    let req = Request::post("/import/google-sheets")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["source"], BatchSource::GoogleSheets.as_str());
    assert_eq!(v["rows"], 3);
    assert_eq!(state.dataset.all().len(), 3);

    // Point at a private sheet: the import fails, the dataset stays.
    state
        .settings
        .update(
            serde_json::from_value(serde_json::json!({
                "googleSheetsSettings": { "sheetId": "private" }
            }))
            .unwrap(),
        )
        .expect("settings saved");
    let req = Request::post("/import/google-sheets")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status().as_u16(), 502);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(v["error"].as_str().unwrap().contains("status: 401"));
    assert_eq!(state.dataset.all().len(), 3);
}
