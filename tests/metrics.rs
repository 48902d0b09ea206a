// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use social_listening::chat::MockChatProvider;
use social_listening::config::{ServerConfig, SettingsStore};
use social_listening::{create_router, AppState};

#[tokio::test]
async fn metrics_endpoint_contains_ingest_series() {
    let dir = TempDir::new().unwrap();
    let cfg = ServerConfig {
        settings_path: dir.path().join("settings.json"),
        ..ServerConfig::default()
    };
    let store = SettingsStore::load(cfg.settings_path.clone());
    let state = AppState::with_provider(&cfg, store, Arc::new(MockChatProvider::replying("ok")))
        .expect("state");
    let app = create_router(state);

    // A rejected upload still counts as a batch error.
    let req = Request::builder()
        .method("POST")
        .uri("/import/excel?filename=notes.txt")
        .body(Body::from("hello"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(
        text.contains("ingest_batch_errors_total"),
        "missing ingest series in:\n{text}"
    );
    assert!(text.contains("source=\"excel\""));
}
