use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use scholaris_server::{api::app_router, build_state, config::Config};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

async fn test_app() -> (Router, TempDir) {
    let tmp = tempdir().unwrap();
    let config = Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        db_path: tmp.path().join("test.db").to_string_lossy().into_owned(),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(30),
        log_format: "text".to_string(),
        probe_timeout_ms: Some(5_000),
    };
    let state = build_state(&config).await.unwrap();
    (app_router(state, &config), tmp)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn healthz_works() {
    let (app, _tmp) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn run_is_persisted_and_listed() {
    let (app, _tmp) = test_app().await;

    let (status, outcome) = send(
        &app,
        "POST",
        "/api/v1/health/run",
        Some(json!({ "triggeredBy": "registrar" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], json!(true));
    assert_eq!(outcome["results"].as_object().unwrap().len(), 4);
    let run_id = outcome["runId"].as_str().unwrap().to_string();

    let (status, runs) = send(&app, "GET", "/api/v1/health/runs?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["id"], json!(run_id));
    assert_eq!(runs[0]["checkedBy"], json!("registrar"));

    let (status, run) = send(&app, "GET", &format!("/api/v1/health/runs/{}", run_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["totalIssues"], outcome["summary"]["totalIssues"]);
}

#[tokio::test]
async fn missing_run_is_not_found() {
    let (app, _tmp) = test_app().await;
    let (status, body) = send(&app, "GET", "/api/v1/health/runs/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn blank_trigger_is_rejected() {
    let (app, _tmp) = test_app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/health/run",
        Some(json!({ "triggeredBy": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, runs) = send(&app, "GET", "/api/v1/health/runs", None).await;
    assert!(runs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn trigger_is_stored_verbatim() {
    let (app, _tmp) = test_app().await;
    let (status, outcome) = send(
        &app,
        "POST",
        "/api/v1/health/run",
        Some(json!({ "triggeredBy": "  registrar " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let run_id = outcome["runId"].as_str().unwrap();
    let (_, run) = send(&app, "GET", &format!("/api/v1/health/runs/{}", run_id), None).await;
    assert_eq!(run["checkedBy"], json!("  registrar "));
}

#[tokio::test]
async fn config_round_trips_and_validates() {
    let (app, _tmp) = test_app().await;

    let (status, config) = send(&app, "GET", "/api/v1/health/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["probeTimeoutMs"], json!(5_000));

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/health/config",
        Some(json!({ "probeTimeoutMs": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send(
        &app,
        "PUT",
        "/api/v1/health/config",
        Some(json!({ "probeTimeoutMs": 2_000, "staleAfterDays": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["probeTimeoutMs"], json!(2_000));
    assert_eq!(updated["staleAfterDays"], json!(30));
    assert_eq!(updated["orphanSampleLimit"], json!(200));
}
