//! Health, readiness, OpenAPI and metrics endpoints

use super::{build_test_router, get_json, TestAppState};
use axum::http::StatusCode;

#[tokio::test]
async fn test_health_check() {
    let app = build_test_router(TestAppState::new());

    let (status, body) = get_json(&app, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "healthy");
}

#[tokio::test]
async fn test_ready_when_backend_answers() {
    let app = build_test_router(TestAppState::new());

    let (status, _) = get_json(&app, "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = build_test_router(TestAppState::new());

    let (status, body) = get_json(&app, "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    let doc = body.unwrap();
    assert!(doc["paths"]["/api/v1/budget-items"].is_object());
}

#[tokio::test]
async fn test_metrics_not_found_when_disabled() {
    let app = build_test_router(TestAppState::new());

    let (status, _) = get_json(&app, "/metrics", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
