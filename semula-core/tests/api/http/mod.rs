//! HTTP API Handler Tests Infrastructure
//!
//! Key components:
//! - `TestAppState` - in-memory AppState implementing `HasServices`
//! - Uses production `build_router()` so the real handlers in `src/api/*.rs` run
//! - Request helpers returning the status and the JSON body

pub mod budget_http_test;
pub mod system_http_test;

use crate::api::{TestAuthBackend, TestBudgetItemRepository, TestProfileStore};
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    Router,
};
use semula_core::config::{BackendConfig, Config, CorsConfig, TelemetryConfig};
use semula_core::domain::Role;
use semula_core::server::build_router;
use semula_core::service::BudgetService;
use semula_core::state::HasServices;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Test Configuration
// ============================================================================

pub fn create_test_config() -> Config {
    Config {
        http_host: "127.0.0.1".to_string(),
        http_port: 8080,
        backend: BackendConfig {
            url: "http://backend.test".to_string(),
            anon_key: "anon-key".to_string(),
            timeout_secs: 5,
            budget_items_table: "budget_items".to_string(),
            profiles_table: "profiles".to_string(),
        },
        cors: CorsConfig::default(),
        telemetry: TelemetryConfig::default(),
    }
}

// ============================================================================
// Test AppState
// ============================================================================

#[derive(Clone)]
pub struct TestAppState {
    pub config: Arc<Config>,
    pub auth: Arc<TestAuthBackend>,
    pub profiles: Arc<TestProfileStore>,
    pub budget_service: Arc<BudgetService<TestBudgetItemRepository>>,
    // Raw repository for test setup
    pub budget_repo: Arc<TestBudgetItemRepository>,
}

impl TestAppState {
    pub fn new() -> Self {
        let budget_repo = Arc::new(TestBudgetItemRepository::new());
        Self {
            config: Arc::new(create_test_config()),
            auth: Arc::new(TestAuthBackend::new()),
            profiles: Arc::new(TestProfileStore::new()),
            budget_service: Arc::new(BudgetService::new(budget_repo.clone())),
            budget_repo,
        }
    }

    /// Register a signed-in user; returns `(user_id, access_token)`.
    /// `role: None` leaves the user without a profile row.
    pub async fn sign_in_as(&self, role: Option<Role>) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let token = format!("token-{}", user_id);
        self.auth.add_token(&token, user_id).await;
        if let Some(role) = role {
            self.profiles.add_profile(user_id, role).await;
        }
        (user_id, token)
    }
}

impl Default for TestAppState {
    fn default() -> Self {
        Self::new()
    }
}

impl HasServices for TestAppState {
    type Auth = TestAuthBackend;
    type Profiles = TestProfileStore;
    type BudgetRepo = TestBudgetItemRepository;

    fn config(&self) -> &Config {
        &self.config
    }

    fn auth_backend(&self) -> &Self::Auth {
        &self.auth
    }

    fn profile_store(&self) -> &Self::Profiles {
        &self.profiles
    }

    fn budget_service(&self) -> &BudgetService<Self::BudgetRepo> {
        &self.budget_service
    }
}

// ============================================================================
// Test Router Builder
// ============================================================================

pub fn build_test_router(state: TestAppState) -> Router {
    build_router(state, None)
}

// ============================================================================
// HTTP Test Helpers
// ============================================================================

/// Send a request and parse the JSON response body, if any
pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();

    if body_bytes.is_empty() {
        return (status, None);
    }
    (status, serde_json::from_slice(&body_bytes).ok())
}

pub async fn get_json(app: &Router, path: &str, token: Option<&str>) -> (StatusCode, Option<Value>) {
    send(app, Method::GET, path, token, None).await
}

pub async fn post_json(
    app: &Router,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Option<Value>) {
    send(app, Method::POST, path, token, Some(body)).await
}

pub async fn put_json(
    app: &Router,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Option<Value>) {
    send(app, Method::PUT, path, token, Some(body)).await
}

pub async fn delete_json(app: &Router, path: &str, token: Option<&str>) -> (StatusCode, Option<Value>) {
    send(app, Method::DELETE, path, token, None).await
}
