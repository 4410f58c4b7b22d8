//! Server initialization and routing

use crate::api;
use crate::backend::BackendClient;
use crate::config::{Config, CorsConfig};
use crate::middleware::track_requests;
use crate::openapi::ApiDoc;
use crate::repository::BackendBudgetItemRepository;
use crate::service::BudgetService;
use crate::state::HasServices;
use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<BackendClient>,
    pub budget_service: Arc<BudgetService<BackendBudgetItemRepository>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let backend = BackendClient::new(config.backend.clone())?;
        let repo = Arc::new(BackendBudgetItemRepository::new(backend.clone()));

        Ok(Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
            budget_service: Arc::new(BudgetService::new(repo)),
        })
    }
}

impl HasServices for AppState {
    type Auth = BackendClient;
    type Profiles = BackendClient;
    type BudgetRepo = BackendBudgetItemRepository;

    fn config(&self) -> &Config {
        &self.config
    }

    fn auth_backend(&self) -> &Self::Auth {
        &self.backend
    }

    fn profile_store(&self) -> &Self::Profiles {
        &self.backend
    }

    fn budget_service(&self) -> &BudgetService<Self::BudgetRepo> {
        &self.budget_service
    }
}

/// Run the server
pub async fn run(config: Config, metrics_handle: Option<PrometheusHandle>) -> Result<()> {
    let http_addr = config.http_addr();
    let state = AppState::new(config)?;
    info!(backend = %state.config.backend.url, "Hosted backend configured");

    let app = build_router(state, metrics_handle);

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the HTTP router with generic state type
///
/// This function is generic over the state type, allowing it to work with
/// both production `AppState` and test implementations that implement `HasServices`.
pub fn build_router<S: HasServices>(state: S, metrics_handle: Option<PrometheusHandle>) -> Router {
    let cors = cors_layer(&state.config().cors);

    let metrics_router = Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(metrics_handle));

    Router::new()
        // Health endpoints
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::build()) }),
        )
        // Auth endpoints
        .route("/api/v1/auth/sign-up", post(api::auth::sign_up::<S>))
        .route("/api/v1/auth/sign-in", post(api::auth::sign_in::<S>))
        .route("/api/v1/auth/sign-out", post(api::auth::sign_out::<S>))
        .route("/api/v1/me", get(api::auth::me::<S>))
        // Budget item endpoints
        .route(
            "/api/v1/budget-items",
            get(api::budget::list::<S>).post(api::budget::create::<S>),
        )
        .route(
            "/api/v1/budget-items/summary",
            get(api::budget::summary::<S>),
        )
        .route(
            "/api/v1/budget-items/filter-options",
            get(api::budget::filter_options::<S>),
        )
        .route("/api/v1/budget-items/export", get(api::budget::export::<S>))
        .route(
            "/api/v1/budget-items/import",
            post(api::budget::import::<S>),
        )
        .route(
            "/api/v1/budget-items/{id}",
            get(api::budget::get::<S>).delete(api::budget::delete::<S>),
        )
        .route(
            "/api/v1/budget-items/{id}/values",
            put(api::budget::update_values::<S>),
        )
        .route(
            "/api/v1/budget-items/{id}/uraian",
            put(api::budget::update_uraian::<S>),
        )
        .route(
            "/api/v1/budget-items/{id}/approve",
            post(api::budget::approve::<S>),
        )
        .route(
            "/api/v1/budget-items/{id}/unapprove",
            post(api::budget::unapprove::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(axum::middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
