//! Per-request metrics and request ids for the HTTP surface

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Label for requests that matched no route
const UNMATCHED_ROUTE: &str = "unmatched";

/// Coarse area of the API a route belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    Budget,
    Auth,
    System,
}

impl RouteGroup {
    pub fn of(route: &str) -> Self {
        if route.starts_with("/api/v1/budget-items") {
            RouteGroup::Budget
        } else if route.starts_with("/api/v1/auth") || route == "/api/v1/me" {
            RouteGroup::Auth
        } else {
            RouteGroup::System
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteGroup::Budget => "budget",
            RouteGroup::Auth => "auth",
            RouteGroup::System => "system",
        }
    }
}

/// Route template of the request, e.g. `/api/v1/budget-items/{id}/values`
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Records request count, latency and in-flight gauge, and echoes a request id.
///
/// Must be installed with `Router::layer` so the matched route is known.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = route_label(&request);
    let group = RouteGroup::of(&route).as_str();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %request_id, route = %route);
    gauge!("semula_http_requests_in_flight", "group" => group).increment(1.0);
    let start = Instant::now();

    let mut response = next.run(request).instrument(span).await;

    let status = response.status().as_u16().to_string();
    counter!(
        "semula_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    histogram!("semula_http_request_duration_seconds", "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64());
    gauge!("semula_http_requests_in_flight", "group" => group).decrement(1.0);

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
