//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    // Seconds; sub-millisecond buckets for fast endpoints
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions so `/metrics` carries HELP/TYPE lines from startup.
pub fn describe_metrics() {
    // HTTP
    describe_counter!("semula_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "semula_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "semula_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    // Identity
    describe_counter!(
        "semula_session_transitions_total",
        "Identity state machine transitions by target state"
    );
    describe_counter!(
        "semula_profile_fetch_failures_total",
        "Profile lookups that fell back to viewer, by reason"
    );

    // Authorization
    describe_counter!(
        "semula_policy_denials_total",
        "Actions denied by the authorization engine, by action"
    );

    // Backend
    describe_counter!(
        "semula_backend_errors_total",
        "Error responses from the hosted backend, by status"
    );
}
