//! Metrics collection and exposition.
//!
//! # Metrics
//! - `multiserver_server_starts_total` (counter): successful starts by server, protocol
//! - `multiserver_server_errors_total` (counter): recorded failures by server, kind
//! - `multiserver_server_running` (gauge): 1 while a server is running
//! - `multiserver_connections_active` (gauge): live connections per server
//! - `multiserver_shutdown_duration_seconds` (histogram): time spent in stop
//!
//! The Prometheus recorder is process-wide and installed on first use.

use std::sync::OnceLock;
use std::time::Duration;

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (once) and return a render handle.
///
/// If another recorder already owns the global slot the handle still works
/// but only renders what was recorded through it directly.
pub fn install() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            match ::metrics::set_global_recorder(recorder) {
                Ok(()) => tracing::debug!("Prometheus recorder installed"),
                Err(_) => tracing::warn!("A global metrics recorder is already installed"),
            }
            handle
        })
        .clone()
}

/// Router serving `GET /metrics` from the given handle.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(handle)
}

/// Router serving the process-wide recorder.
pub fn default_router() -> Router {
    router(install())
}

async fn render(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

pub fn record_server_started(server: &str, protocol: &'static str) {
    ::metrics::counter!(
        "multiserver_server_starts_total",
        "server" => server.to_string(),
        "protocol" => protocol
    )
    .increment(1);
    ::metrics::gauge!("multiserver_server_running", "server" => server.to_string()).set(1.0);
}

pub fn record_server_stopped(server: &str, elapsed: Duration) {
    ::metrics::gauge!("multiserver_server_running", "server" => server.to_string()).set(0.0);
    ::metrics::histogram!(
        "multiserver_shutdown_duration_seconds",
        "server" => server.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_server_error(server: &str, kind: &'static str) {
    ::metrics::counter!(
        "multiserver_server_errors_total",
        "server" => server.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn set_active_connections(server: &str, active: u64) {
    ::metrics::gauge!("multiserver_connections_active", "server" => server.to_string())
        .set(active as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn exposes_recorded_metrics() {
        let app = default_router();
        record_server_started("metrics-test", "http");
        record_server_error("metrics-test", "accept");

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("multiserver_server_starts_total"));
        assert!(text.contains("server=\"metrics-test\""));
        assert!(text.contains("multiserver_server_errors_total"));
    }
}
