//! Liveness and status endpoints.
//!
//! Used by the binary as its public API handler when nothing else is wired.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

pub fn router() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(get_status))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "OK"
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}
