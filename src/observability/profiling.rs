//! Runtime introspection endpoints served by the `pprof` server.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

const INDEX: &str = "\
/debug/pprof/cmdline  process command line, NUL separated
/debug/pprof/runtime  tokio runtime counters (JSON)
/debug/pprof/build    crate name and version (JSON)
";

/// Router with the built-in profiling endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/debug/pprof/", get(index))
        .route("/debug/pprof/cmdline", get(cmdline))
        .route("/debug/pprof/runtime", get(runtime))
        .route("/debug/pprof/build", get(build))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
pub struct RuntimeReport {
    pub pid: u32,
    pub flavor: String,
    pub workers: usize,
    pub alive_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
}

async fn index() -> &'static str {
    INDEX
}

async fn cmdline() -> String {
    std::env::args().collect::<Vec<_>>().join("\0")
}

async fn runtime() -> Json<RuntimeReport> {
    let handle = tokio::runtime::Handle::current();
    let metrics = handle.metrics();
    Json(RuntimeReport {
        pid: std::process::id(),
        flavor: format!("{:?}", handle.runtime_flavor()),
        workers: metrics.num_workers(),
        alive_tasks: metrics.num_alive_tasks(),
    })
}

async fn build() -> Json<BuildInfo> {
    Json(BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(path: &str) -> (StatusCode, String) {
        let response = router()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (status, body) = get("/debug/pprof/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/debug/pprof/runtime"));
    }

    #[tokio::test]
    async fn runtime_report_is_json() {
        let (status, body) = get("/debug/pprof/runtime").await;
        assert_eq!(status, StatusCode::OK);

        let report: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["pid"], std::process::id());
        assert!(report["workers"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn build_reports_version() {
        let (status, body) = get("/debug/pprof/build").await;
        assert_eq!(status, StatusCode::OK);

        let info: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (status, _) = get("/debug/pprof/heap").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
