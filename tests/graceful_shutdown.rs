//! Draining behaviour of a stopping server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use multiserver::config::Settings;
use multiserver::lifecycle::{ServerState, Service, ServiceError};
use multiserver::net::ListenerPolicy;
use multiserver::server::{ManagedServer, MultiServer, ServerParams};

mod common;

/// `/test` plus `/slow/{ms}`, counting requests that reached the handler.
fn counting_router(entered: Arc<AtomicUsize>) -> Router {
    Router::new().route("/test", get(|| async { "OK" })).route(
        "/slow/{ms}",
        get(move |Path(ms): Path<u64>| {
            let entered = entered.clone();
            async move {
                entered.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                "done"
            }
        }),
    )
}

fn api_server(timeout: Duration) -> (Arc<ManagedServer>, Arc<AtomicUsize>) {
    let entered = Arc::new(AtomicUsize::new(0));
    let server = Arc::new(ManagedServer::http(
        "api",
        Some("127.0.0.1:0".into()),
        counting_router(entered.clone()),
        Arc::new(ListenerPolicy::default().with_shutdown_timeout(timeout)),
    ));
    (server, entered)
}

/// Wait until `expected` requests are inside the handler.
async fn wait_for_requests(entered: &AtomicUsize, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while entered.load(Ordering::SeqCst) < expected {
        assert!(Instant::now() < deadline, "request never reached the handler");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn in_flight_request_completes() {
    let (server, entered) = api_server(Duration::from_secs(3));
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let request = tokio::spawn(async move { common::get_text(addr, "/slow/300").await });
    wait_for_requests(&entered, 1).await;
    assert_eq!(server.active_connections(), 1);

    server.stop().await;

    assert_eq!(request.await.unwrap(), (200, "done".to_string()));
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(server.last_error().is_none());
    assert_eq!(server.active_connections(), 0);
}

#[tokio::test]
async fn stuck_request_is_cut_at_timeout() {
    let timeout = Duration::from_millis(200);
    let (server, entered) = api_server(timeout);
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let request = tokio::spawn(async move {
        common::http_client()
            .get(format!("http://{addr}/slow/10000"))
            .send()
            .await
    });
    wait_for_requests(&entered, 1).await;

    let started = Instant::now();
    server.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());

    assert!(request.await.unwrap().is_err());
    let err = server.last_error().unwrap();
    assert!(matches!(
        *err,
        ServiceError::ShutdownTimeout { timeout: t, .. } if t == timeout
    ));
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(common::is_refused(addr).await);

    // Aborted connection tasks release their guards asynchronously.
    let deadline = Instant::now() + Duration::from_secs(1);
    while server.active_connections() != 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.active_connections(), 0);
}

#[tokio::test]
async fn idle_keep_alive_connections_do_not_delay_stop() {
    let (server, _) = api_server(Duration::from_secs(5));
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = common::http_client();
    for _ in 0..3 {
        let response = client
            .get(format!("http://{addr}/test"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "OK");
    }

    let started = Instant::now();
    server.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(server.last_error().is_none());
}

#[tokio::test]
async fn grpc_server_drains_after_calls() {
    let mut settings = Settings::new();
    settings.set("grpc.address", "127.0.0.1:0");
    settings.set("grpc.shutdown_timeout", "2s");

    let servers = MultiServer::new(
        &settings,
        ServerParams {
            grpc_routes: Some(common::ping_routes()),
            ..Default::default()
        },
    )
    .unwrap();
    servers.start().await.unwrap();
    let addr = servers.local_addr("grpc").unwrap();

    common::call_ping(addr, common::PING_EMPTY).await.unwrap();

    let started = Instant::now();
    servers.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(servers.failures().is_empty());
    assert!(common::is_refused(addr).await);
}
