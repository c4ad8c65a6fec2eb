//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use tokio::net::{TcpListener, TcpStream};
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::codegen::{http, Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::NamedService;
use tonic::{Request, Response, Status};

pub const PING_SERVICE: &str = "lifecycle.test.Ping";
pub const PING_EMPTY: &str = "/lifecycle.test.Ping/Empty";
pub const PING_UNARY: &str = "/lifecycle.test.Ping/Unary";

/// Router with `/test` answering "OK" and `/slow/{ms}` sleeping first.
pub fn test_router() -> Router {
    Router::new()
        .route("/test", get(|| async { "OK" }))
        .route(
            "/slow/{ms}",
            get(|Path(ms): Path<u64>| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                "done"
            }),
        )
}

/// Reserve a port that is free right now.
pub async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Client that never goes through an environment proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub async fn get_text(addr: SocketAddr, path: &str) -> (u16, String) {
    let response = http_client()
        .get(format!("http://{addr}{path}"))
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

/// Whether a TCP connection to `addr` is refused.
pub async fn is_refused(addr: SocketAddr) -> bool {
    TcpStream::connect(addr).await.is_err()
}

/// Minimal gRPC service with two unary methods taking and returning
/// empty messages. `Unary` always fails with `AlreadyExists`.
#[derive(Clone, Default)]
pub struct PingServer;

impl NamedService for PingServer {
    const NAME: &'static str = PING_SERVICE;
}

impl<B> Service<http::Request<B>> for PingServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match req.uri().path() {
            PING_EMPTY => Box::pin(async move {
                let method = tower::service_fn(|_: Request<()>| async {
                    Ok::<_, Status>(Response::new(()))
                });
                let mut grpc = tonic::server::Grpc::new(ProstCodec::<(), ()>::default());
                Ok(grpc.unary(method, req).await)
            }),
            PING_UNARY => Box::pin(async move {
                let method = tower::service_fn(|_: Request<()>| async {
                    Err::<Response<()>, _>(Status::already_exists("AlreadyExists"))
                });
                let mut grpc = tonic::server::Grpc::new(ProstCodec::<(), ()>::default());
                Ok(grpc.unary(method, req).await)
            }),
            _ => Box::pin(async move { Ok(Status::unimplemented("").into_http()) }),
        }
    }
}

/// Routes serving the ping service.
pub fn ping_routes() -> tonic::service::Routes {
    tonic::service::Routes::new(PingServer)
}

/// Call one of the ping methods.
pub async fn call_ping(addr: SocketAddr, method: &'static str) -> Result<(), Status> {
    let channel = tonic::transport::Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect_timeout(Duration::from_secs(5))
        .connect()
        .await
        .map_err(|err| Status::unavailable(err.to_string()))?;

    let mut client = tonic::client::Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|err| Status::unavailable(err.to_string()))?;
    client
        .unary(
            Request::new(()),
            PathAndQuery::from_static(method),
            ProstCodec::<(), ()>::default(),
        )
        .await
        .map(|response| response.into_inner())
}
