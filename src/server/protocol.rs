//! Per-connection protocol drivers.
//!
//! Both flavors serve an `axum::Router`; they differ only in the wire
//! protocol and in what a graceful drain means:
//! - HTTP/1.1: finish the active request, then close the connection
//! - HTTP/2 (gRPC): send GOAWAY, refuse new streams, finish in-flight calls

use std::fmt;
use std::future::Future;
use std::pin::{pin, Pin};

use axum::Router;
use hyper::server::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;

use crate::lifecycle::ShutdownSignal;

/// Wire protocol of a managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// HTTP/1.1 request/response.
    Http,
    /// gRPC over HTTP/2 with prior knowledge.
    Grpc,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Grpc => "grpc",
        }
    }

    /// Serve one accepted connection until it closes.
    ///
    /// When `drain` fires the connection is asked to shut down gracefully
    /// and is then driven to completion.
    pub(crate) async fn serve_connection(
        self,
        stream: TcpStream,
        router: Router,
        mut drain: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(router);

        match self {
            Self::Http => {
                let mut conn = pin!(http1::Builder::new().serve_connection(io, service));
                drive(conn.as_mut(), &mut drain, |conn| conn.graceful_shutdown()).await
            }
            Self::Grpc => {
                let mut conn =
                    pin!(http2::Builder::new(TokioExecutor::new()).serve_connection(io, service));
                drive(conn.as_mut(), &mut drain, |conn| conn.graceful_shutdown()).await
            }
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

async fn drive<C, F>(mut conn: Pin<&mut C>, drain: &mut ShutdownSignal, graceful: F) -> C::Output
where
    C: Future,
    F: FnOnce(Pin<&mut C>),
{
    tokio::select! {
        output = conn.as_mut() => output,
        _ = drain.recv() => {
            graceful(conn.as_mut());
            conn.await
        }
    }
}
