//! Configuration-driven server construction.
//!
//! A namespace produces no server when it is disabled, has no address, or
//! lacks a required handler. Absence is normal: optional endpoints simply
//! do not exist in minimal deployments. Only a malformed setting for a
//! server that would otherwise be built is an error.

use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use crate::config::{ConfigError, ConfigSource, ServerSettings};
use crate::net::{listener, ListenerError, ListenerPolicy};
use crate::observability::{metrics, profiling};
use crate::server::managed::ManagedServer;
use crate::server::protocol::Protocol;

pub const PROFILE_NAMESPACE: &str = "pprof";
pub const METRICS_NAMESPACE: &str = "metrics";
pub const API_NAMESPACE: &str = "api";
pub const GRPC_NAMESPACE: &str = "grpc";

/// Error type for server construction.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("{namespace}: {source}")]
    InvalidAddress {
        namespace: String,
        #[source]
        source: ListenerError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A possibly absent server together with its configuration namespace.
pub struct ServerResult {
    pub server: Option<ManagedServer>,
    pub name: String,
}

impl ServerResult {
    fn absent(name: &str) -> Self {
        Self {
            server: None,
            name: name.to_string(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.server.is_none()
    }

    pub fn into_server(self) -> Option<ManagedServer> {
        self.server
    }
}

/// Build an HTTP server for `namespace` serving `handler`.
pub fn new_http_server(
    source: &dyn ConfigSource,
    namespace: &str,
    handler: Option<Router>,
    policy: &Arc<ListenerPolicy>,
) -> Result<ServerResult, FactoryError> {
    build(source, namespace, Protocol::Http, policy, || handler)
}

/// Build a gRPC server for `namespace` serving `routes`.
pub fn new_rpc_server(
    source: &dyn ConfigSource,
    namespace: &str,
    routes: Option<tonic::service::Routes>,
    policy: &Arc<ListenerPolicy>,
) -> Result<ServerResult, FactoryError> {
    build(source, namespace, Protocol::Grpc, policy, || {
        routes.map(tonic::service::Routes::into_axum_router)
    })
}

/// Profiling server with the built-in `/debug/pprof/` endpoints.
///
/// A caller handler is served alongside them; its routes must not overlap
/// `/debug/pprof/*`.
pub fn new_profile_server(
    source: &dyn ConfigSource,
    handler: Option<Router>,
    policy: &Arc<ListenerPolicy>,
) -> Result<ServerResult, FactoryError> {
    build(source, PROFILE_NAMESPACE, Protocol::Http, policy, || {
        Some(match handler {
            Some(handler) => profiling::router().merge(handler),
            None => profiling::router(),
        })
    })
}

/// Metrics server. Without a handler it serves the Prometheus recorder.
pub fn new_metrics_server(
    source: &dyn ConfigSource,
    handler: Option<Router>,
    policy: &Arc<ListenerPolicy>,
) -> Result<ServerResult, FactoryError> {
    build(source, METRICS_NAMESPACE, Protocol::Http, policy, || {
        Some(handler.unwrap_or_else(metrics::default_router))
    })
}

/// Public API server. Requires a handler.
pub fn new_api_server(
    source: &dyn ConfigSource,
    handler: Option<Router>,
    policy: &Arc<ListenerPolicy>,
) -> Result<ServerResult, FactoryError> {
    new_http_server(source, API_NAMESPACE, handler, policy)
}

/// gRPC server. Requires routes from the caller.
pub fn new_grpc_server(
    source: &dyn ConfigSource,
    routes: Option<tonic::service::Routes>,
    policy: &Arc<ListenerPolicy>,
) -> Result<ServerResult, FactoryError> {
    new_rpc_server(source, GRPC_NAMESPACE, routes, policy)
}

fn build(
    source: &dyn ConfigSource,
    namespace: &str,
    protocol: Protocol,
    policy: &Arc<ListenerPolicy>,
    handler: impl FnOnce() -> Option<Router>,
) -> Result<ServerResult, FactoryError> {
    let settings = ServerSettings::from_source(source, namespace)?;
    if settings.disabled {
        tracing::info!(server = namespace, "Server disabled by configuration");
        return Ok(ServerResult::absent(namespace));
    }
    let Some(address) = settings.address else {
        tracing::debug!(server = namespace, "No address configured, server skipped");
        return Ok(ServerResult::absent(namespace));
    };
    let Some(router) = handler() else {
        tracing::debug!(server = namespace, "No handler supplied, server skipped");
        return Ok(ServerResult::absent(namespace));
    };

    listener::validate_address(&address).map_err(|source| FactoryError::InvalidAddress {
        namespace: namespace.to_string(),
        source,
    })?;

    let policy = match settings.shutdown_timeout {
        Some(timeout) => Arc::new(policy.as_ref().clone().with_shutdown_timeout(timeout)),
        None => policy.clone(),
    };

    tracing::debug!(server = namespace, address = %address, protocol = %protocol, "Server configured");
    Ok(ServerResult {
        server: Some(ManagedServer::new(
            namespace,
            Some(address),
            protocol,
            router,
            policy,
        )),
        name: namespace.to_string(),
    })
}
