//! The standard set of process servers composed into one service.
//!
//! Start order is fixed: profiling, metrics, API, gRPC. Namespaces that
//! produce no server are left out of the group entirely.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use crate::config::ConfigSource;
use crate::lifecycle::{Service, ServiceError, ServiceGroup};
use crate::net::ListenerPolicy;
use crate::server::factory::{
    new_api_server, new_grpc_server, new_metrics_server, new_profile_server, FactoryError,
};
use crate::server::managed::ManagedServer;

/// Caller-supplied handlers. Every field is optional.
#[derive(Default)]
pub struct ServerParams {
    /// Extra routes served next to the built-in profiling endpoints.
    pub profile_handler: Option<Router>,
    /// Router for the public API listener.
    pub api_handler: Option<Router>,
    /// Replaces the built-in Prometheus router on the metrics listener.
    pub metrics_handler: Option<Router>,
    /// Services for the gRPC listener.
    pub grpc_routes: Option<tonic::service::Routes>,
}

/// Up to four managed servers acting as a single service.
pub struct MultiServer {
    group: ServiceGroup,
    servers: Vec<(String, Arc<ManagedServer>)>,
}

impl MultiServer {
    /// Compose servers from configuration, using the global shutdown timeout.
    pub fn new(source: &dyn ConfigSource, params: ServerParams) -> Result<Self, FactoryError> {
        let policy = Arc::new(ListenerPolicy::from_source(source)?);
        Self::with_policy(source, params, policy)
    }

    /// Compose servers that share an explicit listener policy.
    pub fn with_policy(
        source: &dyn ConfigSource,
        params: ServerParams,
        policy: Arc<ListenerPolicy>,
    ) -> Result<Self, FactoryError> {
        let results = [
            new_profile_server(source, params.profile_handler, &policy)?,
            new_metrics_server(source, params.metrics_handler, &policy)?,
            new_api_server(source, params.api_handler, &policy)?,
            new_grpc_server(source, params.grpc_routes, &policy)?,
        ];

        let mut group = ServiceGroup::new("servers");
        let mut servers = Vec::new();
        for result in results {
            let Some(server) = result.server else {
                continue;
            };
            let server = Arc::new(server);
            group.push(server.clone());
            servers.push((result.name, server));
        }

        tracing::info!(
            servers = ?servers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "Servers configured"
        );
        Ok(Self { group, servers })
    }

    /// The server built for `namespace`, if any.
    pub fn server(&self, namespace: &str) -> Option<&Arc<ManagedServer>> {
        self.servers
            .iter()
            .find(|(name, _)| name == namespace)
            .map(|(_, server)| server)
    }

    /// Bound address of the server for `namespace`, once started.
    pub fn local_addr(&self, namespace: &str) -> Option<SocketAddr> {
        self.server(namespace).and_then(|server| server.local_addr())
    }

    /// Configured namespaces in start order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Every member failure currently observable, in start order.
    pub fn failures(&self) -> Vec<Arc<ServiceError>> {
        self.group.failures()
    }
}

#[async_trait]
impl Service for MultiServer {
    fn name(&self) -> &str {
        self.group.name()
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.group.start().await
    }

    async fn stop(&self) {
        self.group.stop().await
    }

    fn last_error(&self) -> Option<Arc<ServiceError>> {
        self.group.last_error()
    }
}
