//! A single listener with start/stop semantics.
//!
//! # Responsibilities
//! - Bind on start, surface bind failures immediately
//! - Run an independent accept loop once started
//! - Drain connections on stop, bounded by the listener policy
//! - Keep post-start failures for later inspection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};

use crate::lifecycle::{
    ErrorSlot, ServerState, Service, ServiceError, Shutdown, ShutdownSignal, StateCell,
};
use crate::net::{listener, AcceptAction, Acceptor, ConnectionTracker, ListenerPolicy};
use crate::observability::metrics;
use crate::server::protocol::Protocol;

/// Lifecycle wrapper around one network listener.
///
/// Without an address the server is inert: start and stop do nothing.
/// After a stop the instance cannot be started again.
pub struct ManagedServer {
    name: String,
    address: Option<String>,
    protocol: Protocol,
    router: Router,
    policy: Arc<ListenerPolicy>,
    state: Arc<StateCell>,
    errors: ErrorSlot,
    connections: ConnectionTracker,
    local_addr: ArcSwapOption<SocketAddr>,
    running: Mutex<Option<Running>>,
}

struct Running {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl ManagedServer {
    pub fn new(
        name: impl Into<String>,
        address: Option<String>,
        protocol: Protocol,
        router: Router,
        policy: Arc<ListenerPolicy>,
    ) -> Self {
        let name = name.into();
        Self {
            connections: ConnectionTracker::new(&name),
            name,
            address,
            protocol,
            router,
            policy,
            state: Arc::new(StateCell::new()),
            errors: ErrorSlot::new(),
            local_addr: ArcSwapOption::empty(),
            running: Mutex::new(None),
        }
    }

    /// HTTP/1.1 server for an axum router.
    pub fn http(
        name: impl Into<String>,
        address: Option<String>,
        router: Router,
        policy: Arc<ListenerPolicy>,
    ) -> Self {
        Self::new(name, address, Protocol::Http, router, policy)
    }

    /// gRPC server for a set of tonic services.
    pub fn grpc(
        name: impl Into<String>,
        address: Option<String>,
        routes: tonic::service::Routes,
        policy: Arc<ListenerPolicy>,
    ) -> Self {
        Self::new(name, address, Protocol::Grpc, routes.into_axum_router(), policy)
    }

    /// Configured listen address.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    pub fn policy(&self) -> &ListenerPolicy {
        &self.policy
    }

    /// Address actually bound. Kept after stop.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.load_full().map(|addr| *addr)
    }

    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// Whether the accept loop is alive.
    ///
    /// False before start, after stop, and after a fatal accept error ended
    /// the loop while the server still reports [`ServerState::Running`].
    pub async fn is_serving(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    fn serve_loop(&self) -> ServeLoop {
        ServeLoop {
            name: self.name.clone(),
            protocol: self.protocol,
            router: self.router.clone(),
            policy: self.policy.clone(),
            state: self.state.clone(),
            errors: self.errors.clone(),
            connections: self.connections.clone(),
        }
    }
}

#[async_trait]
impl Service for ManagedServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        let Some(address) = self.address.as_deref() else {
            tracing::debug!(server = %self.name, "No address configured, nothing to start");
            return Ok(());
        };

        let mut running = self.running.lock().await;
        match self.state.get() {
            ServerState::NotStarted => {}
            ServerState::Running => return Ok(()),
            ServerState::Stopping | ServerState::Stopped => {
                return Err(ServiceError::Stopped {
                    service: self.name.clone(),
                })
            }
        }

        let (listener, local_addr) =
            listener::bind(address)
                .await
                .map_err(|source| ServiceError::Listener {
                    service: self.name.clone(),
                    source,
                })?;

        let shutdown = Shutdown::new();
        self.state.set(ServerState::Running);
        let task = tokio::spawn(self.serve_loop().run(listener, shutdown.subscribe()));
        *running = Some(Running { shutdown, task });
        self.local_addr.store(Some(Arc::new(local_addr)));

        metrics::record_server_started(&self.name, self.protocol.as_str());
        tracing::info!(
            server = %self.name,
            protocol = %self.protocol,
            address = %local_addr,
            "Server started"
        );
        Ok(())
    }

    async fn stop(&self) {
        let Some(mut running) = self.running.lock().await.take() else {
            return;
        };

        let started = Instant::now();
        let timeout = self.policy.shutdown_timeout();
        self.state.set(ServerState::Stopping);
        tracing::info!(server = %self.name, timeout = ?timeout, "Stopping server");
        running.shutdown.trigger();

        match tokio::time::timeout(timeout, &mut running.task).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => report(
                &self.errors,
                ServiceError::Task {
                    service: self.name.clone(),
                    source,
                },
            ),
            Err(_) => {
                running.task.abort();
                let _ = running.task.await;
                report(
                    &self.errors,
                    ServiceError::ShutdownTimeout {
                        service: self.name.clone(),
                        timeout,
                    },
                );
            }
        }

        self.state.set(ServerState::Stopped);
        metrics::record_server_stopped(&self.name, started.elapsed());
        tracing::info!(server = %self.name, elapsed = ?started.elapsed(), "Server stopped");
    }

    fn last_error(&self) -> Option<Arc<ServiceError>> {
        self.errors.load()
    }
}

/// Log, count and keep a failure.
fn report(errors: &ErrorSlot, err: ServiceError) {
    tracing::error!(server = %err.service(), kind = err.kind(), error = %err, "Server failure");
    metrics::record_server_error(err.service(), err.kind());
    errors.store(err);
}

/// Everything the background accept loop needs, detached from the server.
struct ServeLoop {
    name: String,
    protocol: Protocol,
    router: Router,
    policy: Arc<ListenerPolicy>,
    state: Arc<StateCell>,
    errors: ErrorSlot,
    connections: ConnectionTracker,
}

impl ServeLoop {
    async fn run<A: Acceptor>(self, mut acceptor: A, mut shutdown: ShutdownSignal) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = joined {
                        tracing::warn!(server = %self.name, error = %err, "Connection task failed");
                    }
                }
                accepted = acceptor.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.spawn_connection(&mut connections, stream, peer, shutdown.clone());
                    }
                    Err(err) => match self.policy.classify(&err, self.state.get()) {
                        AcceptAction::Continue => {
                            tracing::debug!(server = %self.name, error = %err, "Ignoring accept error");
                        }
                        AcceptAction::Backoff(pause) => {
                            tracing::warn!(
                                server = %self.name,
                                error = %err,
                                backoff = ?pause,
                                "Accept failed on exhausted resources, backing off"
                            );
                            metrics::record_server_error(&self.name, "accept_backoff");
                            tokio::select! {
                                _ = shutdown.recv() => break,
                                _ = tokio::time::sleep(pause) => {}
                            }
                        }
                        AcceptAction::Fail => {
                            report(&self.errors, ServiceError::Accept {
                                service: self.name.clone(),
                                source: err,
                            });
                            break;
                        }
                    },
                },
            }
        }

        // Closing the listener makes new connection attempts fail right away.
        drop(acceptor);

        if !connections.is_empty() {
            tracing::debug!(
                server = %self.name,
                in_flight = connections.len(),
                "Draining connections"
            );
        }
        while connections.join_next().await.is_some() {}
    }

    fn spawn_connection(
        &self,
        connections: &mut JoinSet<()>,
        stream: TcpStream,
        peer: SocketAddr,
        drain: ShutdownSignal,
    ) {
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(server = %self.name, peer = %peer, error = %err, "Failed to set TCP_NODELAY");
        }

        let guard = self.connections.track();
        let protocol = self.protocol;
        let router = self.router.clone();
        let server = self.name.clone();
        tracing::trace!(server = %server, peer = %peer, connection_id = %guard.id(), "Connection accepted");

        connections.spawn(async move {
            if let Err(err) = protocol.serve_connection(stream, router, drain).await {
                tracing::debug!(
                    server = %server,
                    peer = %peer,
                    connection_id = %guard.id(),
                    error = %err,
                    "Connection closed with error"
                );
            }
            drop(guard);
        });
    }
}
