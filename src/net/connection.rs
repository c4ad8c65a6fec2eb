//! Connection identity and accounting.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections per server

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough, only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Live connection counter for one server.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    server: Arc<str>,
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new(server: &str) -> Self {
        Self {
            server: Arc::from(server),
            active_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a new connection. The returned guard decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(&self.server, active);
        ConnectionGuard {
            tracker: self.clone(),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: ConnectionTracker,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.tracker.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(&self.tracker.server, active);
        tracing::trace!(server = %self.tracker.server, connection_id = %self.id, "Connection closed");
    }
}
