//! The `Service` capability and its error type.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use thiserror::Error;

use crate::net::ListenerError;

/// A unit with a start/stop lifecycle.
///
/// `start` reports setup failures synchronously. `stop` never fails from
/// the caller's point of view: anything that goes wrong while stopping, or
/// in a background loop after a successful start, is kept for
/// [`Service::last_error`].
#[async_trait]
pub trait Service: Send + Sync {
    /// Informational name used in logs.
    fn name(&self) -> &str;

    /// Start the service. Returns once the service is ready, not when it ends.
    async fn start(&self) -> Result<(), ServiceError>;

    /// Stop the service and release its resources.
    async fn stop(&self);

    /// Most recent failure observed after `start` returned.
    fn last_error(&self) -> Option<Arc<ServiceError>> {
        None
    }
}

/// Errors produced by services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service}: {source}")]
    Listener {
        service: String,
        #[source]
        source: ListenerError,
    },

    #[error("{service}: accept failed: {source}")]
    Accept {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{service}: graceful shutdown exceeded {timeout:?}, connections were closed")]
    ShutdownTimeout { service: String, timeout: Duration },

    #[error("{service}: serve task failed: {source}")]
    Task {
        service: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("{service}: already stopped, create a new instance to start again")]
    Stopped { service: String },

    #[error("{service}: {source}")]
    Custom {
        service: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ServiceError {
    /// Wrap an arbitrary error raised by a user-defined service.
    pub fn custom(
        service: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Custom {
            service: service.into(),
            source: source.into(),
        }
    }

    /// Name of the service that produced the error.
    pub fn service(&self) -> &str {
        match self {
            Self::Listener { service, .. }
            | Self::Accept { service, .. }
            | Self::ShutdownTimeout { service, .. }
            | Self::Task { service, .. }
            | Self::Stopped { service }
            | Self::Custom { service, .. } => service,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Listener { .. } => "listener",
            Self::Accept { .. } => "accept",
            Self::ShutdownTimeout { .. } => "shutdown_timeout",
            Self::Task { .. } => "task",
            Self::Stopped { .. } => "stopped",
            Self::Custom { .. } => "custom",
        }
    }
}

/// Shared holder for a service's most recent failure.
///
/// Written from background tasks, read by the owner at any time.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot(Arc<ArcSwapOption<ServiceError>>);

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored error.
    pub fn store(&self, err: ServiceError) {
        self.0.store(Some(Arc::new(err)));
    }

    pub fn load(&self) -> Option<Arc<ServiceError>> {
        self.0.load_full()
    }

    /// Remove and return the stored error.
    pub fn take(&self) -> Option<Arc<ServiceError>> {
        self.0.swap(None)
    }
}
