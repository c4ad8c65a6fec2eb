//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Built-in handlers:
//!     → metrics.rs   GET /metrics (Prometheus scrape)
//!     → profiling.rs GET /debug/pprof/*
//!     → health.rs    GET /healthz, GET /status
//! ```
//!
//! # Design Decisions
//! - Structured fields on every lifecycle event (server, address, error)
//! - Metrics are cheap (atomic increments)
//! - Built-in handlers are ordinary routers, served like any other

pub mod health;
pub mod logging;
pub mod metrics;
pub mod profiling;
