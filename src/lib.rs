//! Configuration-driven lifecycle for the network servers of one process.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::{load_settings, Settings};
pub use lifecycle::{Service, ServiceError, ServiceGroup};
pub use server::{ManagedServer, MultiServer, ServerParams};
