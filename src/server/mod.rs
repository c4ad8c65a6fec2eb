//! Server subsystem.
//!
//! # Data Flow
//! ```text
//! Settings + handlers
//!     → factory.rs (one optional server per namespace)
//!     → multi.rs (present servers, fixed start order)
//!         → managed.rs (bind, accept loop, bounded drain)
//!             → protocol.rs (HTTP/1.1 or HTTP/2 per connection)
//! ```
//!
//! # Design Decisions
//! - A namespace without an address has no server, not an error
//! - HTTP and gRPC share one accept loop; only the connection driver differs
//! - Stopping drains in-flight work, then force-closes at the timeout

pub mod factory;
pub mod managed;
pub mod multi;
pub mod protocol;

pub use factory::{
    new_api_server, new_grpc_server, new_http_server, new_metrics_server, new_profile_server,
    new_rpc_server, FactoryError, ServerResult, API_NAMESPACE, GRPC_NAMESPACE, METRICS_NAMESPACE,
    PROFILE_NAMESPACE,
};
pub use managed::ManagedServer;
pub use multi::{MultiServer, ServerParams};
pub use protocol::Protocol;
