//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address
//!     → listener.rs (validate, resolve, bind)
//!     → accept loop (server::managed)
//!         → policy.rs (tolerate or surface accept errors)
//!         → connection.rs (id + live connection accounting)
//!     → Hand off to the HTTP/1.1 or HTTP/2 connection driver
//! ```
//!
//! # Design Decisions
//! - Bind failures are fatal at startup
//! - Transient accept errors never end the loop
//! - Resource exhaustion pauses the loop instead of ending it
//! - Shutdown time is bounded by the policy

pub mod connection;
pub mod listener;
pub mod policy;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Acceptor, ListenerError};
pub use policy::{AcceptAction, ListenerPolicy, DEFAULT_ACCEPT_BACKOFF, DEFAULT_SHUTDOWN_TIMEOUT};
