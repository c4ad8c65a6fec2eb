//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (group.rs):
//!     member 1 start → member 2 start → ... (first failure aborts)
//!
//! Stop (group.rs):
//!     member 1 stop → member 2 stop → ... (failures collected, never abort)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller invokes stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup, fail fast
//! - Ordered shutdown, failure tolerant
//! - Post-start failures are stored, not thrown

pub mod group;
pub mod service;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use group::ServiceGroup;
pub use service::{ErrorSlot, Service, ServiceError};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{ServerState, StateCell};
