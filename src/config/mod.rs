//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & parse)
//!     → Settings (dotted key lookups, env overrides)
//!     → schema.rs (typed per-namespace views)
//!     → server factories decide which listeners exist
//! ```
//!
//! # Design Decisions
//! - "Not present" is a normal lookup result, never an error
//! - A value of the wrong type is an error
//! - Settings are read once at composition time

pub mod loader;
pub mod schema;
pub mod source;

pub use loader::{load_settings, ConfigError};
pub use schema::{LogFormat, LoggerConfig, ServerSettings};
pub use source::{parse_duration, ConfigSource, Settings};
