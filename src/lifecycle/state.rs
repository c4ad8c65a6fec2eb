//! Server lifecycle state machine.
//!
//! ```text
//! NotStarted → Running → Stopping → Stopped
//! ```
//!
//! A stopped server is never restarted; build a new one instead.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    NotStarted = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ServerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// True once a stop has been requested.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Atomic cell holding a [`ServerState`], readable from the serve loop.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ServerState::NotStarted as u8))
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_cell() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ServerState::NotStarted);

        for state in [
            ServerState::Running,
            ServerState::Stopping,
            ServerState::Stopped,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn shutting_down_states() {
        assert!(!ServerState::NotStarted.is_shutting_down());
        assert!(!ServerState::Running.is_shutting_down());
        assert!(ServerState::Stopping.is_shutting_down());
        assert!(ServerState::Stopped.is_shutting_down());
    }
}
