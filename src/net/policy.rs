//! Listener error tolerance and shutdown timing.

use std::collections::HashSet;
use std::io;
use std::time::Duration;

use crate::config::{ConfigError, ConfigSource};
use crate::lifecycle::ServerState;

/// Graceful shutdown budget when the configuration names none.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after an accept error caused by resource exhaustion.
pub const DEFAULT_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Accept errors that never end a serve loop.
pub const DEFAULT_SKIP_ERRORS: [io::ErrorKind; 6] = [
    io::ErrorKind::ConnectionAborted,
    io::ErrorKind::ConnectionReset,
    io::ErrorKind::ConnectionRefused,
    io::ErrorKind::Interrupted,
    io::ErrorKind::WouldBlock,
    io::ErrorKind::TimedOut,
];

/// What an accept loop does with a failed `accept()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptAction {
    /// Keep accepting right away.
    Continue,
    /// Keep accepting after a pause.
    Backoff(Duration),
    /// End the loop and record the error.
    Fail,
}

/// Shared, immutable rules for accept loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerPolicy {
    skip_errors: HashSet<io::ErrorKind>,
    shutdown_timeout: Duration,
    accept_backoff: Duration,
}

impl ListenerPolicy {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            skip_errors: DEFAULT_SKIP_ERRORS.into_iter().collect(),
            shutdown_timeout,
            accept_backoff: DEFAULT_ACCEPT_BACKOFF,
        }
    }

    /// Build from the global `shutdown_timeout` key.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let timeout = source
            .get_duration("shutdown_timeout")?
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        Ok(Self::new(timeout))
    }

    pub fn with_skip_error(mut self, kind: io::ErrorKind) -> Self {
        self.skip_errors.insert(kind);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_accept_backoff(mut self, backoff: Duration) -> Self {
        self.accept_backoff = backoff;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn accept_backoff(&self) -> Duration {
        self.accept_backoff
    }

    pub fn skip_errors(&self) -> &HashSet<io::ErrorKind> {
        &self.skip_errors
    }

    /// Whether an accept error should be swallowed.
    ///
    /// Transient kinds are always tolerated. Once a stop is under way every
    /// error is a consequence of tearing the listener down.
    pub fn ignore_error(&self, err: &io::Error, state: ServerState) -> bool {
        self.skip_errors.contains(&err.kind()) || state.is_shutting_down()
    }

    /// Decide how an accept loop reacts to `err`.
    ///
    /// Running out of descriptors or buffers clears up once connections
    /// close, so those errors pause the loop instead of ending it.
    pub fn classify(&self, err: &io::Error, state: ServerState) -> AcceptAction {
        if self.ignore_error(err, state) {
            AcceptAction::Continue
        } else if is_resource_exhaustion(err) {
            AcceptAction::Backoff(self.accept_backoff)
        } else {
            AcceptAction::Fail
        }
    }
}

/// Out of file descriptors, socket buffers or memory.
pub fn is_resource_exhaustion(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::OutOfMemory {
        return true;
    }

    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        return matches!(
            code,
            libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
        );
    }

    false
}

impl Default for ListenerPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}
