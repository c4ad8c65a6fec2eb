//! TCP listener binding.
//!
//! # Responsibilities
//! - Validate and resolve configured addresses
//! - Bind the listening socket
//!
//! `":port"` is shorthand for every IPv4 interface.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listen address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Source of accepted connections for a serve loop.
///
/// `accept` must be cancel safe: the loop races it against shutdown.
pub trait Acceptor: Send + 'static {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Expand the `":port"` shorthand.
pub fn normalize_address(address: &str) -> String {
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => address.to_string(),
    }
}

/// Check that an address has a `host:port` shape with a valid port.
///
/// Host names are not resolved here.
pub fn validate_address(address: &str) -> Result<(), ListenerError> {
    let normalized = normalize_address(address);
    if normalized.parse::<SocketAddr>().is_ok() {
        return Ok(());
    }

    let invalid = |reason: &str| ListenerError::InvalidAddress {
        address: address.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
    };

    let (host, port) = normalized
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok(())
}

/// Resolve an address to the first socket address it names.
pub async fn resolve(address: &str) -> Result<SocketAddr, ListenerError> {
    validate_address(address)?;
    let normalized = normalize_address(address);
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let invalid = |source: io::Error| ListenerError::InvalidAddress {
        address: address.to_string(),
        source,
    };
    let first = tokio::net::lookup_host(normalized.as_str())
        .await
        .map_err(invalid)?
        .next();
    first.ok_or_else(|| invalid(io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")))
}

/// Resolve and bind a listener, returning it with its local address.
pub async fn bind(address: &str) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let addr = resolve(address).await?;
    let bind_error = |source| ListenerError::Bind { address: addr, source };

    let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    tracing::debug!(address = %local_addr, "Listener bound");
    Ok((listener, local_addr))
}
