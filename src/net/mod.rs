//! Network transports
//!
//! This module provides the listen socket, the TLS contexts, and the
//! [`Connection`] abstraction that gives the HTTP layer one uniform
//! send/recv/shutdown/close interface over plain TCP and TLS.

pub mod listener;
pub mod tls;
pub mod transport;

pub use transport::{Connection, ConnectionFactory};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    /// A deadline expired and cancelled the pending operation. Kept
    /// distinct from I/O errors: the session tears down cleanly (shutdown,
    /// then close) instead of just closing.
    #[error("operation timed out")]
    TimedOut,
}

impl Error {
    /// Whether this error is a deadline expiry rather than a transport
    /// failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut)
    }
}
