//! HTTP/1.1 implementation
//!
//! This module provides the HTTP/1.1 message types, parsers, the server
//! session state machine and the client session.
//!
//! # Architecture
//!
//! The server and client share one transport abstraction
//! ([`crate::net::Connection`]) so that all HTTP code is transparent to the
//! underlying transport (plain TCP or TLS):
//!
//! - [`server::Server`] owns the listen socket and spawns one local task
//!   per accepted connection, each running the session state machine
//! - [`client::ClientSession`] is the per-request client state machine
//!
//! # Examples
//!
//! ```no_run
//! use wharf::http::client::ClientSession;
//! use wharf::http::headers::HeaderMap;
//! use wharf::http::message::Method;
//!
//! # async fn run() -> wharf::http::Result<()> {
//! let mut client = ClientSession::new("localhost", 8080);
//! let response = client
//!     .request(Method::Get, "/", &HeaderMap::new(), b"")
//!     .await?;
//! assert_eq!(response.status().code(), 200);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod server;
pub mod url;

pub use client::ClientSession;
pub use headers::HeaderMap;
pub use message::{Method, Request, Response, StatusCode, Version};
pub use server::{Handler, Responder, Server};
pub use url::Url;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] crate::net::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid request target: {0}")]
    InvalidUrl(String),

    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    #[error("connection closed")]
    ConnectionClosed,
}

/// Default port for plain HTTP
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default port for HTTP over TLS
pub const DEFAULT_HTTPS_PORT: u16 = 443;
