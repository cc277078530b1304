//! Server configuration
//!
//! Configuration is plain data passed explicitly to [`Server::bind`]
//! (crate::http::server::Server::bind) and threaded into each session at
//! construction. There is no global config state.

use std::net::Ipv4Addr;
use std::time::Duration;

/// Configuration for a [`Server`](crate::http::server::Server).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the listen socket.
    pub listen_address: Ipv4Addr,
    /// Port of the listen socket.
    pub listen_port: u16,
    /// Backlog passed to listen(2).
    pub listen_backlog: u32,
    /// Absolute deadline spanning all header and body reads of one request.
    pub full_read_timeout: Duration,
    /// Maximum size of the request line plus all headers, in bytes.
    pub max_request_header_size: usize,
    /// Maximum size of a request body, in bytes.
    pub max_request_body_size: usize,
    /// Maximum length of the request-target, in bytes.
    pub max_url_length: usize,
    /// Whether to emit an access log line per request.
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: Ipv4Addr::UNSPECIFIED,
            listen_port: 6969,
            listen_backlog: 1024,
            full_read_timeout: Duration::from_millis(1000),
            max_request_header_size: 1024,
            max_request_body_size: 1024,
            max_url_length: 512,
            access_log: true,
        }
    }
}
