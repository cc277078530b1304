//! Listen socket setup

use crate::config::ServerConfig;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use tokio::net::{TcpListener, TcpSocket};

/// Create the TCP listen socket from the server configuration
///
/// SO_REUSEADDR is set so that restarts do not trip over sockets in
/// TIME_WAIT. Must be called from within a tokio runtime.
pub fn bind(config: &ServerConfig) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::V4(SocketAddrV4::new(
        config.listen_address,
        config.listen_port,
    )))?;
    socket.listen(config.listen_backlog)
}
