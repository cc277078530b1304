//! Transport abstraction
//!
//! [`Connection`] gives the HTTP layer one completion-style interface over
//! plain TCP and TLS: `recv` (with an optional absolute deadline), `send`,
//! `shutdown` and `close`. The session code never branches on the
//! transport.

use super::tls::{TlsAcceptor, TlsConnector};
use super::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_openssl::SslStream;
use tracing::debug;

/// A connected transport, plain or TLS
pub enum Connection {
    Tcp(TcpStream),
    Tls(SslStream<TcpStream>),
}

impl Connection {
    /// Receive into `buf`
    ///
    /// Completes with at least 1 byte, 0 on peer EOF, or an error. The
    /// buffer is exclusively borrowed until completion.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Connection::Tcp(stream) => stream.read(buf).await?,
            Connection::Tls(stream) => stream.read(buf).await?,
        };
        Ok(n)
    }

    /// Receive into `buf` with an absolute deadline
    ///
    /// On expiry the pending receive is cancelled and the call completes
    /// with [`Error::TimedOut`], which callers treat as a clean tear-down
    /// trigger rather than a transport failure.
    pub async fn recv_deadline(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize> {
        match tokio::time::timeout_at(deadline, self.recv(buf)).await {
            Ok(result) => result,
            Err(_) => Err(Error::TimedOut),
        }
    }

    /// Send a prefix of `buf`
    ///
    /// Partial writes are normal; completes with the number of bytes
    /// accepted by the transport.
    pub async fn send(&mut self, buf: &[u8]) -> Result<usize> {
        let n = match self {
            Connection::Tcp(stream) => stream.write(buf).await?,
            Connection::Tls(stream) => stream.write(buf).await?,
        };
        Ok(n)
    }

    /// Shut down the transport
    ///
    /// For TLS this performs the close-notify exchange, for TCP a write
    /// half-close. There is no way to recover from a failure here, so
    /// errors are logged and swallowed; the caller closes either way.
    pub async fn shutdown(&mut self) {
        let result = match self {
            Connection::Tcp(stream) => stream.shutdown().await,
            Connection::Tls(stream) => stream.shutdown().await,
        };
        if let Err(e) = result {
            debug!("error in shutdown: {}", e);
        }
    }

    /// Release the transport unconditionally
    pub fn close(self) {
        drop(self);
    }
}

/// Creates the transport for an accepted connection
///
/// The factory may refuse: the TLS variant produces no connection while no
/// certificate is installed, and on handshake failure. The caller then
/// drops the accepted stream, which closes the socket.
pub enum ConnectionFactory {
    Plain,
    Tls(TlsAcceptor),
}

impl ConnectionFactory {
    /// Wrap an accepted stream, or refuse it
    pub async fn create(&self, stream: TcpStream) -> Option<Connection> {
        match self {
            ConnectionFactory::Plain => Some(Connection::Tcp(stream)),
            ConnectionFactory::Tls(acceptor) => match acceptor.accept(stream).await {
                None => {
                    debug!("no TLS context installed, refusing connection");
                    None
                }
                Some(Err(e)) => {
                    debug!("TLS handshake failed: {}", e);
                    None
                }
                Some(Ok(stream)) => Some(Connection::Tls(stream)),
            },
        }
    }
}

/// Connect to `addr` and wrap the stream, performing the TLS handshake
/// with `hostname` as SNI when a connector is given
pub(crate) async fn connect(
    addr: std::net::SocketAddr,
    tls: Option<(&TlsConnector, &str)>,
) -> Result<Connection> {
    let stream = TcpStream::connect(addr).await?;
    match tls {
        None => Ok(Connection::Tcp(stream)),
        Some((connector, hostname)) => {
            let stream = connector.connect(hostname, stream).await?;
            Ok(Connection::Tls(stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn run_local<F: std::future::Future>(future: F) -> F::Output {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(future)
    }

    #[test]
    fn test_tcp_recv_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"World");
        });

        run_local(async move {
            let mut connection = connect(addr, None).await.unwrap();
            let mut buf = [0u8; 16];
            let n = connection.recv(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"Hello");

            let mut sent = 0;
            while sent < 5 {
                sent += connection.send(&b"World"[sent..]).await.unwrap();
            }
            connection.close();
        });

        handle.join().unwrap();
    }

    #[test]
    fn test_recv_deadline_expiry() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            // Send nothing until the deadline has long expired
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        run_local(async move {
            let mut connection = connect(addr, None).await.unwrap();
            let deadline = Instant::now() + Duration::from_millis(50);
            let mut buf = [0u8; 16];
            let result = connection.recv_deadline(&mut buf, deadline).await;
            assert!(matches!(result, Err(ref e) if e.is_timeout()));
        });

        handle.join().unwrap();
    }

    #[test]
    fn test_recv_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        run_local(async move {
            let mut connection = connect(addr, None).await.unwrap();
            let mut buf = [0u8; 16];
            let n = connection.recv(&mut buf).await.unwrap();
            assert_eq!(n, 0);
        });

        handle.join().unwrap();
    }
}
