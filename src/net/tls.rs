//! TLS contexts
//!
//! This module builds the OpenSSL contexts for both sides of a TLS
//! connection and performs the async handshakes. The server-side context
//! is installed into a [`TlsAcceptor`] that may start out empty: until a
//! certificate is installed the connection factory refuses connections,
//! and the context can be swapped at runtime (certificate reload).

use openssl::pkey::PKey;
use openssl::ssl::{
    Ssl, SslAcceptor, SslConnector, SslContext, SslFiletype, SslMethod, SslVerifyMode,
};
use openssl::x509::X509;
use std::cell::RefCell;
use std::path::Path;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Server-side TLS context holder
///
/// Starts empty or from certificate material; `install` swaps the context
/// at any time. The connection factory asks for the current context per
/// accepted connection, so a swap affects only connections accepted after
/// it.
pub struct TlsAcceptor {
    context: RefCell<Option<SslContext>>,
}

impl TlsAcceptor {
    /// Create an acceptor with no certificate installed
    ///
    /// The connection factory refuses connections until `install` is
    /// called.
    pub fn empty() -> Self {
        TlsAcceptor {
            context: RefCell::new(None),
        }
    }

    /// Create an acceptor from PEM-encoded certificate chain and private
    /// key
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let acceptor = TlsAcceptor::empty();
        acceptor.install(cert_pem, key_pem)?;
        Ok(acceptor)
    }

    /// Create an acceptor from PEM files on disk
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, TlsError> {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server())?;
        builder.set_certificate_chain_file(cert_path)?;
        builder.set_private_key_file(key_path, SslFiletype::PEM)?;
        builder.check_private_key()?;
        let acceptor = TlsAcceptor::empty();
        *acceptor.context.borrow_mut() = Some(builder.build().into_context());
        Ok(acceptor)
    }

    /// Install (or replace) the certificate material
    pub fn install(&self, cert_pem: &[u8], key_pem: &[u8]) -> Result<(), TlsError> {
        let cert = X509::from_pem(cert_pem)?;
        let key = PKey::private_key_from_pem(key_pem)?;
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server())?;
        builder.set_certificate(&cert)?;
        builder.set_private_key(&key)?;
        builder.check_private_key()?;
        *self.context.borrow_mut() = Some(builder.build().into_context());
        Ok(())
    }

    /// Whether a certificate is currently installed
    pub fn is_ready(&self) -> bool {
        self.context.borrow().is_some()
    }

    /// Perform the server-side handshake on an accepted stream
    ///
    /// Returns `None` when no context is installed (factory not ready).
    pub(crate) async fn accept(
        &self,
        stream: TcpStream,
    ) -> Option<Result<SslStream<TcpStream>, TlsError>> {
        let context = self.context.borrow().as_ref().cloned()?;
        Some(handshake_accept(&context, stream).await)
    }
}

async fn handshake_accept(
    context: &SslContext,
    stream: TcpStream,
) -> Result<SslStream<TcpStream>, TlsError> {
    let ssl = Ssl::new(context)?;
    let mut stream = SslStream::new(ssl, stream)?;
    Pin::new(&mut stream)
        .accept()
        .await
        .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;
    Ok(stream)
}

/// Client-side TLS context
pub struct TlsConnector {
    connector: SslConnector,
    verify: bool,
}

impl TlsConnector {
    /// Create a connector that verifies the peer certificate against the
    /// system trust store
    pub fn new() -> Result<Self, TlsError> {
        let connector = SslConnector::builder(SslMethod::tls_client())?.build();
        Ok(TlsConnector {
            connector,
            verify: true,
        })
    }

    /// Create a connector that skips certificate verification
    ///
    /// Only for talking to servers with self-signed certificates, e.g. in
    /// tests.
    pub fn without_verification() -> Result<Self, TlsError> {
        let connector = SslConnector::builder(SslMethod::tls_client())?.build();
        Ok(TlsConnector {
            connector,
            verify: false,
        })
    }

    /// Perform the client-side handshake, sending `hostname` as SNI
    pub(crate) async fn connect(
        &self,
        hostname: &str,
        stream: TcpStream,
    ) -> Result<SslStream<TcpStream>, TlsError> {
        let mut config = self.connector.configure()?;
        if !self.verify {
            config.set_verify(SslVerifyMode::NONE);
            config.set_verify_hostname(false);
        }
        let ssl = config.into_ssl(hostname)?;
        let mut stream = SslStream::new(ssl, stream)?;
        Pin::new(&mut stream)
            .connect()
            .await
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;
        Ok(stream)
    }
}
