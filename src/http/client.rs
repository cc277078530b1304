//! HTTP client
//!
//! [`ClientSession`] drives one request at a time against one origin:
//! resolve, connect (with SNI for TLS), send, receive, parse. An
//! established connection is kept and reused for the next request;
//! pipelining is ruled out by `&mut self`.

use super::headers::HeaderMap;
use super::message::{Method, Response};
use super::parser;
use super::{Error, Result, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use crate::net::tls::TlsConnector;
use crate::net::{transport, Connection};
use bytes::BytesMut;
use tracing::debug;

/// Size of the buffer for the first receive of a response
const RESPONSE_RECV_LEN: usize = 1024;

/// Serialize a request head and body into wire form
///
/// `METHOD SP target SP HTTP/1.1\r\n`, the headers in insertion order, an
/// empty line, then the body. The caller supplies `Content-Length` when a
/// body is present.
pub fn serialize_request(
    method: Method,
    target: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Vec<u8> {
    let mut wire = Vec::with_capacity(512 + body.len());
    wire.extend_from_slice(method.as_str().as_bytes());
    wire.push(b' ');
    wire.extend_from_slice(target.as_bytes());
    wire.extend_from_slice(b" HTTP/1.1\r\n");
    headers.serialize(&mut wire);
    wire.extend_from_slice(b"\r\n");
    wire.extend_from_slice(body);
    wire
}

/// HTTP client session
///
/// # Examples
///
/// ```no_run
/// use wharf::http::client::ClientSession;
/// use wharf::http::headers::HeaderMap;
/// use wharf::http::message::Method;
///
/// # async fn run() -> wharf::http::Result<()> {
/// let mut client = ClientSession::new("example.org", 80);
/// let response = client
///     .request(Method::Get, "/", &HeaderMap::new(), b"")
///     .await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
pub struct ClientSession {
    host: String,
    port: u16,
    tls: Option<TlsConnector>,
    connection: Option<Connection>,
}

impl ClientSession {
    /// Create a session for plain HTTP against `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientSession {
            host: host.into(),
            port,
            tls: None,
            connection: None,
        }
    }

    /// Create a session for HTTP over TLS against `host:port`
    ///
    /// The host name is sent as SNI during the handshake.
    pub fn with_tls(host: impl Into<String>, port: u16, connector: TlsConnector) -> Self {
        ClientSession {
            host: host.into(),
            port,
            tls: Some(connector),
            connection: None,
        }
    }

    fn default_port(&self) -> u16 {
        if self.tls.is_some() {
            DEFAULT_HTTPS_PORT
        } else {
            DEFAULT_HTTP_PORT
        }
    }

    /// Perform one request
    ///
    /// A `Host` header is added when the supplied headers lack one, with
    /// the port omitted when it is the default for the transport. The
    /// response body is read until `Content-Length` is satisfied.
    pub async fn request(
        &mut self,
        method: Method,
        target: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Response> {
        let wire = self.serialize(method, target, headers, body);
        debug!("request: {} {}", method, target);

        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => self.establish().await?,
        };

        match Self::exchange(&mut connection, &wire).await {
            Ok(response) => {
                self.connection = Some(connection);
                Ok(response)
            }
            Err(e) => {
                connection.close();
                Err(e)
            }
        }
    }

    fn serialize(
        &self,
        method: Method,
        target: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Vec<u8> {
        if headers.contains("Host") {
            return serialize_request(method, target, headers, body);
        }
        let mut host = self.host.clone();
        if self.port != self.default_port() {
            host.push(':');
            host.push_str(&self.port.to_string());
        }
        let mut effective = HeaderMap::new();
        effective.add("Host", host);
        for (name, value) in headers.iter() {
            effective.add(name, value);
        }
        serialize_request(method, target, &effective, body)
    }

    /// Resolve the host and connect, performing the TLS handshake when
    /// configured
    async fn establish(&self) -> Result<Connection> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                debug!("resolving {} failed: {}", self.host, e);
                Error::HostUnreachable(self.host.clone())
            })?;
        let addr = addrs
            .next()
            .ok_or_else(|| Error::HostUnreachable(self.host.clone()))?;

        let tls = self
            .tls
            .as_ref()
            .map(|connector| (connector, self.host.as_str()));
        Ok(transport::connect(addr, tls).await?)
    }

    async fn exchange(connection: &mut Connection, wire: &[u8]) -> Result<Response> {
        let mut sent = 0;
        while sent < wire.len() {
            let n = connection.send(&wire[sent..]).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            sent += n;
        }

        let mut buf = vec![0u8; RESPONSE_RECV_LEN];
        let read = connection.recv(&mut buf).await?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        buf.truncate(read);

        let (mut response, body_start) = parser::parse_response(&buf)?;
        let mut body = BytesMut::from(&buf[body_start..]);

        if let Some(content_length) = response.headers().get("Content-Length") {
            let length = content_length
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("invalid Content-Length: {content_length}")))?;
            while body.len() < length {
                let start = body.len();
                body.resize(length, 0);
                let n = connection.recv(&mut body[start..]).await?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
                body.truncate(start + n);
            }
            body.truncate(length);
        }

        response.set_body(body.freeze());
        Ok(response)
    }

    /// Drop the established connection, if any
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::message::Version;

    #[test]
    fn test_serialize_request() {
        let mut headers = HeaderMap::new();
        headers.add("Host", "example.org");
        headers.add("Accept", "*/*");
        let wire = serialize_request(Method::Get, "/index.html", &headers, b"");
        assert_eq!(
            wire,
            b"GET /index.html HTTP/1.1\r\nHost: example.org\r\nAccept: */*\r\n\r\n"
        );
    }

    #[test]
    fn test_serialize_request_with_body() {
        let mut headers = HeaderMap::new();
        headers.add("Content-Length", "5");
        let wire = serialize_request(Method::Post, "/p", &headers, b"hello");
        assert!(wire.ends_with(b"\r\n\r\nhello"));
    }

    #[test]
    fn test_host_header_added_with_port() {
        let client = ClientSession::new("example.org", 8080);
        let wire = client.serialize(Method::Get, "/", &HeaderMap::new(), b"");
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Host: example.org:8080\r\n"));
    }

    #[test]
    fn test_host_header_omits_default_port() {
        let client = ClientSession::new("example.org", 80);
        let wire = client.serialize(Method::Get, "/", &HeaderMap::new(), b"");
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Host: example.org\r\n"));
        assert!(!text.contains("Host: example.org:80"));
    }

    #[test]
    fn test_supplied_host_header_wins() {
        let client = ClientSession::new("example.org", 80);
        let mut headers = HeaderMap::new();
        headers.add("Host", "other.example");
        let wire = client.serialize(Method::Get, "/", &headers, b"");
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Host: other.example\r\n"));
        assert!(!text.contains("example.org"));
    }

    #[test]
    fn test_request_round_trip() {
        let body = b"payload bytes";
        let mut headers = HeaderMap::new();
        headers.add("Host", "example.org");
        headers.add("X-Trace", "abc 123");
        headers.add("Content-Length", body.len().to_string());

        let wire = serialize_request(Method::Put, "/a/b?q=1", &headers, body);
        let (request, body_start) = parser::parse_request(&wire, 512).unwrap();

        assert_eq!(request.method(), Method::Put);
        assert_eq!(request.version(), Version::Http11);
        assert_eq!(request.url().full_raw(), "/a/b?q=1");
        assert_eq!(request.url().path(), "/a/b");
        assert_eq!(request.url().query(), Some("q=1"));
        assert_eq!(request.headers().get("Host"), Some("example.org"));
        assert_eq!(request.headers().get("X-Trace"), Some("abc 123"));
        assert_eq!(&wire[body_start..], body);
    }
}
