//! HTTP message types
//!
//! This module defines the core types for HTTP requests and responses.

use super::headers::HeaderMap;
use super::url::Url;
use super::{Error, Result};
use bytes::Bytes;
use std::fmt;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// Parse a method from its textual form
    ///
    /// RFC 2616, 5.1.1: "The method is case-sensitive"
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PATCH" => Ok(Method::Patch),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }

    /// The textual form of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Parse a version from the exact literal `HTTP/1.0` or `HTTP/1.1`
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    /// The textual form of the version
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP status code, valid in 100..=599
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(StatusCode(code))
        } else {
            Err(Error::InvalidStatus(code.to_string()))
        }
    }

    /// Get the numeric code
    pub fn code(self) -> u16 {
        self.0
    }

    /// The canonical reason phrase for this status code
    ///
    /// The server never puts this on the wire; it exists for logging and for
    /// client-side display.
    pub fn reason_phrase(self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }

    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// HTTP request
///
/// Produced by the request parser. All fields are owned, so a request can
/// be moved into a handler freely.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    request_line: String,
}

impl Request {
    pub(crate) fn from_parts(
        method: Method,
        url: Url,
        version: Version,
        headers: HeaderMap,
        request_line: String,
    ) -> Self {
        Request {
            method,
            url,
            version,
            headers,
            body: Bytes::new(),
            request_line,
        }
    }

    /// Get the request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get the parsed request-target
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Set the body
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// The raw request line, for the access log
    pub fn request_line(&self) -> &str {
        &self.request_line
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Create an empty response with the given status
    ///
    /// Responses carry `Connection: close` by default; the server session
    /// makes the actual keep-alive decision from the request.
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        headers.add("Connection", "close");
        Response {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    /// Create a `200 OK` response with a `text/plain` body
    pub fn text(body: impl Into<Bytes>) -> Self {
        Response::content(StatusCode::OK, body, "text/plain")
    }

    /// Create a response with a `text/plain` body
    pub fn status_text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Response::content(status, body, "text/plain")
    }

    /// Create a response with a body of an explicit content type
    pub fn content(status: StatusCode, body: impl Into<Bytes>, content_type: &str) -> Self {
        let mut response = Response::new(status);
        response.headers.add("Content-Type", content_type);
        response.body = body.into();
        response
    }

    pub(crate) fn from_parts(status: StatusCode, headers: HeaderMap) -> Self {
        Response {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    /// Get the status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Set the body
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Serialize the response into wire form
    ///
    /// The status line is `HTTP/1.1 <code>\r\n` with no reason phrase.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 ");
        buf.extend_from_slice(self.status.code().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        self.headers.serialize(buf);
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.body);
    }

    /// Serialize the response into a new buffer
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.body.len());
        self.serialize_into(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("GET").unwrap(), Method::Get);
        assert_eq!(Method::parse("POST").unwrap(), Method::Post);
        assert_eq!(Method::parse("PATCH").unwrap(), Method::Patch);
        assert!(Method::parse("get").is_err());
        assert!(Method::parse("INVALID").is_err());
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(Version::parse("HTTP/1.0").unwrap(), Version::Http10);
        assert_eq!(Version::parse("HTTP/1.1").unwrap(), Version::Http11);
        assert!(Version::parse("HTTP/2.0").is_err());
        assert!(Version::parse("HTTP/1.1 ").is_err());
    }

    #[test]
    fn test_status_code() {
        let status = StatusCode::new(200).unwrap();
        assert_eq!(status.code(), 200);
        assert_eq!(status.reason_phrase(), "OK");
        assert!(status.is_success());
        assert!(!status.is_client_error());

        assert!(StatusCode::new(99).is_err());
        assert!(StatusCode::new(600).is_err());
        assert!(StatusCode::new(599).is_ok());
    }

    #[test]
    fn test_response_default_headers() {
        let response = Response::new(StatusCode::OK);
        assert_eq!(response.headers().get("Connection"), Some("close"));
        assert!(!response.headers().contains("Content-Type"));
    }

    #[test]
    fn test_response_text_content_type() {
        let response = Response::text("hello");
        assert_eq!(response.headers().get("Connection"), Some("close"));
        assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));
        assert_eq!(response.body(), b"hello");
    }

    #[test]
    fn test_response_explicit_content_type() {
        let response = Response::content(StatusCode::OK, "{}", "application/json");
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("application/json")
        );
    }

    #[test]
    fn test_response_serialize_no_reason_phrase() {
        let response = Response::new(StatusCode::NOT_FOUND);
        let wire = String::from_utf8(response.serialize()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 404\r\n"));
        assert!(wire.contains("Connection: close\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_serialize_with_body() {
        let mut response = Response::text("Hi!");
        let content_length = response.body().len().to_string();
        response.headers_mut().add("Content-Length", content_length);
        let wire = String::from_utf8(response.serialize()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200\r\n"));
        assert!(wire.contains("Content-Length: 3\r\n"));
        assert!(wire.ends_with("\r\n\r\nHi!"));
    }
}
