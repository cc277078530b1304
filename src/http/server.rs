//! HTTP server
//!
//! [`Server`] owns the listen socket and the accept loop; every accepted
//! connection becomes a session, a local task running the per-connection
//! state machine: read the request head, read the sized body, dispatch to
//! the handler, write the response, then start over (keep-alive) or tear
//! the connection down.

use super::message::{Request, Response, StatusCode, Version};
use super::parser;
use crate::config::ServerConfig;
use crate::net::{listener, Connection, ConnectionFactory};
use bytes::Bytes;
use metrics::{counter, gauge, histogram};
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info};

const BAD_REQUEST_FIXED: &[u8] = b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n";

/// A request handler
///
/// The handler is shared by reference across all sessions of a server and
/// is invoked once per well-formed request. It never observes malformed
/// requests; those are answered with a fixed 400 before dispatch.
///
/// The [`Responder`] must be used exactly once. It may be stored and
/// invoked later, e.g. from another local task, which suspends the session
/// until the response arrives.
pub trait Handler: 'static {
    fn handle(&self, request: Request, responder: Responder);
}

impl<F> Handler for F
where
    F: Fn(Request, Responder) + 'static,
{
    fn handle(&self, request: Request, responder: Responder) {
        self(request, responder)
    }
}

/// The response sink bound to one in-flight request
///
/// Consuming `respond` makes a second response to the same request a
/// compile error rather than a runtime one.
pub struct Responder {
    sender: oneshot::Sender<Response>,
}

impl Responder {
    fn channel() -> (Responder, oneshot::Receiver<Response>) {
        let (sender, receiver) = oneshot::channel();
        (Responder { sender }, receiver)
    }

    /// Send the response for the request this responder was handed out
    /// with
    pub fn respond(self, response: Response) {
        // The session only drops the receiver when the connection died
        // underneath it; the response has nowhere to go then.
        let _ = self.sender.send(response);
    }
}

/// The keep-alive decision, a pure function of the request
///
/// A `Connection` header containing `close` wins, then one containing
/// `keep-alive`; otherwise HTTP/1.1 defaults to keep-alive and HTTP/1.0
/// to close.
pub fn keep_alive(version: Version, connection_header: Option<&str>) -> bool {
    if let Some(value) = connection_header {
        if value.contains("close") {
            return false;
        }
        if value.contains("keep-alive") {
            return true;
        }
    }
    version == Version::Http11
}

/// HTTP server
///
/// Generic over the handler; the connection factory decides whether
/// sessions run over plain TCP or TLS. Must be driven on a current-thread
/// runtime inside a [`tokio::task::LocalSet`], which is where the sessions
/// are spawned.
pub struct Server<H: Handler> {
    listener: TcpListener,
    factory: ConnectionFactory,
    handler: Rc<H>,
    config: Rc<ServerConfig>,
}

impl<H: Handler> Server<H> {
    /// Bind the listen socket described by `config`
    pub fn bind(factory: ConnectionFactory, handler: H, config: ServerConfig) -> io::Result<Self> {
        let listener = listener::bind(&config)?;
        Ok(Server {
            listener,
            factory,
            handler: Rc::new(handler),
            config: Rc::new(config),
        })
    }

    /// The bound address of the listen socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever
    ///
    /// Accept errors are logged and counted, never fatal. A refused
    /// connection (factory not ready, TLS handshake failure) closes the
    /// accepted socket and the loop continues.
    pub async fn run(self) {
        accept_loop(&self.listener, &self.factory, &self.handler, &self.config).await
    }
}

/// Source of accepted connections: the listen socket in production, a
/// scripted stand-in when tests need to drive the accept-error path.
trait Accept {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

impl Accept for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

async fn accept_loop<A, H>(
    listener: &A,
    factory: &ConnectionFactory,
    handler: &Rc<H>,
    config: &Rc<ServerConfig>,
) where
    A: Accept,
    H: Handler,
{
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                counter!("accept_errors", "reason" => e.kind().to_string()).increment(1);
                error!("error in accept: {}", e);
                continue;
            }
        };
        counter!("connections_accepted").increment(1);

        let Some(connection) = factory.create(stream).await else {
            continue;
        };
        let session = Session::new(
            connection,
            handler.clone(),
            peer.ip().to_string(),
            config.clone(),
        );
        tokio::task::spawn_local(session.run());
    }
}

/// How one request left the session
enum Outcome {
    /// Response sent, connection reusable
    KeepAlive,
    /// Tear down cleanly: shutdown, then close
    Shutdown,
    /// Tear down without shutdown
    Close,
}

/// Per-connection state
///
/// The header buffer is sized to the configured maximum once and reused
/// across requests of a kept-alive connection. The body lives in its own
/// buffer so that accumulating a large body can never move the header
/// bytes a request was parsed from.
struct Session<H: Handler> {
    connection: Connection,
    handler: Rc<H>,
    remote_addr: String,
    config: Rc<ServerConfig>,
    header_buf: Vec<u8>,
    body_buf: Vec<u8>,
    response_buf: Vec<u8>,
}

struct ActiveGauge;

impl ActiveGauge {
    fn new() -> Self {
        gauge!("connections_active").increment(1.0);
        ActiveGauge
    }
}

impl Drop for ActiveGauge {
    fn drop(&mut self) {
        gauge!("connections_active").decrement(1.0);
    }
}

impl<H: Handler> Session<H> {
    fn new(
        connection: Connection,
        handler: Rc<H>,
        remote_addr: String,
        config: Rc<ServerConfig>,
    ) -> Self {
        let header_capacity = config.max_request_header_size;
        let body_capacity = config.max_request_body_size;
        Session {
            connection,
            handler,
            remote_addr,
            config,
            header_buf: Vec::with_capacity(header_capacity),
            body_buf: Vec::with_capacity(body_capacity),
            response_buf: Vec::new(),
        }
    }

    async fn run(mut self) {
        let _active = ActiveGauge::new();
        loop {
            match self.serve_one().await {
                Outcome::KeepAlive => continue,
                Outcome::Shutdown => {
                    self.connection.shutdown().await;
                    break;
                }
                Outcome::Close => break,
            }
        }
        self.connection.close();
    }

    fn access_log(&self, request_line: &str, status: StatusCode, content_length: usize) {
        if self.config.access_log {
            info!(
                target: "access",
                "{} \"{}\" {} {}",
                self.remote_addr,
                request_line,
                status.code(),
                content_length
            );
        }
    }

    /// Serve a single request: the session state machine from the first
    /// header recv to the last send
    async fn serve_one(&mut self) -> Outcome {
        let request_start = Instant::now();
        // One absolute deadline spans all header and body reads of this
        // request, so a trickling peer cannot hold the session open.
        let deadline = request_start + self.config.full_read_timeout;

        self.header_buf.clear();
        self.header_buf.resize(self.config.max_request_header_size, 0);
        let read = match self
            .connection
            .recv_deadline(&mut self.header_buf, deadline)
            .await
        {
            Ok(0) => return Outcome::Close,
            Ok(n) => n,
            Err(e) if e.is_timeout() => {
                debug!("request header read timed out");
                return Outcome::Shutdown;
            }
            Err(e) => {
                counter!("recv_errors", "reason" => e.to_string()).increment(1);
                error!("error in recv (headers): {}", e);
                return Outcome::Close;
            }
        };
        self.header_buf.truncate(read);

        let (mut request, body_start) =
            match parser::parse_request(&self.header_buf, self.config.max_url_length) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("request parse failed: {}", e);
                    self.access_log("INVALID REQUEST", StatusCode::BAD_REQUEST, 0);
                    counter!("request_errors", "kind" => "parse error").increment(1);
                    return self.send_fixed_bad_request().await;
                }
            };

        if let Some(content_length) = request.headers().get("Content-Length") {
            let Ok(length) = content_length.parse::<u64>() else {
                self.access_log("INVALID REQUEST (Content-Length)", StatusCode::BAD_REQUEST, 0);
                counter!("request_errors", "kind" => "invalid length").increment(1);
                return self.send_fixed_bad_request().await;
            };
            if length > self.config.max_request_body_size as u64 {
                self.access_log("INVALID REQUEST (body size)", StatusCode::BAD_REQUEST, 0);
                counter!("request_errors", "kind" => "body too large").increment(1);
                return self.send_fixed_bad_request().await;
            }
            let length = length as usize;
            let fragment = &self.header_buf[body_start..];
            if fragment.len() < length {
                self.body_buf.clear();
                self.body_buf.extend_from_slice(fragment);
                if let Some(outcome) = self.read_body(length, deadline).await {
                    return outcome;
                }
                request.set_body(Bytes::copy_from_slice(&self.body_buf));
            } else {
                request.set_body(Bytes::copy_from_slice(&fragment[..length]));
            }
        }

        self.dispatch(request, request_start).await
    }

    /// Receive until the body buffer holds `length` bytes, or report the
    /// tear-down outcome
    async fn read_body(&mut self, length: usize, deadline: Instant) -> Option<Outcome> {
        while self.body_buf.len() < length {
            let start = self.body_buf.len();
            self.body_buf.resize(length, 0);
            let read = match self
                .connection
                .recv_deadline(&mut self.body_buf[start..], deadline)
                .await
            {
                Ok(0) => return Some(Outcome::Close),
                Ok(n) => n,
                Err(e) if e.is_timeout() => {
                    debug!("request body read timed out");
                    return Some(Outcome::Shutdown);
                }
                Err(e) => {
                    counter!("recv_errors", "reason" => e.to_string()).increment(1);
                    error!("error in recv (body): {}", e);
                    return Some(Outcome::Close);
                }
            };
            self.body_buf.truncate(start + read);
        }
        None
    }

    /// Hand the request to the handler, await its response, and send it
    async fn dispatch(&mut self, request: Request, request_start: Instant) -> Outcome {
        let method = request.method().as_str();
        let path = request.url().path().to_string();
        counter!("requests_total", "method" => method, "path" => path.clone()).increment(1);
        histogram!("request_header_bytes", "method" => method, "path" => path.clone())
            .record(self.header_buf.len() as f64);
        histogram!("request_body_bytes", "method" => method, "path" => path.clone())
            .record(request.body().len() as f64);

        let reuse = keep_alive(request.version(), request.headers().get("Connection"));
        let request_line = request.request_line().to_string();

        let (responder, receiver) = Responder::channel();
        self.handler.handle(request, responder);
        let mut response = match receiver.await {
            Ok(response) => response,
            Err(_) => {
                error!("handler dropped the responder without responding");
                counter!("request_errors", "kind" => "no response").increment(1);
                return Outcome::Close;
            }
        };

        self.access_log(&request_line, response.status(), response.body().len());

        if !response.body().is_empty() && !response.headers().contains("Content-Length") {
            let content_length = response.body().len().to_string();
            response.headers_mut().add("Content-Length", content_length);
        }
        self.response_buf.clear();
        response.serialize_into(&mut self.response_buf);

        let outcome = self.send_response_buf().await;

        let status = response.status().code().to_string();
        histogram!("request_duration_seconds", "method" => method, "path" => path.clone())
            .record(request_start.elapsed().as_secs_f64());
        counter!("responses_total", "method" => method, "path" => path.clone(), "status" => status.clone())
            .increment(1);
        histogram!("response_bytes", "method" => method, "path" => path, "status" => status)
            .record(self.response_buf.len() as f64);

        match outcome {
            Some(outcome) => outcome,
            None if reuse => Outcome::KeepAlive,
            None => Outcome::Shutdown,
        }
    }

    /// Send the serialized response, re-issuing on partial writes.
    /// `None` means the whole buffer went out.
    async fn send_response_buf(&mut self) -> Option<Outcome> {
        let mut sent = 0;
        while sent < self.response_buf.len() {
            match self.connection.send(&self.response_buf[sent..]).await {
                // For TLS a zero-byte send happens when the peer closed
                // the connection during a recv that is part of the write;
                // shutdown is not possible anymore, so just close.
                Ok(0) => return Some(Outcome::Close),
                Ok(n) => sent += n,
                Err(e) => {
                    counter!("send_errors", "reason" => e.to_string()).increment(1);
                    error!("error in send: {}", e);
                    return Some(Outcome::Close);
                }
            }
        }
        None
    }

    /// Answer an unparseable request with the fixed 400 bytes
    async fn send_fixed_bad_request(&mut self) -> Outcome {
        self.response_buf.clear();
        self.response_buf.extend_from_slice(BAD_REQUEST_FIXED);
        match self.send_response_buf().await {
            Some(outcome) => outcome,
            None => Outcome::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{
        Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct TestCounter(AtomicU64);

    impl CounterFn for TestCounter {
        fn increment(&self, value: u64) {
            self.0.fetch_add(value, Ordering::SeqCst);
        }

        fn absolute(&self, value: u64) {
            self.0.store(value, Ordering::SeqCst);
        }
    }

    /// Records counters by name so tests can assert on the metric events;
    /// gauges and histograms are discarded.
    #[derive(Default)]
    struct TestRecorder {
        counters: Mutex<HashMap<String, Arc<TestCounter>>>,
    }

    impl TestRecorder {
        fn counter_value(&self, name: &str) -> u64 {
            self.counters
                .lock()
                .unwrap()
                .get(name)
                .map(|counter| counter.0.load(Ordering::SeqCst))
                .unwrap_or(0)
        }
    }

    impl Recorder for TestRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let mut counters = self.counters.lock().unwrap();
            let counter = counters.entry(key.name().to_string()).or_default().clone();
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    /// Fails with the scripted errors first, then hands out connections
    /// from the real listener.
    struct ScriptedAccept {
        failures: RefCell<Vec<io::Error>>,
        listener: TcpListener,
    }

    impl Accept for ScriptedAccept {
        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            if let Some(error) = self.failures.borrow_mut().pop() {
                return Err(error);
            }
            TcpListener::accept(&self.listener).await
        }
    }

    #[test]
    fn test_accept_error_is_counted_and_loop_continues() {
        let recorder = TestRecorder::default();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let scripted = ScriptedAccept {
                failures: RefCell::new(vec![io::Error::new(
                    io::ErrorKind::Other,
                    "too many open files",
                )]),
                listener,
            };

            let handler = Rc::new(|_request: Request, responder: Responder| {
                responder.respond(Response::text("ok"));
            });
            let factory = ConnectionFactory::Plain;
            let config = Rc::new(ServerConfig::default());

            let client = tokio::task::spawn_local(async move {
                let mut stream = TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                    .await
                    .unwrap();
                let mut buf = vec![0u8; 1024];
                let n = stream.read(&mut buf).await.unwrap();
                assert!(buf[..n].starts_with(b"HTTP/1.1 200\r\n"));
            });

            // The loop never returns; give it long enough to swallow the
            // scripted failure and then serve the client's connection.
            let capped = tokio::time::timeout(
                Duration::from_millis(500),
                accept_loop(&scripted, &factory, &handler, &config),
            );
            assert!(capped.await.is_err());

            client.await.unwrap();
        });

        assert_eq!(recorder.counter_value("accept_errors"), 1);
        assert_eq!(recorder.counter_value("connections_accepted"), 1);
    }

    #[test]
    fn test_keep_alive_version_default() {
        assert!(keep_alive(Version::Http11, None));
        assert!(!keep_alive(Version::Http10, None));
    }

    #[test]
    fn test_keep_alive_close_wins() {
        assert!(!keep_alive(Version::Http11, Some("close")));
        assert!(!keep_alive(Version::Http10, Some("close")));
        // "close" wins even when both tokens appear
        assert!(!keep_alive(Version::Http11, Some("keep-alive, close")));
    }

    #[test]
    fn test_keep_alive_token() {
        assert!(keep_alive(Version::Http10, Some("keep-alive")));
        assert!(keep_alive(Version::Http11, Some("keep-alive")));
    }

    #[test]
    fn test_keep_alive_unrelated_header_value() {
        assert!(keep_alive(Version::Http11, Some("upgrade")));
        assert!(!keep_alive(Version::Http10, Some("upgrade")));
    }

    #[test]
    fn test_responder_is_single_use() {
        let (responder, mut receiver) = Responder::channel();
        responder.respond(Response::new(StatusCode::OK));
        // respond consumed the responder; the channel holds exactly one
        // response
        assert_eq!(
            receiver.try_recv().unwrap().status(),
            StatusCode::OK
        );
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_fixed_bad_request_bytes_are_a_valid_response() {
        let (response, body_start) = parser::parse_response(BAD_REQUEST_FIXED).unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get("Connection"), Some("close"));
        assert_eq!(body_start, BAD_REQUEST_FIXED.len());
    }
}
