//! wharf - a single-threaded, completion-driven HTTP/1.1 server and client.
//!
//! This crate provides the core of a small HTTP/1.1 service: a strict
//! message parser over byte buffers, a per-connection server session state
//! machine, a client session, and a transport abstraction that lets the
//! same session code run over plain TCP and TLS.
//!
//! # Architecture
//!
//! All I/O runs on one event loop: a current-thread tokio runtime driving a
//! [`tokio::task::LocalSet`]. Each accepted connection becomes a local task
//! that owns its buffers and its transport; the sequential awaits of that
//! task are the transitions of the session state machine. Nothing is shared
//! across threads, so handlers and configuration are passed around as plain
//! `Rc`s.
//!
//! # Examples
//!
//! ```no_run
//! use wharf::{Responder, Request, Response, Server, ServerConfig};
//! use wharf::net::ConnectionFactory;
//!
//! fn main() -> std::io::Result<()> {
//!     let rt = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     let local = tokio::task::LocalSet::new();
//!     local.block_on(&rt, async {
//!         let handler = |request: Request, responder: Responder| {
//!             let body = format!("hello from {}", request.url().path());
//!             responder.respond(Response::text(body));
//!         };
//!         let server =
//!             Server::bind(ConnectionFactory::Plain, handler, ServerConfig::default())?;
//!         server.run().await;
//!         Ok(())
//!     })
//! }
//! ```

pub mod config;
pub mod http;
pub mod net;

pub use config::ServerConfig;
pub use http::client::ClientSession;
pub use http::headers::HeaderMap;
pub use http::message::{Method, Request, Response, StatusCode, Version};
pub use http::server::{Handler, Responder, Server};
pub use http::url::Url;
