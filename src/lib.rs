//! # soloserve
//!
//! A from-scratch HTTP/1.x server core built directly on TCP sockets. The
//! request line and headers are tokenized byte by byte, responses are written
//! through a status → headers → body locking discipline, and every accepted
//! connection serves exactly one request/response exchange before it is
//! closed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use soloserve::{Error, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut server = Server::create(8080);
//!     server.on_request("GET", "/", |_request, mut response| async move {
//!         let sent = response.send_text("hello world").await;
//!         (response, sent.map_err(Error::from))
//!     });
//!     server.start().await
//! }
//! ```

pub mod error;
pub mod http;
pub mod notify;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use error::Error;
pub use http::request::ParseError;
pub use http::response::SendError;
pub use http::{Headers, Method, Request, Response};
pub use notify::Notifier;
pub use server::{Server, ServerError};
