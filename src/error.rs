//! Crate-wide error type.
//!
//! Every notifier channel carries a [`Error`] reference, and route callbacks
//! return `Result<(), Error>`, so the per-module enums below all convert into
//! it via `#[from]`.

use thiserror::Error as ThisError;

use crate::http::request::ParseError;
use crate::http::response::SendError;
use crate::server::ServerError;

/// Any failure the server can observe or hand to a listener.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Transport-level failure on a socket, including an elapsed deadline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The inbound request violated the wire protocol.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A response write violated the send-ordering discipline, or failed on
    /// the wire.
    #[error(transparent)]
    Send(#[from] SendError),

    /// The accept loop died.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A route callback failed with an application-level error.
    #[error("{0}")]
    Handler(String),
}

impl Error {
    /// Wraps an application-level failure raised inside a route callback.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}
