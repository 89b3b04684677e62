//! Outbound response serialization under the send-ordering discipline.
//!
//! A [`Response`] writes straight to the connection and enforces HTTP's
//! status → headers → body ordering with two monotonic locks instead of a
//! state enum: `status_locked` is set by the first status write and
//! `headers_locked` by the first body write. Once set, a lock is never
//! cleared; each response is single-use.
//!
//! On the wire the status line carries no terminator of its own, each header
//! is written as `\n<key>: <value>`, and the first body write emits the
//! `\n\n` separator before the payload.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::reason_phrase;

/// Deadline applied to each write when none is configured.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced by the response writer.
///
/// The lock and unknown-code variants are programming errors in the caller,
/// not transport failures; the first write to reach the wire wins and later
/// violations leave the already-sent bytes untouched.
#[derive(Debug, Error)]
pub enum SendError {
    /// The status line was already written.
    #[error("status is locked")]
    StatusLocked,

    /// The body separator was already written.
    #[error("headers are locked")]
    HeadersLocked,

    /// No reason phrase was supplied and the code has no canonical one.
    #[error("unknown status code {0}")]
    UnknownStatusCode(u16),

    /// The JSON body could not be serialized.
    #[error("failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// The write failed on the wire, an elapsed deadline included.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writer for exactly one HTTP/1.x response.
///
/// Bound to the write half of a connection and to the protocol version of
/// the request it answers. Nothing reaches the wire until the first send
/// call, so a connection with no matching route closes without a single
/// response byte.
pub struct Response {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    version: String,
    write_timeout: Duration,
    status_locked: bool,
    headers_locked: bool,
}

impl Response {
    /// Binds a response to `writer`, echoing the protocol `version` of the
    /// request it answers.
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static, version: impl Into<String>) -> Self {
        Self {
            writer: Box::new(writer),
            version: version.into(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            status_locked: false,
            headers_locked: false,
        }
    }

    /// Replaces the per-write deadline (default 10 s).
    #[must_use]
    pub fn with_write_timeout(mut self, deadline: Duration) -> Self {
        self.write_timeout = deadline;
        self
    }

    /// `true` once the status line has been written.
    pub fn status_locked(&self) -> bool {
        self.status_locked
    }

    /// `true` once the body separator has been written.
    pub fn headers_locked(&self) -> bool {
        self.headers_locked
    }

    /// Writes the status line `"<version> <code> <reason>"` and sets the
    /// status lock. No line terminator is appended; header and body writes
    /// bring their own line breaks.
    ///
    /// An empty `reason` is resolved from the canonical reason-phrase table.
    ///
    /// # Errors
    ///
    /// - [`SendError::StatusLocked`] — the status line was already sent.
    /// - [`SendError::UnknownStatusCode`] — `reason` is empty and `code` has
    ///   no canonical phrase.
    /// - [`SendError::Io`] — the write failed.
    pub async fn send_status(&mut self, code: u16, reason: &str) -> Result<(), SendError> {
        if self.status_locked {
            return Err(SendError::StatusLocked);
        }
        let reason = if reason.is_empty() {
            reason_phrase(code).ok_or(SendError::UnknownStatusCode(code))?
        } else {
            reason
        };
        let line = format!("{} {} {}", self.version, code, reason);
        self.write_all(line.as_bytes()).await?;
        self.status_locked = true;
        Ok(())
    }

    /// Writes one header line, sending a default `200 OK` status first if
    /// none has been sent.
    ///
    /// # Errors
    ///
    /// [`SendError::HeadersLocked`] once a body write has happened; nothing
    /// is written in that case.
    pub async fn send_header(&mut self, key: &str, value: &str) -> Result<(), SendError> {
        if self.headers_locked {
            return Err(SendError::HeadersLocked);
        }
        if !self.status_locked {
            self.send_status(200, "").await?;
        }
        let line = format!("\n{key}: {value}");
        self.write_all(line.as_bytes()).await
    }

    /// Appends `payload` to the body, sending the default status and the
    /// blank-line separator first when needed.
    ///
    /// The first body write sets the header lock; further calls simply
    /// append more bytes to the same connection.
    pub async fn send_bytes(&mut self, payload: &[u8]) -> Result<(), SendError> {
        if !self.status_locked {
            self.send_status(200, "").await?;
        }
        if !self.headers_locked {
            self.write_all(b"\n\n").await?;
            self.headers_locked = true;
        }
        self.write_all(payload).await
    }

    /// Appends UTF-8 text to the body. See [`send_bytes`](Self::send_bytes).
    pub async fn send_text(&mut self, payload: &str) -> Result<(), SendError> {
        self.send_bytes(payload.as_bytes()).await
    }

    /// Serializes `value` and sends it as an `application/json` body.
    ///
    /// # Errors
    ///
    /// [`SendError::Json`] if serialization fails (before any byte is
    /// written), otherwise the errors of [`send_header`](Self::send_header)
    /// and [`send_bytes`](Self::send_bytes).
    pub async fn send_json<T: Serialize>(&mut self, value: &T) -> Result<(), SendError> {
        let body = serde_json::to_vec(value)?;
        self.send_header("Content-Type", "application/json").await?;
        self.send_bytes(&body).await
    }

    /// Sends a redirect: the status line, a `Location` header, and an empty
    /// body.
    pub async fn send_redirect(&mut self, location: &str, code: u16) -> Result<(), SendError> {
        self.send_status(code, "").await?;
        self.send_header("Location", location).await?;
        self.send_bytes(b"").await
    }

    /// Flushes pending bytes and shuts the write half down.
    pub(crate) async fn finish(&mut self) -> Result<(), SendError> {
        match timeout(self.write_timeout, self.writer.shutdown()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SendError::Io(timed_out())),
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        match timeout(self.write_timeout, self.writer.write_all(bytes)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SendError::Io(timed_out())),
        }
    }
}

fn timed_out() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::TimedOut, "write deadline elapsed")
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;

    // In-memory pipe standing in for the connection's write half.
    fn pipe() -> (DuplexStream, Response) {
        let (client, server) = tokio::io::duplex(4096);
        (client, Response::new(server, "HTTP/1.1"))
    }

    async fn sent(mut client: DuplexStream, mut response: Response) -> String {
        response.finish().await.unwrap();
        drop(response);
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn text_body_auto_sends_status_and_separator() {
        let (client, mut response) = pipe();
        response.send_text("hello world").await.unwrap();
        assert_eq!(sent(client, response).await, "HTTP/1.1 200 OK\n\nhello world");
    }

    #[tokio::test]
    async fn explicit_status_and_header_before_body() {
        let (client, mut response) = pipe();
        response.send_status(201, "").await.unwrap();
        response
            .send_header("Content-Type", "text/plain")
            .await
            .unwrap();
        response.send_text("made").await.unwrap();
        assert_eq!(
            sent(client, response).await,
            "HTTP/1.1 201 Created\nContent-Type: text/plain\n\nmade"
        );
    }

    #[tokio::test]
    async fn empty_reason_resolves_from_the_table() {
        let (client, mut response) = pipe();
        response.send_status(404, "").await.unwrap();
        assert_eq!(sent(client, response).await, "HTTP/1.1 404 Not Found");
    }

    #[tokio::test]
    async fn explicit_reason_wins_over_the_table() {
        let (client, mut response) = pipe();
        response.send_status(404, "Gone Fishing").await.unwrap();
        assert_eq!(sent(client, response).await, "HTTP/1.1 404 Gone Fishing");
    }

    #[tokio::test]
    async fn unknown_code_without_reason_is_rejected() {
        let (client, mut response) = pipe();
        let err = response.send_status(299, "").await.unwrap_err();
        assert!(matches!(err, SendError::UnknownStatusCode(299)));
        // Nothing reached the wire and the status stays unlocked.
        assert!(!response.status_locked());
        assert_eq!(sent(client, response).await, "");
    }

    #[tokio::test]
    async fn second_status_is_rejected_and_writes_nothing() {
        let (client, mut response) = pipe();
        response.send_status(200, "").await.unwrap();
        let err = response.send_status(500, "").await.unwrap_err();
        assert!(matches!(err, SendError::StatusLocked));
        assert_eq!(sent(client, response).await, "HTTP/1.1 200 OK");
    }

    #[tokio::test]
    async fn header_after_body_is_rejected_and_writes_nothing() {
        let (client, mut response) = pipe();
        response.send_text("body").await.unwrap();
        let err = response.send_header("X-Late", "nope").await.unwrap_err();
        assert!(matches!(err, SendError::HeadersLocked));
        assert_eq!(sent(client, response).await, "HTTP/1.1 200 OK\n\nbody");
    }

    #[tokio::test]
    async fn repeated_body_writes_append() {
        let (client, mut response) = pipe();
        response.send_text("first").await.unwrap();
        response.send_bytes(b" second").await.unwrap();
        assert_eq!(
            sent(client, response).await,
            "HTTP/1.1 200 OK\n\nfirst second"
        );
    }

    #[tokio::test]
    async fn json_body_carries_its_content_type() {
        #[derive(Serialize)]
        struct Greeting {
            message: &'static str,
        }

        let (client, mut response) = pipe();
        response
            .send_json(&Greeting { message: "hi" })
            .await
            .unwrap();
        assert_eq!(
            sent(client, response).await,
            "HTTP/1.1 200 OK\nContent-Type: application/json\n\n{\"message\":\"hi\"}"
        );
    }

    #[tokio::test]
    async fn redirect_sends_status_location_and_empty_body() {
        let (client, mut response) = pipe();
        response.send_redirect("/elsewhere", 302).await.unwrap();
        assert_eq!(
            sent(client, response).await,
            "HTTP/1.1 302 Found\nLocation: /elsewhere\n\n"
        );
    }

    #[tokio::test]
    async fn version_is_echoed_into_the_status_line() {
        let (client, server) = tokio::io::duplex(4096);
        let mut response = Response::new(server, "HTTP/1.0");
        response.send_text("ok").await.unwrap();
        assert_eq!(sent(client, response).await, "HTTP/1.0 200 OK\n\nok");
    }
}
