//! Inbound request parsing over the byte tokenizer.
//!
//! [`Request::read`] drives a [`Tokenizer`] through the request-line and
//! header protocol: three space-delimited words on the first line, then
//! `key: value` header lines until a blank line. Header names are stored
//! lower-cased; a duplicate name overwrites the earlier value. The request
//! body, if any, is never read here.

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::AsyncRead;

use super::tokenizer::Tokenizer;
use super::{Headers, Method};

/// Errors produced while reading a request off the wire.
///
/// The `Io` variant is a transport failure; every other variant means the
/// peer sent bytes that violate the wire protocol.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The underlying read failed, `UnexpectedEof` included.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line feed arrived before the request line was complete; the value
    /// names the last token that was read.
    #[error("request line ended after the {0}")]
    TruncatedRequestLine(&'static str),

    /// The protocol-version word was followed by a space instead of a line
    /// feed.
    #[error("request line carries extra tokens after the protocol version")]
    TrailingRequestLineTokens,

    /// A header key was not followed by a colon.
    #[error("header keys and values must be separated by `: `")]
    HeaderSeparator,

    /// A header key reached the end of its line with no value after it.
    #[error("header key `{0}` has no value")]
    HeaderValueMissing(String),

    /// The request line and headers exceeded the configured cap.
    #[error("header block exceeds {0} bytes")]
    HeadersTooLarge(usize),

    /// A token contained bytes that are not valid UTF-8.
    #[error("request contains bytes that are not valid UTF-8")]
    Encoding,
}

/// A fully parsed inbound HTTP/1.x request.
///
/// All fields are set exactly once, during [`Request::read`]; a request is
/// never reused across connections.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    version: String,
    headers: Headers,
}

impl Request {
    /// Reads one request line and header block from `tokenizer`.
    ///
    /// `max_header_bytes` caps the total bytes consumed before the header
    /// block terminates; exceeding it is a protocol error.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Io`] — the connection failed mid-read.
    /// - Any other variant — the peer violated the wire protocol; the
    ///   connection should be closed without a response.
    pub async fn read<R>(
        tokenizer: &mut Tokenizer<R>,
        max_header_bytes: usize,
    ) -> Result<Self, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let word = tokenizer.next_word().await?;
        if word.ends_line() {
            return Err(ParseError::TruncatedRequestLine("method"));
        }
        let method: Method = into_string(word.into_bytes())?.parse().unwrap(); // Infallible

        let word = tokenizer.next_word().await?;
        if word.ends_line() {
            return Err(ParseError::TruncatedRequestLine("path"));
        }
        let path = into_string(word.into_bytes())?;

        let word = tokenizer.next_word().await?;
        if !word.ends_line() {
            return Err(ParseError::TrailingRequestLineTokens);
        }
        let mut version = word.into_bytes();
        strip_trailing_cr(&mut version);
        let version = into_string(version)?;

        let mut headers = Headers::new();
        loop {
            if tokenizer.consumed() > max_header_bytes {
                return Err(ParseError::HeadersTooLarge(max_header_bytes));
            }

            let word = tokenizer.next_word().await?;
            if word.ends_line() {
                if word.is_empty() || word.as_bytes() == &b"\r"[..] {
                    break;
                }
                let mut key = word.into_bytes();
                strip_trailing_cr(&mut key);
                if key.last() == Some(&b':') {
                    key.truncate(key.len() - 1);
                    let key = String::from_utf8_lossy(&key).into_owned();
                    return Err(ParseError::HeaderValueMissing(key));
                }
                return Err(ParseError::HeaderSeparator);
            }

            let mut key = word.into_bytes();
            if key.last() != Some(&b':') {
                return Err(ParseError::HeaderSeparator);
            }
            key.truncate(key.len() - 1);
            let key = into_string(key)?.to_ascii_lowercase();

            let mut value = tokenizer.next_line().await?;
            strip_trailing_cr(&mut value);
            headers.insert(key, into_string(value)?);
        }

        Ok(Self {
            method,
            path,
            version,
            headers,
        })
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path, byte for byte as it appeared on the wire.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the protocol-version string, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the parsed header map.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a single header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

// CRLF line endings are expected on the wire, but the tokenizer only splits
// at the bare LF, so the CR travels with the token.
fn strip_trailing_cr(bytes: &mut BytesMut) {
    if bytes.last() == Some(&b'\r') {
        bytes.truncate(bytes.len() - 1);
    }
}

fn into_string(bytes: BytesMut) -> Result<String, ParseError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CAP: usize = 1024 * 1024;

    async fn parse(raw: &[u8]) -> Result<Request, ParseError> {
        let mut tokenizer = Tokenizer::new(raw, 64);
        Request::read(&mut tokenizer, NO_CAP).await
    }

    #[tokio::test]
    async fn parses_a_simple_get() {
        let req = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(*req.method(), Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.header("host"), Some("localhost"));
        assert_eq!(req.headers().len(), 1);
    }

    #[tokio::test]
    async fn bare_line_feeds_are_accepted() {
        let req = parse(b"POST /submit HTTP/1.0\nHost: example.com\n\n")
            .await
            .unwrap();
        assert_eq!(*req.method(), Method::Post);
        assert_eq!(req.path(), "/submit");
        assert_eq!(req.version(), "HTTP/1.0");
        assert_eq!(req.header("host"), Some("example.com"));
    }

    #[tokio::test]
    async fn header_names_are_lower_cased() {
        let req = parse(b"GET / HTTP/1.1\r\nX-REQUEST-ID: abc\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.header("X-Request-Id"), Some("abc"));
    }

    #[tokio::test]
    async fn header_values_keep_interior_spaces() {
        let req = parse(b"GET / HTTP/1.1\r\nUser-Agent: some agent v1\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.header("user-agent"), Some("some agent v1"));
    }

    #[tokio::test]
    async fn duplicate_header_last_occurrence_wins() {
        let req = parse(b"GET / HTTP/1.1\r\nX-Test: a\r\nX-Test: b\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.header("x-test"), Some("b"));
        assert_eq!(req.headers().len(), 1);
    }

    #[tokio::test]
    async fn method_alone_on_the_line_is_rejected() {
        let err = parse(b"GET\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::TruncatedRequestLine("method")));
    }

    #[tokio::test]
    async fn missing_version_is_rejected() {
        let err = parse(b"GET /\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::TruncatedRequestLine("path")));
    }

    #[tokio::test]
    async fn extra_request_line_tokens_are_rejected() {
        let err = parse(b"GET / HTTP/1.1 extra\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::TrailingRequestLineTokens));
    }

    #[tokio::test]
    async fn header_key_without_colon_is_rejected() {
        let err = parse(b"GET / HTTP/1.1\r\nBad header\r\n\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::HeaderSeparator));
    }

    #[tokio::test]
    async fn header_key_without_value_is_rejected() {
        let err = parse(b"GET / HTTP/1.1\r\nX-Empty:\r\n\r\n")
            .await
            .unwrap_err();
        match err {
            ParseError::HeaderValueMissing(key) => assert_eq!(key, "X-Empty"),
            other => panic!("expected HeaderValueMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn header_line_without_colon_at_end_of_line_is_rejected() {
        let err = parse(b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::HeaderSeparator));
    }

    #[tokio::test]
    async fn truncated_stream_is_a_transport_error() {
        let err = parse(b"GET / HTTP/1.1").await.unwrap_err();
        match err {
            ParseError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_header_block_is_rejected() {
        let mut tokenizer =
            Tokenizer::new(&b"GET / HTTP/1.1\r\nX-Big: aaaaaaaaaaaaaaaa\r\n\r\n"[..], 64);
        let err = Request::read(&mut tokenizer, 16).await.unwrap_err();
        assert!(matches!(err, ParseError::HeadersTooLarge(16)));
    }

    #[tokio::test]
    async fn custom_methods_survive_verbatim() {
        let req = parse(b"PURGE /cache HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(req.method().as_str(), "PURGE");
    }
}
