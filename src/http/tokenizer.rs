//! Byte-at-a-time request tokenizer.
//!
//! The tokenizer pulls single bytes off a connection and groups them into
//! space-delimited words and line-feed-delimited lines. It recognizes only
//! the bare LF (0x0A) as a line terminator; a preceding CR (0x0D) stays in
//! the returned bytes and is the caller's job to strip. The reader is
//! buffered internally so single-byte extraction does not translate into
//! single-byte socket reads; word and line boundaries are unaffected.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

/// A token pulled off the connection by [`Tokenizer::next_word`].
#[derive(Debug, PartialEq, Eq)]
pub struct Word {
    bytes: BytesMut,
    line_break: bool,
}

impl Word {
    /// The token's bytes, delimiter excluded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `true` when the token was terminated by a line feed rather than a
    /// space.
    pub fn ends_line(&self) -> bool {
        self.line_break
    }

    /// `true` when no bytes preceded the delimiter.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the word, yielding its bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.bytes
    }
}

/// Incremental word/line extraction over a byte stream.
pub struct Tokenizer<R> {
    reader: BufReader<R>,
    consumed: usize,
}

impl<R: AsyncRead + Unpin> Tokenizer<R> {
    /// Wraps `reader` in an internal buffer of `capacity` bytes.
    pub fn new(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            consumed: 0,
        }
    }

    /// Total bytes pulled off the connection so far, delimiters included.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Reads bytes until a space (0x20) or line feed (0x0A).
    ///
    /// The delimiter is consumed but excluded from the returned [`Word`];
    /// [`Word::ends_line`] reports which delimiter ended the token. The error
    /// is the underlying read failure, `UnexpectedEof` included.
    pub async fn next_word(&mut self) -> std::io::Result<Word> {
        let mut bytes = BytesMut::new();
        loop {
            let byte = self.reader.read_u8().await?;
            self.consumed += 1;
            match byte {
                b' ' => {
                    return Ok(Word {
                        bytes,
                        line_break: false,
                    });
                }
                b'\n' => {
                    return Ok(Word {
                        bytes,
                        line_break: true,
                    });
                }
                other => bytes.put_u8(other),
            }
        }
    }

    /// Reads bytes until a line feed, which is consumed and omitted from the
    /// returned bytes. Nothing else is stripped.
    pub async fn next_line(&mut self) -> std::io::Result<BytesMut> {
        let mut bytes = BytesMut::new();
        loop {
            let byte = self.reader.read_u8().await?;
            self.consumed += 1;
            if byte == b'\n' {
                return Ok(bytes);
            }
            bytes.put_u8(byte);
        }
    }
}
