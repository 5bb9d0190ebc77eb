//! Line framing over a raw byte stream.
//!
//! Turns an unbuffered stream of octets into discrete newline-delimited
//! lines: partial reads and interrupted reads are handled internally,
//! over-length lines are truncated while the stream is consumed through
//! the delimiter, and end-of-stream is distinct from an empty line.

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{ErrorKind, Read};

const NEWLINE: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

/// Initial capacity for the line buffer (lines are usually short).
const INITIAL_LINE_CAPACITY: usize = 256;

/// Errors surfaced by [`LineReader`].
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The configured maximum line length cannot hold any data.
    #[error("max line length must be at least 1 (got {0})")]
    InvalidMaxLength(usize),

    /// The underlying read failed for a non-transient reason.
    #[error("stream read error: {0}")]
    Io(#[from] std::io::Error),
}

/// One newline-delimited record read from a stream.
///
/// A line holds the bytes up to and including its newline, or all
/// remaining bytes when the stream ended mid-line. Stored data is capped
/// at `max_length - 1` bytes; anything beyond that was consumed from the
/// stream but dropped, with `truncated` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    data: Bytes,
    truncated: bool,
}

impl Line {
    /// Number of stored bytes, including a stored newline.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Stored bytes, terminator included when it fit.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether bytes beyond the cap were dropped for this line.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Line content without its trailing `\n` (and a preceding `\r`).
    pub fn stripped(&self) -> &[u8] {
        let mut bytes = &self.data[..];
        if let [rest @ .., NEWLINE] = bytes {
            bytes = rest;
            if let [rest @ .., CARRIAGE_RETURN] = bytes {
                bytes = rest;
            }
        }
        bytes
    }

    /// A terminator-only line (`"\n"` or `"\r\n"`), the end-of-headers
    /// sentinel. A partial line at end-of-stream is never blank.
    pub fn is_blank(&self) -> bool {
        matches!(self.data.as_ref(), b"\n" | b"\r\n")
    }
}

/// Outcome of a single [`LineReader::read_line`] call.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A line was read (newline-terminated, or the tail before EOF).
    Line(Line),
    /// The stream ended with no bytes accumulated for this call.
    EndOfStream,
}

/// Reads newline-delimited lines from any `Read` stream.
///
/// Reads one byte at a time so the stream position never advances past
/// the delimiter. Holds no state between lines beyond the stream itself;
/// create one per connection and discard it when the connection ends.
pub struct LineReader<R> {
    stream: R,
    max_length: usize,
}

impl<R: Read> LineReader<R> {
    /// Create a reader with a maximum line length.
    ///
    /// Fails with [`ReadError::InvalidMaxLength`] before any I/O when
    /// `max_length` is zero.
    pub fn new(stream: R, max_length: usize) -> Result<Self, ReadError> {
        if max_length < 1 {
            return Err(ReadError::InvalidMaxLength(max_length));
        }
        Ok(Self { stream, max_length })
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.stream
    }

    /// Read the next line (blocking).
    ///
    /// Interrupted reads are retried and never surfaced. At most
    /// `max_length - 1` bytes are stored; once the cap is hit, further
    /// bytes are read and discarded until the newline or EOF, so the next
    /// call starts at the following line. Any other read failure is
    /// returned immediately and the partial line is dropped.
    pub fn read_line(&mut self) -> Result<ReadOutcome, ReadError> {
        let mut line = BytesMut::with_capacity(self.max_length.min(INITIAL_LINE_CAPACITY));
        let mut truncated = false;
        let mut byte = [0u8; 1];

        loop {
            let n = match self.stream.read(&mut byte) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ReadError::Io(err)),
            };

            if n == 0 {
                // EOF: nothing accumulated means the peer closed between
                // lines, not mid-line
                if line.is_empty() {
                    return Ok(ReadOutcome::EndOfStream);
                }
                break;
            }

            if line.len() < self.max_length - 1 {
                line.put_u8(byte[0]);
            } else {
                truncated = true;
            }

            if byte[0] == NEWLINE {
                break;
            }
        }

        Ok(ReadOutcome::Line(Line {
            data: line.freeze(),
            truncated,
        }))
    }
}
