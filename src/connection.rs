//! Per-connection handling loop.
//!
//! Drives the line reader until a blank line ends the request headers,
//! writes the fixed response, and shuts the connection down exactly once
//! on every exit path.

use crate::reader::{LineReader, ReadError, ReadOutcome};
use bytes::Bytes;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use tracing::{debug, warn};

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for the next request line.
    Reading,
    /// Writing the fixed response.
    Responding,
    /// Connection is being shut down.
    Closing,
}

/// Errors that can occur while serving one connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Reading a line from the peer failed.
    #[error("failed to read line from connection: {0}")]
    Read(#[from] ReadError),

    /// The response could not be fully written.
    #[error("failed to write response: {0}")]
    Write(#[source] std::io::Error),
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A blank line was seen and the fixed response was sent.
    Responded,
    /// The peer closed the connection before completing its headers.
    ClientClosed,
}

/// A readable/writable byte stream that can be shut down in both
/// directions. The handler owns the stream only for the duration of one
/// `serve` call; the accept loop owns creation.
pub trait ByteStream: Read + Write {
    fn shutdown(&mut self) -> std::io::Result<()>;
}

impl ByteStream for TcpStream {
    fn shutdown(&mut self) -> std::io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Handles one connection: read lines until blank, respond, close.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    max_line_length: usize,
    response: Bytes,
}

impl ConnectionHandler {
    /// Create a handler with a line length cap and the response blob.
    pub fn new(max_line_length: usize, response: Bytes) -> Self {
        Self {
            max_line_length,
            response,
        }
    }

    /// Handle one connection to completion.
    ///
    /// At most one response is sent, and only when a blank line was
    /// observed. The stream is shut down in both directions exactly once,
    /// whether the connection ends in success, peer close, or error.
    pub fn serve<S: ByteStream>(&self, mut stream: S) -> Result<ServeOutcome, ConnectionError> {
        let result = self.drive(&mut stream);

        debug!("Shutting down client socket");
        if let Err(err) = stream.shutdown() {
            warn!(error = %err, "Failed to shut down client socket");
        }

        result
    }

    fn drive<S: ByteStream>(&self, stream: &mut S) -> Result<ServeOutcome, ConnectionError> {
        let mut reader = LineReader::new(stream, self.max_line_length)?;
        let mut state = ConnState::Reading;
        let mut outcome = ServeOutcome::ClientClosed;

        loop {
            match state {
                ConnState::Reading => match reader.read_line()? {
                    ReadOutcome::Line(line) => {
                        debug!(
                            len = line.len(),
                            truncated = line.is_truncated(),
                            line = %String::from_utf8_lossy(line.stripped()),
                            "got line"
                        );
                        if line.is_blank() {
                            state = ConnState::Responding;
                        }
                    }
                    ReadOutcome::EndOfStream => state = ConnState::Closing,
                },
                ConnState::Responding => {
                    reader
                        .get_mut()
                        .write_all(&self.response)
                        .map_err(ConnectionError::Write)?;
                    outcome = ServeOutcome::Responded;
                    state = ConnState::Closing;
                }
                ConnState::Closing => break,
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        fail_writes: bool,
        shutdowns: usize,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
                fail_writes: false,
                shutdowns: 0,
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.fail_writes {
                return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
            }
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl ByteStream for &mut MockStream {
        fn shutdown(&mut self) -> std::io::Result<()> {
            self.shutdowns += 1;
            Ok(())
        }
    }

    fn handler() -> ConnectionHandler {
        ConnectionHandler::new(1024, crate::response::build(crate::response::DEFAULT_BODY))
    }

    #[test]
    fn test_responds_after_blank_line() {
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");

        let outcome = handler().serve(&mut stream).unwrap();

        assert_eq!(outcome, ServeOutcome::Responded);
        assert_eq!(
            stream.output,
            crate::response::build(crate::response::DEFAULT_BODY)
        );
        assert_eq!(stream.shutdowns, 1);
    }

    #[test]
    fn test_lf_only_blank_line_also_responds() {
        let mut stream = MockStream::new(b"GET / HTTP/1.1\n\n");

        let outcome = handler().serve(&mut stream).unwrap();

        assert_eq!(outcome, ServeOutcome::Responded);
        assert!(!stream.output.is_empty());
    }

    #[test]
    fn test_no_response_without_blank_line() {
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n");

        let outcome = handler().serve(&mut stream).unwrap();

        assert_eq!(outcome, ServeOutcome::ClientClosed);
        assert!(stream.output.is_empty());
        assert_eq!(stream.shutdowns, 1);
    }

    #[test]
    fn test_immediate_close() {
        let mut stream = MockStream::new(b"");

        let outcome = handler().serve(&mut stream).unwrap();

        assert_eq!(outcome, ServeOutcome::ClientClosed);
        assert!(stream.output.is_empty());
        assert_eq!(stream.shutdowns, 1);
    }

    #[test]
    fn test_write_failure_still_closes_once() {
        let mut stream = MockStream::new(b"\r\n");
        stream.fail_writes = true;

        let err = handler().serve(&mut stream).unwrap_err();

        assert!(matches!(err, ConnectionError::Write(_)));
        assert_eq!(stream.shutdowns, 1);
    }

    #[test]
    fn test_read_failure_still_closes_once() {
        struct FailingRead {
            shutdowns: usize,
        }

        impl Read for FailingRead {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            }
        }

        impl Write for FailingRead {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl ByteStream for &mut FailingRead {
            fn shutdown(&mut self) -> std::io::Result<()> {
                self.shutdowns += 1;
                Ok(())
            }
        }

        let mut stream = FailingRead { shutdowns: 0 };
        let err = handler().serve(&mut stream).unwrap_err();

        assert!(matches!(err, ConnectionError::Read(ReadError::Io(_))));
        assert_eq!(stream.shutdowns, 1);
    }

    #[test]
    fn test_truncated_header_line_does_not_end_headers() {
        // a very long header line is truncated but consumed; the blank
        // line after it still triggers the response
        let mut input = b"GET / HTTP/1.1\r\nX-Long: ".to_vec();
        input.extend(std::iter::repeat(b'a').take(4096));
        input.extend_from_slice(b"\r\n\r\n");

        let mut stream = MockStream::new(&input);
        let outcome = handler().serve(&mut stream).unwrap();

        assert_eq!(outcome, ServeOutcome::Responded);
    }
}
