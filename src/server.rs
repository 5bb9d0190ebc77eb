//! TCP server for the fixed-response handler.
//!
//! Owns the listener and the accept loop. A failure while serving one
//! connection is logged and never tears down the listener; only a failed
//! accept on the listener itself is worth a log line too, and the loop
//! keeps going either way.

use crate::config::{Config, Mode};
use crate::connection::{ConnectionHandler, ServeOutcome};
use crate::response;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Listen backlog for the accepting socket.
const LISTEN_BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    handler: ConnectionHandler,
    mode: Mode,
}

impl Server {
    /// Create a new server instance from resolved configuration.
    pub fn new(config: &Config) -> Self {
        let body = config.body.as_deref().unwrap_or(response::DEFAULT_BODY);

        Server {
            handler: ConnectionHandler::new(config.max_line_length, response::build(body)),
            mode: config.mode,
        }
    }

    /// Build a listening socket with `SO_REUSEADDR` set.
    ///
    /// Restarting right after a shutdown must not fail on a lingering
    /// TIME_WAIT binding.
    pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
        let socket = socket2::Socket::new(
            match addr {
                SocketAddr::V4(_) => socket2::Domain::IPV4,
                SocketAddr::V6(_) => socket2::Domain::IPV6,
            },
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;

        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;

        Ok(socket.into())
    }

    /// Accept connections forever, serving each per the configured mode.
    pub fn run(&self, listener: TcpListener) -> io::Result<()> {
        info!(
            address = %listener.local_addr()?,
            mode = ?self.mode,
            "Server listening"
        );

        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");
                    match self.mode {
                        Mode::Sequential => handle(&self.handler, stream, addr),
                        Mode::Threaded => {
                            let handler = self.handler.clone();
                            std::thread::spawn(move || handle(&handler, stream, addr));
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Serve one accepted connection and log how it ended.
fn handle(handler: &ConnectionHandler, stream: TcpStream, addr: SocketAddr) {
    match handler.serve(stream) {
        Ok(ServeOutcome::Responded) => debug!(peer = %addr, "Response sent"),
        Ok(ServeOutcome::ClientClosed) => debug!(peer = %addr, "Client closed before blank line"),
        Err(e) => error!(peer = %addr, error = %e, "Connection error"),
    }
}
