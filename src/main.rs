//! hello-httpd: a minimal fixed-response HTTP server
//!
//! Reads newline-delimited request lines until a blank line ends the
//! headers, then answers every request with the same HTTP/1.1 payload
//! and closes the connection.
//!
//! Features:
//! - Bounded line framing with over-length truncation
//! - Sequential or thread-per-connection scheduling
//! - Configuration via CLI arguments or TOML file

mod config;
mod connection;
mod reader;
mod response;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        mode = ?config.mode,
        max_line_length = config.max_line_length,
        "Starting hello-httpd server"
    );

    let addr = config.listen.parse()?;
    let listener = Server::bind(addr)?;
    Server::new(&config).run(listener)?;

    Ok(())
}
