//! Configuration for the hello-httpd server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "hello-httpd")]
#[command(author = "hello-httpd authors")]
#[command(version = "0.1.0")]
#[command(about = "A minimal fixed-response HTTP server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:38032)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum accepted request line length in bytes
    #[arg(short = 'm', long)]
    pub max_line_length: Option<usize>,

    /// Connection scheduling mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// How accepted connections are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve one connection at a time on the accept thread.
    Sequential,
    /// Spawn a thread per accepted connection.
    Threaded,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Connection scheduling mode
    pub mode: Option<Mode>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            mode: None,
        }
    }
}

/// Request-size limits
#[derive(Debug, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted request line length in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
        }
    }
}

/// Response configuration
#[derive(Debug, Deserialize, Default)]
pub struct ResponseConfig {
    /// HTML body to serve instead of the built-in page
    pub body: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:38032".to_string()
}

fn default_max_line_length() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub max_line_length: usize,
    pub mode: Mode,
    pub body: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            max_line_length: cli
                .max_line_length
                .unwrap_or(toml_config.limits.max_line_length),
            mode: cli
                .mode
                .or(toml_config.server.mode)
                .unwrap_or(Mode::Sequential),
            body: toml_config.response.body,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:38032");
        assert_eq!(config.server.mode, None);
        assert_eq!(config.limits.max_line_length, 1024);
        assert_eq!(config.response.body, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:8080"
            mode = "threaded"

            [limits]
            max_line_length = 4096

            [response]
            body = "<p>custom</p>"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.mode, Some(Mode::Threaded));
        assert_eq!(config.limits.max_line_length, 4096);
        assert_eq!(config.response.body.as_deref(), Some("<p>custom</p>"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let toml_str = r#"
            [logging]
            level = "warn"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:38032");
        assert_eq!(config.limits.max_line_length, 1024);
        assert_eq!(config.logging.level, "warn");
    }
}
