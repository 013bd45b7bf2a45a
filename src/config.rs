//! Configuration module for the Echo Town server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Lowest port accepted by `--port`.
pub const MIN_PORT: i64 = 1;

/// Highest port accepted by `--port`.
pub const MAX_PORT: i64 = 65535;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "echo-town")]
#[command(author = "echo-town authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-oriented TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Designated port to start the server on
    #[arg(long, allow_negative_numbers = true)]
    pub port: Option<i64>,

    /// Address to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Directory for the server log and per-client transcripts
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Seconds of client silence tolerated after a prompt
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: i64,
    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            idle_timeout: default_idle_timeout(),
            workers: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log directory
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> i64 {
    4000
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub idle_timeout: Duration,
    pub workers: Option<usize>,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments against the optional TOML file.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let port = validate_port(cli.port.unwrap_or(toml_config.server.port))?;

        let idle_secs = cli
            .idle_timeout
            .unwrap_or(toml_config.server.idle_timeout);
        if idle_secs == 0 {
            return Err(ConfigError::InvalidIdleTimeout);
        }

        // Merge CLI args with TOML config (CLI takes precedence)
        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port,
            idle_timeout: Duration::from_secs(idle_secs),
            workers: cli.workers.or(toml_config.server.workers),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
            log_dir: cli.log_dir.unwrap_or(toml_config.logging.dir),
        })
    }

    /// Address string handed to the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Check that a port lies within the inclusive range 1..=65535.
pub fn validate_port(port: i64) -> Result<u16, ConfigError> {
    if (MIN_PORT..=MAX_PORT).contains(&port) {
        Ok(port as u16)
    } else {
        Err(ConfigError::InvalidPort(port))
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidPort(i64),
    InvalidIdleTimeout,
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
            ConfigError::InvalidPort(port) => write!(
                f,
                "[ERROR] Port {} is invalid. Port must be between {} and {}.",
                port, MIN_PORT, MAX_PORT
            ),
            ConfigError::InvalidIdleTimeout => {
                write!(f, "[ERROR] Idle timeout must be at least 1 second.")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, ConfigError> {
        let mut argv = vec!["echo-town"];
        argv.extend_from_slice(args);
        Config::from_args(CliArgs::parse_from(argv))
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.idle_timeout, 30);
        assert_eq!(config.logging.dir, PathBuf::from("log"));
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.listen_addr(), "0.0.0.0:4000");
    }

    #[test]
    fn test_port_flag() {
        let config = parse(&["--port", "4001"]).unwrap();
        assert_eq!(config.port, 4001);
    }

    #[test]
    fn test_port_bounds() {
        assert_eq!(validate_port(1).unwrap(), 1);
        assert_eq!(validate_port(65535).unwrap(), 65535);
        assert!(validate_port(0).is_err());
        assert!(validate_port(65536).is_err());
        assert!(validate_port(-1).is_err());
    }

    #[test]
    fn test_invalid_port_message() {
        let err = parse(&["--port", "70000"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[ERROR] Port 70000 is invalid. Port must be between 1 and 65535."
        );

        let err = parse(&["--port=-5"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(-5)));
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let err = parse(&["--idle-timeout", "0"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdleTimeout));
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 5000
            idle_timeout = 10
            workers = 4

            [logging]
            level = "debug"
            dir = "/var/log/echo-town"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.idle_timeout, 10);
        assert_eq!(config.server.workers, Some(4));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir, PathBuf::from("/var/log/echo-town"));
    }

    #[test]
    fn test_cli_overrides_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echo-town.toml");
        std::fs::write(&path, "[server]\nport = 5000\nidle_timeout = 10\n").unwrap();

        let path_str = path.to_str().unwrap();
        let config = parse(&["--config", path_str, "--port", "6000"]).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_toml_port_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echo-town.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        let err = parse(&["--config", path.to_str().unwrap()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(0)));
    }
}
