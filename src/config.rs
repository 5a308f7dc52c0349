//! # Configuration Management
//!
//! Centralized configuration for the session core and the bundled TCP client.
//!
//! ## Configuration Sources
//! - TOML files via [`ClientConfig::from_file`]
//! - TOML strings via [`ClientConfig::from_toml`]
//! - `MEANWHILE_*` environment variables via [`ClientConfig::from_env`]
//! - Direct instantiation with defaults
//!
//! Only the `session` section reaches the session core. The `connection`
//! section drives the TCP bridge and the `logging` section the subscriber
//! installed by [`init_logging`](crate::utils::logging::init_logging).

use crate::error::{ProtocolError, Result};
use crate::protocol::message::Version;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max allowed message length in a packet (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Well-known community server port
pub const DEFAULT_PORT: u16 = 1533;

/// Size of each chunk read from the socket
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Client type announced in the handshake and login
pub const DEFAULT_CLIENT_TYPE: u16 = 0x1700;

/// Protocol version the client speaks
pub const CLIENT_VERSION: Version = Version::new(0x001e, 0x001d);

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    /// Where and how to connect
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Values seeded into new sessions
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MEANWHILE_*` overrides read through `lookup`.
    ///
    /// Unparsable numbers are a configuration error rather than silently ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MEANWHILE_SERVER_HOST") {
            self.connection.server_host = host;
        }

        if let Some(port) = lookup("MEANWHILE_SERVER_PORT") {
            self.connection.port = parse_env("MEANWHILE_SERVER_PORT", &port)?;
        }

        if let Some(timeout) = lookup("MEANWHILE_CONNECT_TIMEOUT_MS") {
            let millis: u64 = parse_env("MEANWHILE_CONNECT_TIMEOUT_MS", &timeout)?;
            self.connection.connect_timeout = Duration::from_millis(millis);
        }

        if let Some(interval) = lookup("MEANWHILE_KEEPALIVE_INTERVAL_MS") {
            let millis: u64 = parse_env("MEANWHILE_KEEPALIVE_INTERVAL_MS", &interval)?;
            self.connection.keepalive_interval = Duration::from_millis(millis);
        }

        if let Some(size) = lookup("MEANWHILE_MAX_FRAME_SIZE") {
            self.session.max_frame_size = parse_env("MEANWHILE_MAX_FRAME_SIZE", &size)?;
        }

        if let Some(host) = lookup("MEANWHILE_CLIENT_HOST") {
            self.session.client_host = host;
        }

        if let Some(level) = lookup("MEANWHILE_LOG_LEVEL") {
            self.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.connection.validate());
        errors.extend(self.session.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {key}: '{value}'")))
}

/// Transport-side settings used by the TCP bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host name or address, without port
    pub server_host: String,

    pub port: u16,

    /// Timeout for the TCP connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Interval between outbound keepalives once started (0 disables)
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Bytes read from the socket per `receive` call
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_host: String::from("localhost"),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(60),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Validate connection configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_host.is_empty() {
            errors.push("Server host cannot be empty".to_string());
        } else if self.server_host.contains(char::is_whitespace) {
            errors.push(format!(
                "Invalid server host: '{}' (must not contain whitespace)",
                self.server_host
            ));
        }

        if self.port == 0 {
            errors.push("Server port must be greater than 0".to_string());
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if !self.keepalive_interval.is_zero() {
            if self.keepalive_interval.as_secs() < 1 {
                errors.push("Keepalive interval too short (minimum: 1s)".to_string());
            } else if self.keepalive_interval.as_secs() > 3600 {
                errors.push("Keepalive interval too long (maximum: 1 hour)".to_string());
            }
        }

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size must be greater than 0".to_string());
        } else if self.read_buffer_size > 1024 * 1024 {
            errors.push(format!(
                "Read buffer size too large: {} bytes (maximum: 1 MB)",
                self.read_buffer_size
            ));
        }

        errors
    }
}

/// Values a new session starts with
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub client_type: u16,

    pub client_ver_major: u16,

    pub client_ver_minor: u16,

    /// Host name announced in the handshake; empty to omit
    #[serde(default)]
    pub client_host: String,

    /// Largest message length accepted or produced
    pub max_frame_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_type: DEFAULT_CLIENT_TYPE,
            client_ver_major: CLIENT_VERSION.major,
            client_ver_minor: CLIENT_VERSION.minor,
            client_host: String::new(),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn client_version(&self) -> Version {
        Version::new(self.client_ver_major, self.client_ver_minor)
    }

    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 0x7FFF_FFFF {
            errors.push(format!(
                "Max frame size too large: {} bytes (length prefix reserves the high bit)",
                self.max_frame_size
            ));
        }

        if self.client_host.len() > u16::MAX as usize {
            errors.push("Client host too long for a string field".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level, used when `RUST_LOG` is not set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mw-client"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization (milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
