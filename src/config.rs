//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Broadcast server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_welcome_message() -> String {
    HubConfig::default().welcome_message
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            welcome_message: default_welcome_message(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            welcome_message: self.welcome_message.clone(),
        }
    }
}

/// What the client does with inbound text that is not valid JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeFailurePolicy {
    /// Discard the frame and record the failure as the last error
    #[default]
    Drop,
    /// Surface the raw text as the last message
    Passthrough,
}

impl std::str::FromStr for DecodeFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "passthrough" => Ok(Self::Passthrough),
            other => Err(format!("unknown decode failure policy: {}", other)),
        }
    }
}

/// Reconnecting client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    #[serde(default)]
    pub decode_failure: DecodeFailurePolicy,
}

fn default_url() -> String {
    "ws://localhost:5000".to_string()
}

fn default_reconnect_delay() -> u64 {
    3000 // 3 seconds
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_delay_ms: default_reconnect_delay(),
            decode_failure: DecodeFailurePolicy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("fanout").join("config.toml")),
            Some(PathBuf::from("/etc/fanout/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = var("FANOUT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("FANOUT_PORT").or_else(|| var("PORT")) {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid port {:?}", port),
            }
        }
        if let Some(welcome) = var("FANOUT_WELCOME_MESSAGE") {
            self.server.welcome_message = welcome;
        }

        // Client overrides
        if let Some(url) = var("FANOUT_URL") {
            self.client.url = url;
        }
        if let Some(delay) = var("FANOUT_RECONNECT_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.client.reconnect_delay_ms = ms;
            }
        }
        if let Some(policy) = var("FANOUT_DECODE_FAILURE") {
            match policy.parse() {
                Ok(p) => self.client.decode_failure = p,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        // Logging overrides
        if let Some(level) = var("FANOUT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("FANOUT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Fanout Configuration
#
# Environment variables override these settings:
# - FANOUT_HOST
# - FANOUT_PORT (or PORT)
# - FANOUT_WELCOME_MESSAGE
# - FANOUT_URL
# - FANOUT_RECONNECT_DELAY_MS
# - FANOUT_DECODE_FAILURE
# - FANOUT_LOG_LEVEL
# - FANOUT_LOG_FORMAT

[server]
# Broadcast server host
host = "0.0.0.0"

# Broadcast server port
port = 5000

# Text of the info message sent to each new connection
welcome_message = "Connected to WebSocket server"

[client]
# WebSocket URL the client connects to
url = "ws://localhost:5000"

# Delay before reconnecting after the connection drops (ms)
reconnect_delay_ms = 3000

# What to do with inbound text that is not JSON:
# "drop" records an error, "passthrough" keeps the raw text as the last message
decode_failure = "drop"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
