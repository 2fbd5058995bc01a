//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reaper::ReaperConfig;
use crate::session::RegistryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rooms: RoomsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP / WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Room lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// How long an empty room is kept before deletion
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Rooms idle longer than this are reaped
    #[serde(default = "default_max_idle")]
    pub max_idle_secs: u64,

    /// How often the reaper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_code")]
    pub default_code: String,

    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_grace_period() -> u64 {
    300 // 5 minutes
}

fn default_max_idle() -> u64 {
    24 * 60 * 60 // 24 hours
}

fn default_sweep_interval() -> u64 {
    60 * 60 // 1 hour
}

fn default_code() -> String {
    RegistryConfig::default().default_code
}

fn default_language() -> String {
    RegistryConfig::default().default_language
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period(),
            max_idle_secs: default_max_idle(),
            sweep_interval_secs: default_sweep_interval(),
            default_code: default_code(),
            default_language: default_language(),
        }
    }
}

impl RoomsConfig {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            grace_period: Duration::from_secs(self.grace_period_secs),
            default_code: self.default_code.clone(),
            default_language: self.default_language.clone(),
        }
    }

    pub fn reaper_config(&self) -> ReaperConfig {
        ReaperConfig {
            // tokio's interval panics on a zero period
            interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            max_idle_age: Duration::from_secs(self.max_idle_secs),
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

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
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
            dirs::config_dir().map(|p| p.join("pairhub").join("config.toml")),
            Some(PathBuf::from("/etc/pairhub/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
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
        if let Some(host) = var("PAIRHUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PAIRHUB_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        // Plain PORT is honored for container platforms
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // Room overrides
        if let Some(secs) = var("PAIRHUB_GRACE_PERIOD_SECS").and_then(|s| s.parse().ok()) {
            self.rooms.grace_period_secs = secs;
        }
        if let Some(secs) = var("PAIRHUB_MAX_IDLE_SECS").and_then(|s| s.parse().ok()) {
            self.rooms.max_idle_secs = secs;
        }
        if let Some(secs) = var("PAIRHUB_SWEEP_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            self.rooms.sweep_interval_secs = secs;
        }

        // Logging overrides
        if let Some(level) = var("PAIRHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("PAIRHUB_LOG_FORMAT") {
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
    r#"# Pairhub Configuration
#
# Environment variables override these settings:
# - PAIRHUB_HOST
# - PAIRHUB_PORT (or PORT)
# - PAIRHUB_GRACE_PERIOD_SECS
# - PAIRHUB_MAX_IDLE_SECS
# - PAIRHUB_SWEEP_INTERVAL_SECS
# - PAIRHUB_LOG_LEVEL
# - PAIRHUB_LOG_FORMAT

[server]
# Server host
host = "0.0.0.0"

# Server port (HTTP API and WebSocket)
port = 3001

# Allowed CORS origins (empty allows any origin)
cors_origins = []

[rooms]
# Seconds an empty room is kept before it is deleted
grace_period_secs = 300

# Rooms with no activity for this many seconds are deleted,
# even if participants are still connected
max_idle_secs = 86400

# Seconds between idle sweeps
sweep_interval_secs = 3600

# Initial contents of a new room
default_code = "// Welcome to the coding interview!\n// Start typing...\n"
default_language = "javascript"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "0.0.0.0:3001");
        assert_eq!(config.rooms.grace_period_secs, 300);
        assert_eq!(config.rooms.max_idle_secs, 86400);
        assert_eq!(config.rooms.sweep_interval_secs, 3600);
        assert_eq!(config.rooms.default_language, "javascript");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config = Config::parse(&generate_default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.rooms.default_code, defaults.rooms.default_code);
        assert_eq!(config.rooms.max_idle_secs, defaults.rooms.max_idle_secs);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = Config::parse(
            r#"
            [server]
            port = 9000

            [rooms]
            grace_period_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.rooms.grace_period_secs, 10);
        assert_eq!(config.rooms.sweep_interval_secs, 3600);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Config::parse("[server]\nport = \"lots\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PAIRHUB_HOST", "127.0.0.1"),
            ("PAIRHUB_PORT", "4000"),
            ("PAIRHUB_MAX_IDLE_SECS", "60"),
            ("PAIRHUB_LOG_FORMAT", "json"),
            ("PAIRHUB_GRACE_PERIOD_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.addr(), "127.0.0.1:4000");
        assert_eq!(config.rooms.max_idle_secs, 60);
        assert_eq!(config.rooms.grace_period_secs, 300);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_room_config_conversions() {
        let rooms = RoomsConfig {
            grace_period_secs: 5,
            max_idle_secs: 20,
            sweep_interval_secs: 0,
            ..Default::default()
        };

        assert_eq!(rooms.registry_config().grace_period, Duration::from_secs(5));
        let reaper = rooms.reaper_config();
        assert_eq!(reaper.max_idle_age, Duration::from_secs(20));
        assert_eq!(reaper.interval, Duration::from_secs(1));
    }
}
