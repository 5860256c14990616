//! Application configuration.

use crate::error::{AppError, AppResult};
use coinpilot_ws::public_ip::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_LOOKUP_URL};
use coinpilot_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file used when neither `--config` nor `COINPILOT_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the dashboard backend; the channel URL is derived from it.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Fixed client id. A fresh one is generated per process when unset.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub public_ip: PublicIpConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Reconnect attempts before giving up. Default: 5.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Linear backoff base (ms); attempt n waits n * base. Default: 2000.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Outbound write buffer. Default: 256.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

/// Public address lookup used in the hello.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lookup_url")]
    pub url: String,
    /// Default: 3000.
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging and periodic statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between statistics summaries. Default: 60.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_origin() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    coinpilot_ws::backoff::DEFAULT_MAX_ATTEMPTS
}

fn default_reconnect_base_delay_ms() -> u64 {
    coinpilot_ws::backoff::DEFAULT_BASE_DELAY_MS
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_lookup_url() -> String {
    DEFAULT_LOOKUP_URL.to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64
}

fn default_log_level() -> String {
    coinpilot_telemetry::logging::DEFAULT_FILTER.to_string()
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_lookup_url(),
            timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            client_id: None,
            websocket: WsConfig::default(),
            public_ip: PublicIpConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the default path if present.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Apply CLI overrides.
    pub fn apply_overrides(&mut self, origin: Option<String>, client_id: Option<String>) {
        if let Some(origin) = origin {
            self.origin = origin;
        }
        if client_id.is_some() {
            self.client_id = client_id;
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.websocket.outbound_buffer == 0 {
            return Err(AppError::Config(
                "websocket.outbound_buffer must be at least 1".to_string(),
            ));
        }
        if self.telemetry.stats_interval_secs == 0 {
            return Err(AppError::Config(
                "telemetry.stats_interval_secs must be at least 1".to_string(),
            ));
        }
        if let Some(id) = &self.client_id {
            if id.is_empty() || id.contains('/') {
                return Err(AppError::Config(format!("invalid client_id: {id:?}")));
            }
        }
        Ok(())
    }
}

impl From<&AppConfig> for ConnectionConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            origin: cfg.origin.clone(),
            client_id: cfg.client_id.clone(),
            max_reconnect_attempts: cfg.websocket.max_reconnect_attempts,
            reconnect_base_delay_ms: cfg.websocket.reconnect_base_delay_ms,
            outbound_buffer: cfg.websocket.outbound_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.origin, "http://localhost:8000");
        assert_eq!(config.client_id, None);
        assert_eq!(config.websocket.max_reconnect_attempts, 5);
        assert_eq!(config.websocket.reconnect_base_delay_ms, 2000);
        assert!(config.public_ip.enabled);
        assert_eq!(config.public_ip.timeout_ms, 3000);
        assert_eq!(config.telemetry.stats_interval_secs, 60);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            origin = "https://dash.example.com"
            client_id = "client_abc123"

            [websocket]
            max_reconnect_attempts = 3

            [public_ip]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.origin, "https://dash.example.com");
        assert_eq!(config.client_id.as_deref(), Some("client_abc123"));
        assert_eq!(config.websocket.max_reconnect_attempts, 3);
        assert_eq!(config.websocket.reconnect_base_delay_ms, 2000);
        assert!(!config.public_ip.enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_toml("[websocket]\noutbound_buffer = 0").is_err());
        assert!(AppConfig::from_toml("client_id = \"a/b\"").is_err());
        assert!(AppConfig::from_toml("origin = 42").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/coinpilot.toml")).is_err());
    }

    #[test]
    fn test_overrides_and_connection_config() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("https://other.example".to_string()), None);
        config.apply_overrides(None, Some("client_fixed01".to_string()));

        let conn = ConnectionConfig::from(&config);
        assert_eq!(conn.origin, "https://other.example");
        assert_eq!(conn.client_id.as_deref(), Some("client_fixed01"));
        assert_eq!(conn.max_reconnect_attempts, 5);
        assert_eq!(conn.outbound_buffer, 256);
    }

    #[test]
    fn test_bundled_default_config_parses() {
        let content = include_str!("../../../config/default.toml");
        let config = AppConfig::from_toml(content).unwrap();
        assert_eq!(config.websocket.max_reconnect_attempts, 5);
    }
}
