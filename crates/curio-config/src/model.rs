//! Configuration schema for Curio.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root config for the Curio assistant core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CurioConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl CurioConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> CurioConfigBuilder {
        CurioConfigBuilder::new()
    }

    /// Load and validate a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.max_suggestions > 5 {
            return Err(ConfigError::InvalidValue {
                field: "context.max_suggestions",
                reason: format!("{} exceeds the cap of 5", self.context.max_suggestions),
            });
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.base_delay_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_delay_ms",
                reason: "must be at least base_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for assembling a `CurioConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct CurioConfigBuilder {
    config: CurioConfig,
}

impl CurioConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: CurioConfig::default(),
        }
    }

    /// Replace the server configuration.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Replace the session lifecycle configuration.
    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the context validation configuration.
    pub fn context(mut self, context: ContextConfig) -> Self {
        self.config.context = context;
        self
    }

    /// Replace the stream fanout configuration.
    pub fn stream(mut self, stream: StreamConfig) -> Self {
        self.config.stream = stream;
        self
    }

    /// Replace the client reconnect configuration.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Replace the rate limit configuration.
    pub fn rate_limits(mut self, rate_limits: RateLimitsConfig) -> Self {
        self.config.rate_limits = rate_limits;
        self
    }

    /// Replace the catalog configuration.
    pub fn catalog(mut self, catalog: CatalogConfig) -> Self {
        self.config.catalog = catalog;
        self
    }

    /// Finalize and return the built `CurioConfig`.
    pub fn build(self) -> CurioConfig {
        self.config
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_address")]
    pub address: String,
    /// Bind port for the HTTP listener.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Inactivity window after which a session expires, in minutes.
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Interval between expiry sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Search records retained per session before the oldest is dropped.
    #[serde(default = "default_max_search_records")]
    pub max_search_records: usize,
    /// Fresh product references retained per session.
    #[serde(default = "default_max_references")]
    pub max_references: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_search_records: default_max_search_records(),
            max_references: default_max_references(),
        }
    }
}

/// Context validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Age beyond which a search record no longer validates ids, in minutes.
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: i64,
    /// Maximum suggestions returned on a validation miss (capped at 5).
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            freshness_minutes: default_freshness_minutes(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

/// Event fanout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Broadcast buffer size for the per-session event bus.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

/// Client reconnect backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First retry delay, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Ceiling applied to the exponential backoff, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before the consumer gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Per-client-IP rate limit quotas, per minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Whether rate limiting is enforced at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Session creations per minute.
    #[serde(default = "default_create_session_limit")]
    pub create_session_per_minute: u32,
    /// Chat messages per minute.
    #[serde(default = "default_send_message_limit")]
    pub send_message_per_minute: u32,
    /// Stream connections per minute.
    #[serde(default = "default_stream_limit")]
    pub stream_per_minute: u32,
    /// Direct function-endpoint calls per minute.
    #[serde(default = "default_function_limit")]
    pub function_calls_per_minute: u32,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            create_session_per_minute: default_create_session_limit(),
            send_message_per_minute: default_send_message_limit(),
            stream_per_minute: default_stream_limit(),
            function_calls_per_minute: default_function_limit(),
        }
    }
}

/// Catalog bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Whether the server seeds the demo catalog on startup.
    #[serde(default = "default_true")]
    pub seed_demo_data: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed_demo_data: true,
        }
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_session_ttl_minutes() -> i64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_search_records() -> usize {
    20
}

fn default_max_references() -> usize {
    50
}

fn default_freshness_minutes() -> i64 {
    30
}

fn default_max_suggestions() -> usize {
    3
}

fn default_event_buffer() -> usize {
    512
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_create_session_limit() -> u32 {
    10
}

fn default_send_message_limit() -> u32 {
    20
}

fn default_stream_limit() -> u32 {
    10
}

fn default_function_limit() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = CurioConfig::default();
        assert_eq!(config.sessions.ttl_minutes, 30);
        assert_eq!(config.context.freshness_minutes, 30);
        assert_eq!(config.context.max_suggestions, 3);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.rate_limits.send_message_per_minute, 20);
        config.validate().expect("defaults validate");
    }

    #[test]
    fn builder_overrides_sections() {
        let config = CurioConfig::builder()
            .reconnect(ReconnectConfig {
                base_delay_ms: 100,
                max_delay_ms: 1_000,
                max_attempts: 3,
            })
            .catalog(CatalogConfig {
                seed_demo_data: false,
            })
            .build();
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.catalog.seed_demo_data, false);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: CurioConfig =
            serde_yaml::from_str("server:\n  port: 9100\n").expect("parse partial config");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.address, "127.0.0.1".to_string());
        assert_eq!(config.sessions.ttl_minutes, 30);
    }

    #[test]
    fn validate_rejects_oversized_suggestion_cap() {
        let mut config = CurioConfig::default();
        config.context.max_suggestions = 6;
        let err = config.validate().expect_err("cap exceeded");
        let ConfigError::InvalidValue { field, .. } = err else {
            panic!("expected invalid value, got {err:?}");
        };
        assert_eq!(field, "context.max_suggestions");
    }

    #[test]
    fn load_reads_yaml_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("curio.yaml");
        std::fs::write(&path, "sessions:\n  ttl_minutes: 5\n").expect("write config");
        let config = CurioConfig::load(&path).expect("load config");
        assert_eq!(config.sessions.ttl_minutes, 5);
    }
}
