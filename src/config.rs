//! Listener configuration
//!
//! ```yaml
//! url: ws://localhost:3333/adonis-ws
//! topics: [chat, breakpoints]
//! events: [message]
//! headers:
//!   Authorization: Bearer token
//! log_level: info
//! reconnect:
//!   slot_ms: 500
//!   max_collision: 7
//! ```

use adonis_ws::{CollisionBackoff, Headers};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable overriding `url`
pub const URL_ENV_VAR: &str = "ADONIS_WS_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the `adonis_listen` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// WebSocket endpoint (ws:// or wss://)
    pub url: String,

    /// Topics joined on every open
    #[serde(default)]
    pub topics: Vec<String>,

    /// Event names logged as they arrive
    #[serde(default)]
    pub events: Vec<String>,

    /// Headers sent with the upgrade request
    #[serde(default)]
    pub headers: Headers,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reason sent when closing on shutdown
    #[serde(default)]
    pub close_reason: Option<String>,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Collision backoff parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_slot_ms")]
    pub slot_ms: u64,
    #[serde(default = "default_max_collision")]
    pub max_collision: u32,
    /// Give up after this many attempts (unlimited when absent)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            slot_ms: default_slot_ms(),
            max_collision: default_max_collision(),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn strategy(&self) -> CollisionBackoff {
        CollisionBackoff::new(
            Duration::from_millis(self.slot_ms),
            self.max_collision,
            self.max_attempts,
        )
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_slot_ms() -> u64 {
    adonis_ws::traits::reconnect::DEFAULT_SLOT.as_millis() as u64
}

fn default_max_collision() -> u32 {
    adonis_ws::traits::reconnect::MAX_COLLISION
}

impl ListenConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    /// Parse YAML, apply environment overrides and validate
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let mut config: ListenConfig = serde_yaml::from_str(yaml_content)?;

        // Override URL from environment if present
        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            info!("Overriding url from {}", URL_ENV_VAR);
            config.url = url;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("url must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.is_empty() {
                return Err(ConfigError::ValidationError(
                    "topic names must not be empty".to_string(),
                ));
            }
            if !seen.insert(topic.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate topic: {}",
                    topic
                )));
            }
        }

        if self.reconnect.slot_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.slot_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_fields() {
        let config: ListenConfig = serde_yaml::from_str("url: ws://localhost:3333").unwrap();

        assert!(config.topics.is_empty());
        assert!(config.headers.is_empty());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reconnect.slot_ms, 500);
        assert_eq!(config.reconnect.max_collision, 7);
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn test_validate_rejects_duplicate_topics() {
        let config: ListenConfig =
            serde_yaml::from_str("url: ws://localhost\ntopics: [chat, chat]").unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("chat")
        ));
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let config: ListenConfig = serde_yaml::from_str("url: ''").unwrap();
        assert!(config.validate().is_err());
    }
}
