//! Application configuration structs
//!
//! Loads configuration from environment variables (with `.env` support).

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub redis: RedisConfig,
    pub chat: ChatConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Chat core tunables
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Maximum messages retained per room; oldest evicted first
    #[serde(default = "default_message_log_cap")]
    pub message_log_cap: u64,
    /// Sliding window for client-event de-duplication, in seconds
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    /// Room inactivity threshold before the reaper tears it down, in seconds
    #[serde(default = "default_reap_threshold_secs")]
    pub reap_threshold_secs: u64,
    /// Interval between reaper passes, in seconds
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            message_log_cap: default_message_log_cap(),
            dedup_window_secs: default_dedup_window_secs(),
            reap_threshold_secs: default_reap_threshold_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "duo-chat".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_message_log_cap() -> u64 {
    10_000
}

fn default_dedup_window_secs() -> u64 {
    300
}

fn default_reap_threshold_secs() -> u64 {
    1800
}

fn default_reap_interval_secs() -> u64 {
    60
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: env::var("GATEWAY_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: env::var("REDIS_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_redis_max_connections),
            },
            chat: ChatConfig {
                message_log_cap: env::var("MESSAGE_LOG_CAP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_message_log_cap),
                dedup_window_secs: env::var("DEDUP_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_dedup_window_secs),
                reap_threshold_secs: env::var("REAP_THRESHOLD_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_reap_threshold_secs),
                reap_interval_secs: env::var("REAP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_reap_interval_secs),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        };
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_chat_defaults() {
        let chat = ChatConfig::default();
        assert_eq!(chat.message_log_cap, 10_000);
        assert_eq!(chat.dedup_window_secs, 300);
        assert_eq!(chat.reap_threshold_secs, 1800);
        assert_eq!(chat.reap_interval_secs, 60);
    }
}
