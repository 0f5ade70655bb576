//! Swapgate configuration.
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub outbound: OutboundQueueConfig,
    pub limits: InboundLimitConfig,
    pub assets: AssetPolicyConfig,

    /// Enable development mode (relaxed limits, local database)
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            upstream: UpstreamConfig::default(),
            outbound: OutboundQueueConfig::default(),
            limits: InboundLimitConfig::default(),
            assets: AssetPolicyConfig::default(),
            dev_mode: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/swapgate.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// Upstream exchange API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchange.example/v2".to_string(),
            api_key: String::new(),
            request_timeout_ms: 15_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Outbound request queue configuration.
///
/// `max_requests_per_second` is the upstream account's documented ceiling;
/// the dispatcher targets `max_requests_per_second * headroom`. The ceiling
/// is global to the upstream account: when running more than one gateway
/// instance, operators must divide it across instances themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundQueueConfig {
    pub max_requests_per_second: f64,
    /// Fraction of the documented ceiling actually used (0 < headroom <= 1)
    pub headroom: f64,
    /// Attempt cap for transient upstream failures
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for OutboundQueueConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: 10.0,
            headroom: 0.8,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
        }
    }
}

/// One inbound rate-limit tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitTier {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for LimitTier {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_seconds: 60,
        }
    }
}

/// Inbound rate limiting: a loose general tier plus a strict tier for the
/// funds-relevant transfer-creation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundLimitConfig {
    pub general: LimitTier,
    pub create: LimitTier,
    /// Idle-counter sweep interval in seconds
    pub sweep_interval_seconds: u64,
}

impl Default for InboundLimitConfig {
    fn default() -> Self {
        Self {
            general: LimitTier {
                max_requests: 60,
                window_seconds: 60,
            },
            create: LimitTier {
                max_requests: 10,
                window_seconds: 60,
            },
            sweep_interval_seconds: 60,
        }
    }
}

/// One supported (currency, network) pair and its minimum amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub currency: String,
    pub network: String,
    /// Decimal string, compared exactly
    pub min_amount: String,
}

/// Supported assets table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPolicyConfig {
    pub supported: Vec<AssetConfig>,
}

impl Default for AssetPolicyConfig {
    fn default() -> Self {
        Self {
            supported: vec![
                AssetConfig {
                    currency: "sol".to_string(),
                    network: "sol".to_string(),
                    min_amount: "0.1".to_string(),
                },
                AssetConfig {
                    currency: "eth".to_string(),
                    network: "eth".to_string(),
                    min_amount: "0.005".to_string(),
                },
                AssetConfig {
                    currency: "btc".to_string(),
                    network: "btc".to_string(),
                    min_amount: "0.0005".to_string(),
                },
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Basic sanity checks applied after load
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound.max_requests_per_second <= 0.0 {
            return Err(ConfigError::ValidationError(
                "outbound.max_requests_per_second must be positive".to_string(),
            ));
        }
        if !(self.outbound.headroom > 0.0 && self.outbound.headroom <= 1.0) {
            return Err(ConfigError::ValidationError(
                "outbound.headroom must be in (0, 1]".to_string(),
            ));
        }
        if self.outbound.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "outbound.max_attempts must be at least 1".to_string(),
            ));
        }
        for tier in [&self.limits.general, &self.limits.create] {
            if tier.max_requests == 0 || tier.window_seconds == 0 {
                return Err(ConfigError::ValidationError(
                    "inbound limit tiers require non-zero max_requests and window_seconds"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Swapgate Configuration
# Environment variables (SWAPGATE_*) override these settings

dev_mode = false

[http]
port = 8080
host = "0.0.0.0"
cors_origins = ["http://localhost:3000"]

[database]
url = "sqlite://./data/swapgate.db?mode=rwc"
max_connections = 5

[upstream]
base_url = "https://api.exchange.example/v2"
api_key = ""
request_timeout_ms = 15000
connect_timeout_ms = 5000

[outbound]
# Documented upstream ceiling; dispatch targets ceiling * headroom.
# Global to the upstream account - divide across instances manually.
max_requests_per_second = 10.0
headroom = 0.8
max_attempts = 3
retry_base_delay_ms = 500
retry_max_delay_ms = 8000

[limits]
sweep_interval_seconds = 60

[limits.general]
max_requests = 60
window_seconds = 60

[limits.create]
max_requests = 10
window_seconds = 60

[[assets.supported]]
currency = "sol"
network = "sol"
min_amount = "0.1"

[[assets.supported]]
currency = "eth"
network = "eth"
min_amount = "0.005"

[[assets.supported]]
currency = "btc"
network = "btc"
min_amount = "0.0005"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.outbound.max_requests_per_second, 10.0);
        assert_eq!(config.limits.create.max_requests, 10);
        assert_eq!(config.assets.supported.len(), 3);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [outbound]
            max_requests_per_second = 5.0
            headroom = 0.5

            [limits.create]
            max_requests = 3
            window_seconds = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.outbound.max_requests_per_second, 5.0);
        assert_eq!(config.limits.create.max_requests, 3);
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn rejects_zero_rate() {
        let mut config = AppConfig::default();
        config.outbound.max_requests_per_second = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_headroom_above_one() {
        let mut config = AppConfig::default();
        config.outbound.headroom = 1.5;
        assert!(config.validate().is_err());
    }
}
