//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "swapgate.toml",
    "./config/swapgate.toml",
    "/etc/swapgate/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("SWAPGATE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // HTTP
        if let Ok(val) = env::var("SWAPGATE_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
        if let Ok(val) = env::var("SWAPGATE_HTTP_HOST") {
            config.http.host = val;
        }
        if let Ok(val) = env::var("SWAPGATE_CORS_ORIGINS") {
            config.http.cors_origins = val.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Database
        if let Ok(val) = env::var("SWAPGATE_DATABASE_URL") {
            config.database.url = val;
        }
        if let Ok(val) = env::var("SWAPGATE_DATABASE_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                config.database.max_connections = max;
            }
        }

        // Upstream
        if let Ok(val) = env::var("SWAPGATE_UPSTREAM_BASE_URL") {
            config.upstream.base_url = val;
        }
        if let Ok(val) = env::var("SWAPGATE_UPSTREAM_API_KEY") {
            config.upstream.api_key = val;
        }
        if let Ok(val) = env::var("SWAPGATE_UPSTREAM_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                config.upstream.request_timeout_ms = timeout;
            }
        }

        // Outbound queue
        if let Ok(val) = env::var("SWAPGATE_OUTBOUND_MAX_RPS") {
            if let Ok(rate) = val.parse() {
                config.outbound.max_requests_per_second = rate;
            }
        }
        if let Ok(val) = env::var("SWAPGATE_OUTBOUND_HEADROOM") {
            if let Ok(headroom) = val.parse() {
                config.outbound.headroom = headroom;
            }
        }
        if let Ok(val) = env::var("SWAPGATE_OUTBOUND_MAX_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                config.outbound.max_attempts = attempts;
            }
        }

        // Inbound limits
        if let Ok(val) = env::var("SWAPGATE_LIMIT_GENERAL_MAX") {
            if let Ok(max) = val.parse() {
                config.limits.general.max_requests = max;
            }
        }
        if let Ok(val) = env::var("SWAPGATE_LIMIT_GENERAL_WINDOW_SECS") {
            if let Ok(window) = val.parse() {
                config.limits.general.window_seconds = window;
            }
        }
        if let Ok(val) = env::var("SWAPGATE_LIMIT_CREATE_MAX") {
            if let Ok(max) = val.parse() {
                config.limits.create.max_requests = max;
            }
        }
        if let Ok(val) = env::var("SWAPGATE_LIMIT_CREATE_WINDOW_SECS") {
            if let Ok(window) = val.parse() {
                config.limits.create.window_seconds = window;
            }
        }

        // General
        if let Ok(val) = env::var("SWAPGATE_DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
