//! Configuration management for Polpo
//!
//! This module handles loading, validation, and management of the client
//! configuration from YAML files with support for environment variable
//! overrides for credentials.

use crate::error::{PolpoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// GraphQL endpoint configuration
    pub api: ApiConfig,

    /// Account credentials
    pub auth: AuthConfig,

    /// Token lifecycle configuration
    pub token: TokenConfig,

    /// Retry and backoff configuration
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// GraphQL endpoint parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Account credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Account email address
    pub email: String,

    /// Account password
    pub password: String,
}

/// Token lifecycle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Safety margin in seconds: a token is treated as expired this many
    /// seconds before its actual expiry
    pub refresh_margin_secs: u64,

    /// Interval in seconds between unconditional background refreshes
    pub auto_refresh_interval_secs: u64,
}

/// Retry and backoff parameters for the login loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum login attempts before giving up
    pub login_attempts: u32,

    /// Initial backoff delay in seconds
    pub initial_backoff_secs: u64,

    /// Backoff delay cap in seconds
    pub max_backoff_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON-formatted log lines
    pub json_format: bool,

    /// Log full API responses at debug level
    #[serde(default = "default_true")]
    pub log_api_responses: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.oeit-kraken.energy/v1/graphql/".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: 120,
            auto_refresh_interval_secs: 3000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            login_attempts: 5,
            initial_backoff_secs: 1,
            max_backoff_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json_format: false,
            log_api_responses: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from the default locations, falling back to defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            "polpo_config.yaml",
            "/etc/polpo/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Apply credential and endpoint overrides from the environment
    fn apply_env_overrides(&mut self) {
        if let Ok(email) = std::env::var("POLPO_EMAIL") {
            self.auth.email = email;
        }
        if let Ok(password) = std::env::var("POLPO_PASSWORD") {
            self.auth.password = password;
        }
        if let Ok(endpoint) = std::env::var("POLPO_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.api.endpoint = endpoint;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.is_empty() {
            return Err(PolpoError::validation(
                "api.endpoint",
                "Endpoint cannot be empty",
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(PolpoError::validation(
                "api.timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.auth.email.is_empty() {
            return Err(PolpoError::validation(
                "auth.email",
                "Email cannot be empty",
            ));
        }

        if self.auth.password.is_empty() {
            return Err(PolpoError::validation(
                "auth.password",
                "Password cannot be empty",
            ));
        }

        if self.retry.login_attempts == 0 {
            return Err(PolpoError::validation(
                "retry.login_attempts",
                "Must be greater than 0",
            ));
        }

        if self.retry.max_backoff_secs < self.retry.initial_backoff_secs {
            return Err(PolpoError::validation(
                "retry.max_backoff_secs",
                "Must be at least the initial backoff",
            ));
        }

        if self.token.auto_refresh_interval_secs == 0 {
            return Err(PolpoError::validation(
                "token.auto_refresh_interval_secs",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.email = "user@example.com".to_string();
        config.auth.password = "secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.login_attempts, 5);
        assert_eq!(config.retry.initial_backoff_secs, 1);
        assert_eq!(config.retry.max_backoff_secs, 30);
        assert_eq!(config.token.refresh_margin_secs, 120);
        assert!(config.api.endpoint.starts_with("https://"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.api.endpoint = String::new();
        assert!(config.validate().is_err());

        config = valid_config();
        config.auth.password = String::new();
        assert!(config.validate().is_err());

        config = valid_config();
        config.retry.max_backoff_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.api.endpoint, deserialized.api.endpoint);
        assert_eq!(
            config.token.auto_refresh_interval_secs,
            deserialized.token.auto_refresh_interval_secs
        );
    }
}
