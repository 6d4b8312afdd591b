//! Error types and handling for Polpo
//!
//! This module defines the error types used throughout the crate,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Polpo operations
pub type Result<T> = std::result::Result<T, PolpoError>;

/// Main error type for Polpo
#[derive(Debug, Error)]
pub enum PolpoError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network-related errors (transport failures at the socket level)
    #[error("Network error: {message}")]
    Network { message: String },

    /// GraphQL API errors reported by the Kraken backend
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl PolpoError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        PolpoError::Config {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        PolpoError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        PolpoError::Api {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        PolpoError::Auth {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        PolpoError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        PolpoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        PolpoError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        PolpoError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PolpoError {
    fn from(err: std::io::Error) -> Self {
        PolpoError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PolpoError {
    fn from(err: serde_yaml::Error) -> Self {
        PolpoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PolpoError {
    fn from(err: serde_json::Error) -> Self {
        PolpoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PolpoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PolpoError::timeout(err.to_string())
        } else {
            PolpoError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for PolpoError {
    fn from(err: chrono::ParseError) -> Self {
        PolpoError::validation("datetime", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PolpoError::config("test config error");
        assert!(matches!(err, PolpoError::Config { .. }));

        let err = PolpoError::api("test api error");
        assert!(matches!(err, PolpoError::Api { .. }));

        let err = PolpoError::validation("field", "test validation error");
        assert!(matches!(err, PolpoError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = PolpoError::auth("token rejected");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Authentication error: token rejected");

        let err = PolpoError::validation("target_time", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: target_time - invalid value");
    }
}
