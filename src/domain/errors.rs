//! Domain error types
//!
//! This module defines the error hierarchy for the relay. Configuration
//! problems are fatal and propagate out of the pipeline; EHR failures are
//! caught by the publisher and turned into structured responses.
//! No third-party error types are exposed.

use thiserror::Error;

/// Main relay error type
///
/// This is the primary error type used throughout the crate.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration-related errors (unknown trigger, missing event name, bad config file)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tenant lookup failures
    #[error("Tenant error: {0}")]
    Tenant(String),

    /// EHR access errors
    #[error("EHR error: {0}")]
    Ehr(#[from] EhrError),

    /// Publish sink errors
    #[error("Publish error: {0}")]
    Publish(String),

    /// Event source errors
    #[error("Event source error: {0}")]
    EventSource(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// EHR-specific errors
///
/// Errors that occur when talking to the EHR's FHIR API.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum EhrError {
    /// Failed to connect to the EHR
    #[error("Failed to connect to EHR: {0}")]
    ConnectionFailed(String),

    /// Invalid response from the EHR
    #[error("Invalid response from EHR: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Any other failure reported by an EHR implementation
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_display() {
        let err = RelayError::Configuration("missing event name".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing event name");
    }

    #[test]
    fn test_ehr_error_conversion() {
        let ehr_err = EhrError::ConnectionFailed("Network error".to_string());
        let relay_err: RelayError = ehr_err.into();
        assert!(matches!(relay_err, RelayError::Ehr(_)));
    }

    #[test]
    fn test_ehr_other_display_is_bare() {
        let err = EhrError::Other("EHR is gone".to_string());
        assert_eq!(err.to_string(), "EHR is gone");
    }

    #[test]
    fn test_server_error_display() {
        let err = EhrError::ServerError {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Server error: 503 - unavailable");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let relay_err: RelayError = io_err.into();
        assert!(matches!(relay_err, RelayError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let relay_err: RelayError = json_err.into();
        assert!(matches!(relay_err, RelayError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let relay_err: RelayError = toml_err.into();
        assert!(matches!(relay_err, RelayError::Configuration(_)));
        assert!(relay_err.to_string().contains("TOML parse error"));
    }
}
