// crates/network/src/error.rs
//! Error types for network operations

use cartsync_sync_engine::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with an unexpected status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Network unavailable
    #[error("Network is unavailable")]
    NetworkUnavailable,

    /// Timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl NetworkError {
    /// Returns true if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout(_) | NetworkError::NetworkUnavailable => true,
            NetworkError::Http(e) => !e.is_builder() && !e.is_decode(),
            NetworkError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        match self {
            NetworkError::Status { status, .. } => (400..500).contains(status),
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_client_error()),
            _ => false,
        }
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        match self {
            NetworkError::Status { status, .. } => *status >= 500,
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_server_error()),
            _ => false,
        }
    }
}

impl From<NetworkError> for TransportError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Timeout(duration) => TransportError::Timeout(duration),
            NetworkError::Status { status, message } => TransportError::Server { status, message },
            NetworkError::Decode(message) => TransportError::MalformedResponse(message),
            NetworkError::Http(e) if e.is_decode() => {
                TransportError::MalformedResponse(e.to_string())
            }
            other => TransportError::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::InvalidUrl("test".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_network_unavailable() {
        let err = NetworkError::NetworkUnavailable;
        assert!(err.to_string().contains("unavailable"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(NetworkError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(NetworkError::NetworkUnavailable.is_retryable());
        assert!(NetworkError::Status {
            status: 503,
            message: "busy".to_string()
        }
        .is_retryable());
        assert!(!NetworkError::InvalidUrl("test".to_string()).is_retryable());
    }

    #[test]
    fn test_status_classification() {
        let client = NetworkError::Status {
            status: 422,
            message: String::new(),
        };
        assert!(client.is_client_error());
        assert!(!client.is_server_error());
    }

    #[test]
    fn test_into_transport_error() {
        let timeout: TransportError = NetworkError::Timeout(Duration::from_secs(10)).into();
        assert_eq!(timeout, TransportError::Timeout(Duration::from_secs(10)));

        let server: TransportError = NetworkError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        }
        .into();
        assert!(matches!(server, TransportError::Server { status: 502, .. }));

        let offline: TransportError = NetworkError::NetworkUnavailable.into();
        assert!(matches!(offline, TransportError::Connection(_)));
    }
}
