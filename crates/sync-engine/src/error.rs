// crates/sync-engine/src/error.rs
//! Error types for sync operations

use crate::transport::TransportError;
use cartsync_core::CartError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local cart operation failed (validation or storage)
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Network round-trip failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Another sync cycle is already talking to the server
    #[error("Sync already in progress")]
    SyncInProgress,

    /// The engine has no connectivity
    #[error("Sync engine is offline")]
    Offline,

    /// Internal state lock was poisoned by a panicking thread
    #[error("Sync engine state lock poisoned")]
    LockPoisoned,
}

impl SyncError {
    /// Returns true if the error came from local validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SyncError::Cart(
                CartError::InvalidQuantity { .. }
                    | CartError::InvalidProduct { .. }
                    | CartError::InvalidPrice { .. }
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::SyncInProgress;
        assert!(err.to_string().contains("already in progress"));
    }

    #[test]
    fn test_cart_error_is_transparent() {
        let err: SyncError = CartError::InvalidQuantity { quantity: -2 }.into();
        assert_eq!(err.to_string(), "Invalid quantity: -2");
        assert!(err.is_validation());
    }

    #[test]
    fn test_transport_error_wraps() {
        let err: SyncError = TransportError::Connection("refused".to_string()).into();
        assert!(err.to_string().contains("refused"));
        assert!(!err.is_validation());
    }
}
