//! Error types for cart operations
//!
//! Errors fall into three tiers:
//! - **Local**: rejected before any network interaction (bad quantity, unknown product)
//! - **Retryable**: transport failures that feed the backoff loop and never reach the UI
//! - **User-visible**: server rejections and exhausted retry budgets
//!
//! The sync engine only surfaces the last tier to the UI.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::{OpId, ProductId};

/// Why the server refused an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Not enough stock to satisfy the requested quantity
    OutOfStock,
    /// The price changed since the line was added
    PriceChanged {
        /// Current authoritative unit price, when the server reports it
        #[serde(default)]
        current_price: Option<Decimal>,
    },
    /// The product no longer exists in the catalog
    ProductRemoved,
    /// Any other refusal the server explains in free text
    Other { message: String },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfStock => write!(f, "out of stock"),
            Self::PriceChanged {
                current_price: Some(price),
            } => write!(f, "price changed to {}", price),
            Self::PriceChanged { current_price: None } => write!(f, "price changed"),
            Self::ProductRemoved => write!(f, "product removed"),
            Self::Other { message } => write!(f, "{}", message),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Retried transparently, never shown to the user
    Recoverable,
    /// Shown to the user; the cart remains usable
    UserVisible,
    /// Local persistence is broken; the session cannot be trusted
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::UserVisible => write!(f, "UserVisible"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for cart operations
#[derive(Error, Debug)]
pub enum CartError {
    // ===== Local validation =====
    /// Quantity was zero/negative where a positive one is required, or out of range
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Product identifier was empty or malformed
    #[error("Invalid product: {product_id:?}")]
    InvalidProduct { product_id: String },

    /// Unit price was negative
    #[error("Invalid unit price: {price}")]
    InvalidPrice { price: Decimal },

    // ===== Transport =====
    /// Network round-trip failed or timed out
    #[error("Transport error: {message}")]
    Transport { message: String },

    // ===== Server decisions =====
    /// The server refused an operation
    #[error("Operation {op_id} on {product_id} rejected: {reason}")]
    Rejected {
        op_id: OpId,
        product_id: ProductId,
        reason: RejectionReason,
    },

    /// Retry budget exhausted
    #[error("Operation {op_id} on {product_id} failed permanently after {attempts} attempts")]
    PermanentFailure {
        op_id: OpId,
        product_id: ProductId,
        attempts: u32,
    },

    // ===== Persistence =====
    /// Local store could not persist state
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CartError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Transport { .. } => ErrorSeverity::Recoverable,
            Self::InvalidQuantity { .. }
            | Self::InvalidProduct { .. }
            | Self::InvalidPrice { .. }
            | Self::Rejected { .. }
            | Self::PermanentFailure { .. } => ErrorSeverity::UserVisible,
            Self::Storage { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns a user-friendly message suitable for a toast or line badge
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuantity { .. } => "Please choose a quantity of at least 1.".to_string(),
            Self::InvalidProduct { .. } => "Product not found.".to_string(),
            Self::InvalidPrice { .. } => "This product has an invalid price.".to_string(),
            Self::Transport { .. } => {
                "Cannot reach the store right now. Your cart is saved on this device.".to_string()
            }
            Self::Rejected { reason, .. } => match reason {
                RejectionReason::OutOfStock => {
                    "Sorry, this item is out of stock. Your cart was updated.".to_string()
                }
                RejectionReason::PriceChanged { .. } => {
                    "The price of this item changed. Please review your cart.".to_string()
                }
                RejectionReason::ProductRemoved => {
                    "This product is no longer available and was removed.".to_string()
                }
                RejectionReason::Other { message } => message.clone(),
            },
            Self::PermanentFailure { .. } => {
                "We couldn't save this change to your cart. Tap to retry.".to_string()
            }
            Self::Storage { .. } => "Your cart could not be saved on this device.".to_string(),
        }
    }

    /// Helper to create a storage error from any error type
    pub fn storage<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using CartError
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_only_retryable_error() {
        assert!(CartError::transport("reset").is_retryable());
        assert!(!CartError::InvalidQuantity { quantity: 0 }.is_retryable());
        assert!(!CartError::Rejected {
            op_id: OpId::new(),
            product_id: ProductId::from("sku-1"),
            reason: RejectionReason::OutOfStock,
        }
        .is_retryable());
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(
            CartError::transport("timeout").severity(),
            ErrorSeverity::Recoverable
        );
        assert_eq!(
            CartError::InvalidQuantity { quantity: -1 }.severity(),
            ErrorSeverity::UserVisible
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(
            CartError::storage("save failed", io).severity(),
            ErrorSeverity::Fatal
        );
    }

    #[test]
    fn test_error_display() {
        let err = CartError::PermanentFailure {
            op_id: OpId::new(),
            product_id: ProductId::from("sku-9"),
            attempts: 5,
        };
        let text = err.to_string();
        assert!(text.contains("sku-9"));
        assert!(text.contains("5 attempts"));
    }

    #[test]
    fn test_rejection_reason_display() {
        let reason = RejectionReason::PriceChanged {
            current_price: Some(Decimal::new(1299, 2)),
        };
        assert_eq!(reason.to_string(), "price changed to 12.99");
        assert_eq!(RejectionReason::OutOfStock.to_string(), "out of stock");
    }

    #[test]
    fn test_rejection_reason_wire_format() {
        let json = serde_json::to_string(&RejectionReason::OutOfStock).unwrap();
        assert_eq!(json, r#"{"reason":"out_of_stock"}"#);

        let parsed: RejectionReason =
            serde_json::from_str(r#"{"reason":"price_changed"}"#).unwrap();
        assert_eq!(parsed, RejectionReason::PriceChanged { current_price: None });
    }

    #[test]
    fn test_user_messages_are_friendly() {
        let err = CartError::Rejected {
            op_id: OpId::new(),
            product_id: ProductId::from("sku-1"),
            reason: RejectionReason::OutOfStock,
        };
        assert!(err.user_message().contains("out of stock"));
        assert!(!CartError::transport("ECONNRESET")
            .user_message()
            .contains("ECONNRESET"));
    }
}
