//! Push notifications about products in the cart

use crate::types::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What happened to a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// New authoritative unit price
    PriceChanged { unit_price: Decimal },
    /// Units currently available
    StockChanged { available: u32 },
    /// Product delisted
    ProductRemoved,
}

/// A sequenced message from the notification channel
///
/// `sequence` increases per product; receivers drop anything not newer than
/// what they already applied for that product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub product_id: ProductId,
    pub sequence: u64,
    pub event: NotificationEvent,
}

impl Notification {
    /// Creates a price change notification
    pub fn price_changed(product_id: impl Into<ProductId>, sequence: u64, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            sequence,
            event: NotificationEvent::PriceChanged { unit_price },
        }
    }

    /// Creates a stock change notification
    pub fn stock_changed(product_id: impl Into<ProductId>, sequence: u64, available: u32) -> Self {
        Self {
            product_id: product_id.into(),
            sequence,
            event: NotificationEvent::StockChanged { available },
        }
    }

    /// Creates a product removal notification
    pub fn product_removed(product_id: impl Into<ProductId>, sequence: u64) -> Self {
        Self {
            product_id: product_id.into(),
            sequence,
            event: NotificationEvent::ProductRemoved,
        }
    }
}
