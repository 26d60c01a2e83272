// crates/sync-engine/src/types.rs
//! Sync status, events and reports

use crate::transport::TransportError;
use cartsync_core::{OpId, ProductId, RejectionReason};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// State of the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No connectivity; mutations are queued locally
    Offline,
    /// Connected with nothing in flight
    Idle,
    /// A batch is being sent
    Syncing,
    /// Waiting before the next attempt after a transport error
    Backoff {
        /// Consecutive failed cycles
        attempt: u32,
        /// Delay chosen for this backoff
        retry_in: Duration,
    },
}

impl SyncStatus {
    /// Returns true if the engine believes it is connected
    pub fn is_online(&self) -> bool {
        !matches!(self, SyncStatus::Offline)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Offline => write!(f, "offline"),
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Backoff { attempt, retry_in } => {
                write!(f, "backoff (attempt {}, retry in {:?})", attempt, retry_in)
            }
        }
    }
}

/// Persistent problem shown as a badge on a cart line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineIssue {
    /// The server never confirmed the last change to this line
    PermanentFailure { op_id: OpId, attempts: u32 },
    /// Fewer units are available than the line asks for
    LowStock { available: u32 },
}

/// Something the UI should hear about
#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    /// The server applied an operation
    Confirmed { op_id: OpId, product_id: ProductId },
    /// The server refused an operation and the cart was rolled back
    Rejected {
        op_id: OpId,
        product_id: ProductId,
        reason: RejectionReason,
    },
    /// The retry budget ran out; the line keeps a badge
    PermanentFailure {
        op_id: OpId,
        product_id: ProductId,
        attempts: u32,
    },
    /// The engine changed state
    StatusChanged { from: SyncStatus, to: SyncStatus },
    /// A push notification changed a line's price
    PriceUpdated {
        product_id: ProductId,
        unit_price: Decimal,
    },
    /// A push notification reported stock for a product in the cart
    StockChanged { product_id: ProductId, available: u32 },
    /// A product left the catalog and its line was removed
    ProductRemoved { product_id: ProductId },
    /// A server snapshot was merged
    Reconciled { server_revision: u64 },
}

/// Callback receiving cart events; invoked without any engine lock held
pub type EventCallback = Arc<dyn Fn(&CartEvent) + Send + Sync>;

/// What one sync cycle achieved
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Operations the server applied
    pub confirmed: usize,
    /// Operations the server refused
    pub rejected: usize,
    /// Operations dropped after exhausting their retry budget
    pub permanently_failed: usize,
    /// Transport error that ended the cycle, if any
    pub transport_error: Option<TransportError>,
    /// Backoff delay chosen after a transport error
    pub retry_in: Option<Duration>,
    /// True if the cycle did nothing because the engine is offline
    pub skipped_offline: bool,
    /// True if the session was cleared while a request was in flight
    pub discarded: bool,
}

impl SyncReport {
    /// Returns true if the cycle finished without a transport error
    pub fn is_clean(&self) -> bool {
        self.transport_error.is_none() && !self.skipped_offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::Idle.to_string(), "idle");
        let backoff = SyncStatus::Backoff {
            attempt: 2,
            retry_in: Duration::from_millis(1000),
        };
        assert!(backoff.to_string().contains("attempt 2"));
    }

    #[test]
    fn test_is_online() {
        assert!(!SyncStatus::Offline.is_online());
        assert!(SyncStatus::Idle.is_online());
        assert!(SyncStatus::Syncing.is_online());
    }

    #[test]
    fn test_default_report_is_clean() {
        let report = SyncReport::default();
        assert!(report.is_clean());
        assert_eq!(report.confirmed, 0);
    }
}
