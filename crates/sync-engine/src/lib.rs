// crates/sync-engine/src/lib.rs
//! Optimistic cart synchronization engine
//!
//! This crate keeps a shopping cart responsive while the network is slow or gone:
//! - Local-first cart model persisted on every change
//! - Ordered mutation queue that survives restarts
//! - Background reconciliation with retry, backoff and per-product rollback
//! - Server push notifications with stale-message protection
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use cartsync_core::{PendingOperation, ServerCartSnapshot, SubmitReply};
//! use cartsync_store::MemoryStore;
//! use cartsync_sync_engine::{CartTransport, SyncConfig, SyncEngine, TransportError};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! struct Backend;
//!
//! #[async_trait]
//! impl CartTransport for Backend {
//!     async fn submit(&self, ops: &[PendingOperation]) -> Result<SubmitReply, TransportError> {
//!         Ok(SubmitReply::confirmed(ops.len()))
//!     }
//!
//!     async fn fetch_cart(&self) -> Result<ServerCartSnapshot, TransportError> {
//!         Ok(ServerCartSnapshot::default())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::new(
//!     SyncConfig::default(),
//!     Arc::new(Backend),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! // Visible immediately, sent later
//! engine.add_item("sku-42", 2, Decimal::new(1999, 2))?;
//!
//! engine.set_online(true)?;
//! engine.sync_once().await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod model;
mod notification;
mod queue;
mod transport;
mod types;

pub use engine::{SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use model::{AppliedChange, CartModel, StagedChange};
pub use notification::{
    InMemoryChannel, NotificationChannel, NotificationHandler, NotificationPump,
    NotificationSource, NotificationStream, PumpStats, SequenceGate, Subscription,
};
pub use queue::{Batches, MutationQueue};
pub use transport::{CartTransport, TransportError};
pub use types::{CartEvent, EventCallback, LineIssue, SyncReport, SyncStatus};
