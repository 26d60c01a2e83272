// crates/sync-engine/src/transport.rs
//! Boundary between the engine and the cart backend

use async_trait::async_trait;
use cartsync_core::{PendingOperation, ServerCartSnapshot, SubmitReply};
use std::time::Duration;
use thiserror::Error;

/// A round-trip that did not produce a server verdict
///
/// Transport errors are always retried; only an explicit rejection in a
/// `SubmitReply` ends an operation early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not reach the server
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server did not answer in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server failed without judging the operation
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The answer could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Sends operations to the cart backend
#[async_trait]
pub trait CartTransport: Send + Sync {
    /// Submits operations in order
    ///
    /// A successful reply carries exactly one outcome per operation.
    async fn submit(&self, operations: &[PendingOperation]) -> Result<SubmitReply, TransportError>;

    /// Fetches the authoritative cart
    async fn fetch_cart(&self) -> Result<ServerCartSnapshot, TransportError>;

    /// Whether `submit` accepts more than one operation per call
    fn supports_batching(&self) -> bool {
        false
    }
}
