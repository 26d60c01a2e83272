//! Shared cart types and the error taxonomy used across cartsync crates
//!
//! Everything that crosses a crate boundary lives here: cart lines and
//! state, pending operations, server snapshots, push notifications and the
//! typed errors that the sync engine surfaces to the UI.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{CartError, ErrorSeverity, RejectionReason, Result};
pub use types::{
    CartLine, CartState, Destination, LineId, Notification, NotificationEvent, OpId,
    OperationKind, OperationOutcome, PendingOperation, ProductId, ServerCartLine,
    ServerCartSnapshot, SubmitReply,
};
