//! Domain types for the cart
//!
//! - `ids`: product, line and operation identifiers
//! - `cart`: cart lines and the cart state
//! - `operation`: pending operations and server outcomes
//! - `snapshot`: server-side cart snapshots
//! - `notification`: push notifications

mod cart;
mod ids;
mod notification;
mod operation;
mod snapshot;

// Re-export all public types
pub use cart::{CartLine, CartState};
pub use ids::{LineId, OpId, ProductId};
pub use notification::{Notification, NotificationEvent};
pub use operation::{Destination, OperationKind, OperationOutcome, PendingOperation, SubmitReply};
pub use snapshot::{ServerCartLine, ServerCartSnapshot};
