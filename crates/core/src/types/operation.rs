//! Pending operations and what the server says about them

use crate::error::RejectionReason;
use crate::types::{CartLine, LineId, OpId, ProductId, ServerCartSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of cart mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Add quantity to a product (creating the line if needed)
    Add,
    /// Remove a product's line
    Remove,
    /// Replace a product's quantity
    SetQuantity,
}

/// Backend endpoint an operation is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    /// `POST /cart/items`
    ItemsCollection,
    /// `PUT /cart/items/{product}`
    ItemUpdate,
    /// `DELETE /cart/items/{product}`
    ItemDelete,
}

impl OperationKind {
    /// Returns the endpoint this kind of operation is sent to
    pub fn destination(&self) -> Destination {
        match self {
            Self::Add => Destination::ItemsCollection,
            Self::SetQuantity => Destination::ItemUpdate,
            Self::Remove => Destination::ItemDelete,
        }
    }
}

/// A local mutation the server has not confirmed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Unique operation ID
    pub op_id: OpId,
    /// What the user asked for
    pub kind: OperationKind,
    /// Product the operation targets
    pub product_id: ProductId,
    /// Line the operation targets
    pub line_id: LineId,
    /// Quantity for `Add` and `SetQuantity`
    pub quantity: Option<u32>,
    /// Unit price for `Add`, kept so the operation can be replayed
    pub unit_price: Option<Decimal>,
    /// When the user issued the operation
    pub created_at: DateTime<Utc>,
    /// Number of submissions so far
    pub attempts: u32,
    /// The product's line right before this operation was applied
    pub prior_line: Option<CartLine>,
}

impl PendingOperation {
    fn new(
        kind: OperationKind,
        product_id: ProductId,
        line_id: LineId,
        quantity: Option<u32>,
        unit_price: Option<Decimal>,
        prior_line: Option<CartLine>,
    ) -> Self {
        Self {
            op_id: OpId::new(),
            kind,
            product_id,
            line_id,
            quantity,
            unit_price,
            created_at: Utc::now(),
            attempts: 0,
            prior_line,
        }
    }

    /// Creates an `Add` operation
    pub fn add(
        product_id: ProductId,
        line_id: LineId,
        quantity: u32,
        unit_price: Decimal,
        prior_line: Option<CartLine>,
    ) -> Self {
        Self::new(
            OperationKind::Add,
            product_id,
            line_id,
            Some(quantity),
            Some(unit_price),
            prior_line,
        )
    }

    /// Creates a `Remove` operation
    pub fn remove(product_id: ProductId, line_id: LineId, prior_line: Option<CartLine>) -> Self {
        Self::new(
            OperationKind::Remove,
            product_id,
            line_id,
            None,
            None,
            prior_line,
        )
    }

    /// Creates a `SetQuantity` operation
    pub fn set_quantity(
        product_id: ProductId,
        line_id: LineId,
        quantity: u32,
        prior_line: Option<CartLine>,
    ) -> Self {
        Self::new(
            OperationKind::SetQuantity,
            product_id,
            line_id,
            Some(quantity),
            None,
            prior_line,
        )
    }

    /// Returns the endpoint this operation is sent to
    pub fn destination(&self) -> Destination {
        self.kind.destination()
    }
}

/// Server verdict on one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    /// The server applied the operation
    Confirmed,
    /// The server refused the operation
    Rejected(RejectionReason),
}

/// Reply to a submitted batch; `outcomes` is aligned with the batch order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    pub outcomes: Vec<OperationOutcome>,
    /// Authoritative cart state after the batch, if the server sent one
    pub snapshot: Option<ServerCartSnapshot>,
}

impl SubmitReply {
    /// Reply confirming `count` operations with no snapshot
    pub fn confirmed(count: usize) -> Self {
        Self {
            outcomes: vec![OperationOutcome::Confirmed; count],
            snapshot: None,
        }
    }

    /// Reply carrying a single rejection
    pub fn rejected(reason: RejectionReason) -> Self {
        Self {
            outcomes: vec![OperationOutcome::Rejected(reason)],
            snapshot: None,
        }
    }

    /// Attaches a server snapshot
    pub fn with_snapshot(mut self, snapshot: ServerCartSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destinations() {
        assert_eq!(OperationKind::Add.destination(), Destination::ItemsCollection);
        assert_eq!(OperationKind::SetQuantity.destination(), Destination::ItemUpdate);
        assert_eq!(OperationKind::Remove.destination(), Destination::ItemDelete);
    }

    #[test]
    fn test_new_operation_has_no_attempts() {
        let op = PendingOperation::add(
            ProductId::from("sku-1"),
            LineId::new(),
            2,
            Decimal::new(1000, 2),
            None,
        );
        assert_eq!(op.attempts, 0);
        assert_eq!(op.quantity, Some(2));
        assert_eq!(op.kind, OperationKind::Add);
    }

    #[test]
    fn test_each_operation_gets_its_own_id() {
        let line = LineId::new();
        let a = PendingOperation::remove(ProductId::from("sku-1"), line, None);
        let b = PendingOperation::remove(ProductId::from("sku-1"), line, None);
        assert_ne!(a.op_id, b.op_id);
    }

    #[test]
    fn test_outcome_wire_format() {
        let json = r#"["confirmed",{"rejected":{"reason":"out_of_stock"}}]"#;
        let outcomes: Vec<OperationOutcome> = serde_json::from_str(json).unwrap();
        assert_eq!(outcomes[0], OperationOutcome::Confirmed);
        assert_eq!(
            outcomes[1],
            OperationOutcome::Rejected(RejectionReason::OutOfStock)
        );
    }

    #[test]
    fn test_confirmed_reply() {
        let reply = SubmitReply::confirmed(3);
        assert_eq!(reply.outcomes.len(), 3);
        assert!(reply.snapshot.is_none());
    }
}
