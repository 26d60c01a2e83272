//! Cart lines and cart state

use crate::types::{LineId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One product in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Client-generated line identifier
    pub line_id: LineId,
    /// Product in this line (unique within a cart)
    pub product_id: ProductId,
    /// Always greater than zero
    pub quantity: u32,
    /// Unit price captured when the line was created, or last merged from the server
    pub unit_price_snapshot: Decimal,
}

impl CartLine {
    /// Creates a new line with a fresh line ID
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            line_id: LineId::new(),
            product_id,
            quantity,
            unit_price_snapshot: unit_price,
        }
    }

    /// Returns `quantity * unit_price_snapshot`
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price_snapshot
    }
}

/// The whole cart as seen by the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    /// Lines in insertion order
    pub lines: Vec<CartLine>,
    /// Local mutation counter, incremented on every successful change
    pub revision: u64,
}

impl CartState {
    /// Creates an empty cart at revision 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the cart has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Finds a line by its ID
    pub fn line(&self, line_id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.line_id == line_id)
    }

    /// Finds the line holding a product
    pub fn line_for_product(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Sum of all line subtotals
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// Sum of all quantities (the cart badge number)
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Checks that no product appears twice and every quantity is positive
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        self.lines
            .iter()
            .all(|l| l.quantity > 0 && seen.insert(l.product_id.clone()))
    }
}
