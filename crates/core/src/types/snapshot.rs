//! Authoritative cart state as reported by the backend

use crate::types::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of the server's cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Server cart at a given server revision; never mutated by UI actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCartSnapshot {
    pub lines: Vec<ServerCartLine>,
    pub server_revision: u64,
}

impl ServerCartSnapshot {
    /// Finds the server line for a product
    pub fn line_for_product(&self, product_id: &ProductId) -> Option<&ServerCartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }
}
