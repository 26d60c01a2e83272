// crates/sync-engine/src/model.rs
//! Optimistic cart model
//!
//! Every change is computed on a copy of the state, written to the local
//! store and only then made visible. A failed write leaves the model exactly
//! as it was.

use cartsync_core::{
    CartError, CartLine, CartState, LineId, OperationKind, PendingOperation, ProductId, Result,
    ServerCartSnapshot,
};
use cartsync_store::LocalStore;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of applying a user mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    /// Line the mutation touched
    pub line_id: LineId,
    /// Product the mutation touched
    pub product_id: ProductId,
    /// The product's line before the mutation
    pub prior_line: Option<CartLine>,
    /// False if the mutation was a no-op
    pub changed: bool,
}

/// A validated mutation whose resulting cart has not been stored yet
#[derive(Debug, Clone)]
pub struct StagedChange {
    next: Option<CartState>,
    /// What committing will do
    pub change: AppliedChange,
}

impl StagedChange {
    fn unchanged(line_id: &LineId, product_id: ProductId, prior_line: Option<CartLine>) -> Self {
        Self {
            next: None,
            change: AppliedChange {
                line_id: line_id.clone(),
                product_id,
                prior_line,
                changed: false,
            },
        }
    }
}

/// In-memory cart state backed by a `LocalStore`
pub struct CartModel {
    state: CartState,
    store: Arc<dyn LocalStore>,
}

impl CartModel {
    /// Creates an empty model
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            state: CartState::new(),
            store,
        }
    }

    /// Creates a model from whatever the store holds, or empty
    pub fn hydrate(store: Arc<dyn LocalStore>) -> Self {
        let state = store.load().unwrap_or_default();
        log::debug!(
            "Hydrated cart with {} lines at revision {}",
            state.lines.len(),
            state.revision
        );
        Self { state, store }
    }

    /// Current state
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Sum of `quantity * unit_price_snapshot` over all lines
    pub fn compute_total(&self) -> Decimal {
        self.state.total()
    }

    /// Sum of all quantities
    pub fn item_count(&self) -> u64 {
        self.state.item_count()
    }

    /// Adds `quantity` units of a product
    ///
    /// An existing line for the product is incremented and keeps its price
    /// snapshot; otherwise a new line is created at `unit_price`.
    pub fn apply_add(
        &mut self,
        product_id: &ProductId,
        quantity: i64,
        unit_price: Decimal,
    ) -> Result<AppliedChange> {
        let staged = self.stage_add(product_id, quantity, unit_price)?;
        self.commit_staged(staged)
    }

    /// Removes a line; removing an absent line is a successful no-op
    pub fn apply_remove(&mut self, line_id: &LineId) -> Result<AppliedChange> {
        let staged = self.stage_remove(line_id);
        self.commit_staged(staged)
    }

    /// Sets a line's quantity; zero removes the line
    pub fn apply_set_quantity(&mut self, line_id: &LineId, quantity: i64) -> Result<AppliedChange> {
        let staged = self.stage_set_quantity(line_id, quantity)?;
        self.commit_staged(staged)
    }

    /// Validates an add and computes the resulting cart without storing it
    pub fn stage_add(
        &self,
        product_id: &ProductId,
        quantity: i64,
        unit_price: Decimal,
    ) -> Result<StagedChange> {
        if product_id.is_blank() {
            return Err(CartError::InvalidProduct {
                product_id: product_id.to_string(),
            });
        }
        let quantity = positive_quantity(quantity)?;
        if unit_price.is_sign_negative() {
            return Err(CartError::InvalidPrice { price: unit_price });
        }

        let prior_line = self.state.line_for_product(product_id).cloned();
        let mut next = self.state.clone();
        let line_id = add_to(&mut next, product_id, quantity, unit_price, LineId::new())?;

        Ok(StagedChange {
            next: Some(next),
            change: AppliedChange {
                line_id,
                product_id: product_id.clone(),
                prior_line,
                changed: true,
            },
        })
    }

    /// Computes a line removal without storing it
    pub fn stage_remove(&self, line_id: &LineId) -> StagedChange {
        let Some(prior) = self.state.line(line_id).cloned() else {
            log::debug!("Remove of absent line {} ignored", line_id);
            return StagedChange::unchanged(line_id, ProductId::new(""), None);
        };

        let mut next = self.state.clone();
        next.lines.retain(|l| &l.line_id != line_id);

        StagedChange {
            next: Some(next),
            change: AppliedChange {
                line_id: line_id.clone(),
                product_id: prior.product_id.clone(),
                prior_line: Some(prior),
                changed: true,
            },
        }
    }

    /// Validates a quantity change and computes it without storing it
    pub fn stage_set_quantity(&self, line_id: &LineId, quantity: i64) -> Result<StagedChange> {
        if quantity == 0 {
            return Ok(self.stage_remove(line_id));
        }
        let quantity = positive_quantity(quantity)?;

        let Some(prior) = self.state.line(line_id).cloned() else {
            log::debug!("Quantity change for absent line {} ignored", line_id);
            return Ok(StagedChange::unchanged(line_id, ProductId::new(""), None));
        };
        if prior.quantity == quantity {
            let product_id = prior.product_id.clone();
            return Ok(StagedChange::unchanged(line_id, product_id, Some(prior)));
        }

        let mut next = self.state.clone();
        set_in(&mut next, &prior.product_id, quantity);

        Ok(StagedChange {
            next: Some(next),
            change: AppliedChange {
                line_id: line_id.clone(),
                product_id: prior.product_id.clone(),
                prior_line: Some(prior),
                changed: true,
            },
        })
    }

    /// Stores and publishes a staged change
    ///
    /// The staged cart replaces the current one wholesale, so it must have
    /// been staged against the current state.
    pub fn commit_staged(&mut self, staged: StagedChange) -> Result<AppliedChange> {
        if let Some(next) = staged.next {
            self.commit(next)?;
        }
        Ok(staged.change)
    }

    /// Restores the lines of an earlier snapshot
    ///
    /// The revision keeps counting forward so observers never see it go back.
    pub fn rollback(&mut self, snapshot: &CartState) -> Result<()> {
        let next = CartState {
            lines: snapshot.lines.clone(),
            revision: self.state.revision,
        };
        self.commit(next)
    }

    /// Puts one product back to `base`, then replays later operations on it
    ///
    /// Returns, per replayed operation, the product's line right before that
    /// operation was re-applied. Replays that no longer validate are skipped
    /// and yield `None`.
    pub fn rebase_product(
        &mut self,
        product_id: &ProductId,
        base: Option<CartLine>,
        later: &[PendingOperation],
    ) -> Result<Vec<Option<CartLine>>> {
        let mut next = self.state.clone();
        put_line(&mut next, product_id, base);

        let mut priors = Vec::with_capacity(later.len());
        for op in later.iter().filter(|op| &op.product_id == product_id) {
            priors.push(next.line_for_product(product_id).cloned());
            if let Err(e) = replay(&mut next, op) {
                log::warn!("Skipping replay of {} on {}: {}", op.op_id, product_id, e);
            }
        }

        self.commit(next)?;
        Ok(priors)
    }

    /// Replaces a product's unit price; returns true if it changed
    pub fn update_price(&mut self, product_id: &ProductId, unit_price: Decimal) -> Result<bool> {
        match self.state.line_for_product(product_id) {
            Some(line) if line.unit_price_snapshot != unit_price => {}
            _ => return Ok(false),
        }

        let mut next = self.state.clone();
        if let Some(line) = next.lines.iter_mut().find(|l| &l.product_id == product_id) {
            line.unit_price_snapshot = unit_price;
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Drops a product's line; returns true if there was one
    pub fn remove_product(&mut self, product_id: &ProductId) -> Result<bool> {
        if self.state.line_for_product(product_id).is_none() {
            return Ok(false);
        }
        let mut next = self.state.clone();
        next.lines.retain(|l| &l.product_id != product_id);
        self.commit(next)?;
        Ok(true)
    }

    /// Makes the local cart match a server snapshot for every product not in `protected`
    ///
    /// Returns true if anything changed.
    pub fn merge_snapshot(
        &mut self,
        snapshot: &ServerCartSnapshot,
        protected: &HashSet<ProductId>,
    ) -> Result<bool> {
        let mut next = self.state.clone();

        next.lines.retain(|line| {
            protected.contains(&line.product_id)
                || snapshot.line_for_product(&line.product_id).is_some()
        });

        for server_line in &snapshot.lines {
            if protected.contains(&server_line.product_id) || server_line.quantity == 0 {
                continue;
            }
            match next
                .lines
                .iter_mut()
                .find(|l| l.product_id == server_line.product_id)
            {
                Some(line) => {
                    line.quantity = server_line.quantity;
                    line.unit_price_snapshot = server_line.unit_price;
                }
                None => next.lines.push(CartLine::new(
                    server_line.product_id.clone(),
                    server_line.quantity,
                    server_line.unit_price,
                )),
            }
        }

        if next.lines == self.state.lines {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Empties the cart
    pub fn clear(&mut self) -> Result<()> {
        let next = CartState {
            lines: Vec::new(),
            revision: self.state.revision,
        };
        self.commit(next)
    }

    /// Resets to an empty cart without touching the store
    pub(crate) fn reset(&mut self) {
        self.state = CartState::new();
    }

    fn commit(&mut self, mut next: CartState) -> Result<()> {
        next.revision = self.state.revision + 1;
        self.store
            .save(&next)
            .map_err(|e| CartError::storage("Failed to persist cart", e))?;
        self.state = next;
        Ok(())
    }
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    match u32::try_from(quantity) {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(CartError::InvalidQuantity { quantity }),
    }
}

fn add_to(
    state: &mut CartState,
    product_id: &ProductId,
    quantity: u32,
    unit_price: Decimal,
    new_line_id: LineId,
) -> Result<LineId> {
    if let Some(line) = state.lines.iter_mut().find(|l| &l.product_id == product_id) {
        line.quantity = line
            .quantity
            .checked_add(quantity)
            .ok_or(CartError::InvalidQuantity {
                quantity: i64::from(line.quantity) + i64::from(quantity),
            })?;
        return Ok(line.line_id.clone());
    }

    state.lines.push(CartLine {
        line_id: new_line_id.clone(),
        product_id: product_id.clone(),
        quantity,
        unit_price_snapshot: unit_price,
    });
    Ok(new_line_id)
}

fn set_in(state: &mut CartState, product_id: &ProductId, quantity: u32) -> bool {
    match state.lines.iter_mut().find(|l| &l.product_id == product_id) {
        Some(line) => {
            line.quantity = quantity;
            true
        }
        None => false,
    }
}

fn put_line(state: &mut CartState, product_id: &ProductId, line: Option<CartLine>) {
    let position = state.lines.iter().position(|l| &l.product_id == product_id);
    match (position, line) {
        (Some(i), Some(line)) => state.lines[i] = line,
        (Some(i), None) => {
            state.lines.remove(i);
        }
        (None, Some(line)) => state.lines.push(line),
        (None, None) => {}
    }
}

fn replay(state: &mut CartState, op: &PendingOperation) -> Result<()> {
    match op.kind {
        OperationKind::Add => {
            let quantity = op.quantity.unwrap_or(0);
            if quantity == 0 {
                return Err(CartError::InvalidQuantity { quantity: 0 });
            }
            let price = op.unit_price.unwrap_or(Decimal::ZERO);
            add_to(state, &op.product_id, quantity, price, op.line_id.clone())?;
        }
        OperationKind::SetQuantity => {
            let quantity = op.quantity.unwrap_or(0);
            if quantity == 0 {
                state.lines.retain(|l| l.product_id != op.product_id);
            } else {
                set_in(state, &op.product_id, quantity);
            }
        }
        OperationKind::Remove => {
            state.lines.retain(|l| l.product_id != op.product_id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartsync_core::ServerCartLine;
    use cartsync_store::MemoryStore;

    fn price(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn model() -> (CartModel, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CartModel::new(store.clone()), store)
    }

    #[test]
    fn test_add_creates_line() {
        let (mut model, store) = model();
        let change = model
            .apply_add(&ProductId::from("P"), 2, price(1000))
            .unwrap();

        assert!(change.changed);
        assert!(change.prior_line.is_none());
        assert_eq!(model.compute_total(), price(2000));
        assert_eq!(model.state().revision, 1);
        assert_eq!(store.load(), Some(model.state().clone()));
    }

    #[test]
    fn test_add_existing_product_increments() {
        let (mut model, _) = model();
        let first = model
            .apply_add(&ProductId::from("P"), 2, price(1000))
            .unwrap();
        let second = model
            .apply_add(&ProductId::from("P"), 1, price(1200))
            .unwrap();

        assert_eq!(first.line_id, second.line_id);
        assert_eq!(model.state().lines.len(), 1);
        assert_eq!(model.state().lines[0].quantity, 3);
        assert_eq!(model.state().lines[0].unit_price_snapshot, price(1000));
        assert_eq!(second.prior_line.map(|l| l.quantity), Some(2));
    }

    #[test]
    fn test_add_validation() {
        let (mut model, store) = model();

        assert!(matches!(
            model.apply_add(&ProductId::from("P"), 0, price(100)),
            Err(CartError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            model.apply_add(&ProductId::from("P"), -1, price(100)),
            Err(CartError::InvalidQuantity { quantity: -1 })
        ));
        assert!(matches!(
            model.apply_add(&ProductId::from(""), 1, price(100)),
            Err(CartError::InvalidProduct { .. })
        ));
        assert!(matches!(
            model.apply_add(&ProductId::from("P"), 1, price(-100)),
            Err(CartError::InvalidPrice { .. })
        ));
        assert_eq!(model.state().revision, 0);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_add_overflow_is_rejected() {
        let (mut model, _) = model();
        model
            .apply_add(&ProductId::from("P"), i64::from(u32::MAX), price(1))
            .unwrap();
        assert!(matches!(
            model.apply_add(&ProductId::from("P"), 1, price(1)),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert_eq!(model.state().lines[0].quantity, u32::MAX);
    }

    #[test]
    fn test_remove_absent_line_is_noop() {
        let (mut model, store) = model();
        let change = model.apply_remove(&LineId::new()).unwrap();
        assert!(!change.changed);
        assert_eq!(model.state().revision, 0);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let (mut model, _) = model();
        let change = model
            .apply_add(&ProductId::from("P"), 2, price(500))
            .unwrap();
        model.apply_set_quantity(&change.line_id, 0).unwrap();
        assert!(model.state().is_empty());
    }

    #[test]
    fn test_set_quantity_negative_fails() {
        let (mut model, _) = model();
        let change = model
            .apply_add(&ProductId::from("P"), 2, price(500))
            .unwrap();
        assert!(model.apply_set_quantity(&change.line_id, -3).is_err());
        assert_eq!(model.state().lines[0].quantity, 2);
    }

    #[test]
    fn test_storage_failure_leaves_state_unchanged() {
        let (mut model, store) = model();
        model
            .apply_add(&ProductId::from("P"), 1, price(500))
            .unwrap();
        let before = model.state().clone();

        store.set_fail_writes(true);
        let err = model
            .apply_add(&ProductId::from("Q"), 1, price(700))
            .unwrap_err();

        assert!(matches!(err, CartError::Storage { .. }));
        assert_eq!(model.state(), &before);
    }

    #[test]
    fn test_rollback_restores_lines_and_advances_revision() {
        let (mut model, _) = model();
        model
            .apply_add(&ProductId::from("P"), 1, price(500))
            .unwrap();
        let snapshot = model.state().clone();
        model
            .apply_add(&ProductId::from("Q"), 4, price(250))
            .unwrap();

        model.rollback(&snapshot).unwrap();
        assert_eq!(model.state().lines, snapshot.lines);
        assert_eq!(model.compute_total(), snapshot.total());
        assert!(model.state().revision > snapshot.revision);
    }

    #[test]
    fn test_rebase_replays_later_operations() {
        let (mut model, _) = model();
        let product = ProductId::from("P");
        let added = model.apply_add(&product, 1, price(500)).unwrap();
        let set = model.apply_set_quantity(&added.line_id, 3).unwrap();

        let later = vec![PendingOperation::set_quantity(
            product.clone(),
            added.line_id.clone(),
            3,
            set.prior_line.clone(),
        )];
        // Add was refused: restore "no line", then replay the quantity change
        let priors = model.rebase_product(&product, None, &later).unwrap();

        assert_eq!(priors, vec![None]);
        assert!(model.state().is_empty());
    }

    #[test]
    fn test_merge_snapshot_respects_protected_products() {
        let (mut model, _) = model();
        model
            .apply_add(&ProductId::from("local-only"), 1, price(100))
            .unwrap();
        model
            .apply_add(&ProductId::from("pending"), 1, price(100))
            .unwrap();

        let snapshot = ServerCartSnapshot {
            lines: vec![
                ServerCartLine {
                    product_id: ProductId::from("server-only"),
                    quantity: 2,
                    unit_price: price(300),
                },
                ServerCartLine {
                    product_id: ProductId::from("pending"),
                    quantity: 9,
                    unit_price: price(900),
                },
            ],
            server_revision: 7,
        };
        let protected: HashSet<_> = [ProductId::from("pending")].into_iter().collect();

        assert!(model.merge_snapshot(&snapshot, &protected).unwrap());
        let state = model.state();
        assert!(state.line_for_product(&ProductId::from("local-only")).is_none());
        assert_eq!(
            state
                .line_for_product(&ProductId::from("server-only"))
                .map(|l| l.quantity),
            Some(2)
        );
        assert_eq!(
            state
                .line_for_product(&ProductId::from("pending"))
                .map(|l| l.quantity),
            Some(1)
        );
        assert!(state.is_consistent());
    }

    #[test]
    fn test_update_price_and_remove_product() {
        let (mut model, _) = model();
        let product = ProductId::from("P");
        model.apply_add(&product, 2, price(1000)).unwrap();

        assert!(model.update_price(&product, price(1200)).unwrap());
        assert!(!model.update_price(&product, price(1200)).unwrap());
        assert_eq!(model.compute_total(), price(2400));

        assert!(model.remove_product(&product).unwrap());
        assert!(!model.remove_product(&product).unwrap());
    }

    #[test]
    fn test_hydrate_from_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut model = CartModel::new(store.clone());
            model
                .apply_add(&ProductId::from("P"), 2, price(150))
                .unwrap();
        }
        let model = CartModel::hydrate(store);
        assert_eq!(model.item_count(), 2);
        assert_eq!(model.state().revision, 1);
    }
}
