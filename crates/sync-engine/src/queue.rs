// crates/sync-engine/src/queue.rs
//! Ordered queue of unconfirmed operations
//!
//! The queue is the source of truth for what still has to reach the server.
//! It is mirrored to the local store on every change. An enqueue that cannot
//! be stored is refused; any other failed mirror write is logged and the
//! in-memory queue stays authoritative.

use cartsync_core::{CartLine, OpId, PendingOperation, ProductId};
use cartsync_store::{LocalStore, StoreResult};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// FIFO of pending operations
pub struct MutationQueue {
    operations: VecDeque<PendingOperation>,
    store: Arc<dyn LocalStore>,
}

impl MutationQueue {
    /// Creates an empty queue
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            operations: VecDeque::new(),
            store,
        }
    }

    /// Creates a queue holding whatever the store persisted
    pub fn hydrate(store: Arc<dyn LocalStore>) -> Self {
        let operations: VecDeque<_> = store.load_pending().into();
        if !operations.is_empty() {
            log::info!("Restored {} pending cart operations", operations.len());
        }
        Self { operations, store }
    }

    /// Appends an operation and returns its ID
    ///
    /// The operation is only kept if the store accepted the new queue.
    pub fn enqueue(&mut self, operation: PendingOperation) -> StoreResult<OpId> {
        let op_id = operation.op_id.clone();
        log::debug!(
            "Queueing {:?} for {} ({})",
            operation.kind,
            operation.product_id,
            op_id
        );
        self.operations.push_back(operation);
        if let Err(e) = self.try_persist() {
            self.operations.pop_back();
            return Err(e);
        }
        Ok(op_id)
    }

    /// Removes an operation by ID
    pub fn dequeue(&mut self, op_id: &OpId) -> Option<PendingOperation> {
        let position = self.operations.iter().position(|op| &op.op_id == op_id)?;
        let removed = self.operations.remove(position);
        self.persist();
        removed
    }

    /// Oldest operation
    pub fn head(&self) -> Option<&PendingOperation> {
        self.operations.front()
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Iterates in submission order
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.operations.iter()
    }

    /// Groups of operations ready to send, starting at the head
    ///
    /// Each group is the longest run of consecutive operations bound for the
    /// same destination, capped at `max_batch`. Without batching every group
    /// holds a single operation. Calling this again after some operations
    /// were dequeued restarts from the new head.
    pub fn batches(&self, supports_batching: bool, max_batch: usize) -> Batches<'_> {
        let limit = if supports_batching { max_batch.max(1) } else { 1 };
        Batches {
            operations: &self.operations,
            position: 0,
            limit,
        }
    }

    /// The next group to send, if any
    pub fn next_batch(&self, supports_batching: bool, max_batch: usize) -> Option<Vec<PendingOperation>> {
        self.batches(supports_batching, max_batch).next()
    }

    /// Increments the attempt counter of the given operations
    pub fn record_attempt(&mut self, op_ids: &[OpId]) {
        for op in self.operations.iter_mut() {
            if op_ids.contains(&op.op_id) {
                op.attempts = op.attempts.saturating_add(1);
            }
        }
        self.persist();
    }

    /// Returns true if any operation targets the product
    pub fn has_pending_for(&self, product_id: &ProductId) -> bool {
        self.operations.iter().any(|op| &op.product_id == product_id)
    }

    /// Products with at least one queued operation
    pub fn pending_products(&self) -> HashSet<ProductId> {
        self.operations
            .iter()
            .map(|op| op.product_id.clone())
            .collect()
    }

    /// Queued operations on one product, in order
    pub fn operations_for(&self, product_id: &ProductId) -> Vec<PendingOperation> {
        self.operations
            .iter()
            .filter(|op| &op.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Replaces the recorded prior line of an operation
    pub fn set_prior_line(&mut self, op_id: &OpId, prior_line: Option<CartLine>) {
        if let Some(op) = self.operations.iter_mut().find(|op| &op.op_id == op_id) {
            op.prior_line = prior_line;
            self.persist();
        }
    }

    /// Drops every operation on a product and returns them
    pub fn remove_for_product(&mut self, product_id: &ProductId) -> Vec<PendingOperation> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .operations
            .drain(..)
            .partition(|op| &op.product_id == product_id);
        self.operations = kept.into();
        if !removed.is_empty() {
            self.persist();
        }
        removed
    }

    /// Drops everything
    pub fn clear(&mut self) {
        self.operations.clear();
        self.persist();
    }

    /// Forgets everything without touching the store
    pub(crate) fn reset(&mut self) {
        self.operations.clear();
    }

    fn persist(&self) {
        if let Err(e) = self.try_persist() {
            log::warn!("Failed to persist pending operations: {}", e);
        }
    }

    fn try_persist(&self) -> StoreResult<()> {
        let snapshot: Vec<_> = self.operations.iter().cloned().collect();
        self.store.save_pending(&snapshot)
    }
}

/// Lazy iterator over sendable groups; see [`MutationQueue::batches`]
pub struct Batches<'a> {
    operations: &'a VecDeque<PendingOperation>,
    position: usize,
    limit: usize,
}

impl Batches<'_> {
    /// Starts over from the head of the queue
    pub fn restart(&mut self) {
        self.position = 0;
    }
}

impl Iterator for Batches<'_> {
    type Item = Vec<PendingOperation>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.operations.get(self.position)?;
        let destination = first.destination();

        let batch: Vec<_> = self
            .operations
            .iter()
            .skip(self.position)
            .take(self.limit)
            .take_while(|op| op.destination() == destination)
            .cloned()
            .collect();

        self.position += batch.len();
        Some(batch)
    }
}
