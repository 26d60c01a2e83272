// crates/sync-engine/src/engine.rs
//! Main sync engine
//!
//! The engine owns the cart model and the mutation queue behind a single
//! lock. User mutations are applied locally first and queued; sync cycles
//! drain the queue from its head in order, one batch per round-trip, and
//! never hold the lock across a network call.

use crate::error::{SyncError, SyncResult};
use crate::model::{AppliedChange, CartModel, StagedChange};
use crate::notification::{
    stopped, NotificationChannel, NotificationHandler, SequenceGate, Subscription,
};
use crate::queue::MutationQueue;
use crate::transport::{CartTransport, TransportError};
use crate::types::{CartEvent, EventCallback, LineIssue, SyncReport, SyncStatus};
use cartsync_core::{
    CartError, CartState, LineId, Notification, NotificationEvent, OpId, OperationOutcome,
    PendingOperation, ProductId, RejectionReason, ServerCartSnapshot,
};
use cartsync_resilience::{RetryPolicy, Timeout};
use cartsync_store::LocalStore;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backoff and retry budget for operations
    pub retry_policy: RetryPolicy,
    /// Limit for each round-trip to the backend
    pub request_timeout: Duration,
    /// Upper bound on operations per submission when batching
    pub max_batch_size: usize,
    /// Connectivity at startup; `None` means unknown and starts offline
    pub initial_connectivity: Option<bool>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            max_batch_size: 20,
            initial_connectivity: None,
        }
    }
}

struct EngineState {
    model: CartModel,
    queue: MutationQueue,
    status: SyncStatus,
    issues: HashMap<ProductId, LineIssue>,
    failed: HashMap<ProductId, PendingOperation>,
    gate: SequenceGate,
    last_server_revision: Option<u64>,
    epoch: u64,
    consecutive_failures: u32,
    in_flight: bool,
}

impl EngineState {
    fn forget_issue(&mut self, product_id: &ProductId) -> bool {
        self.failed.remove(product_id);
        self.issues.remove(product_id).is_some()
    }

    /// A new user mutation supersedes a permanent failure badge
    fn clear_failure(&mut self, product_id: &ProductId) {
        if self.failed.remove(product_id).is_some() {
            self.issues.remove(product_id);
        }
    }
}

/// Optimistic cart with background reconciliation
pub struct SyncEngine {
    config: SyncConfig,
    transport: Arc<dyn CartTransport>,
    store: Arc<dyn LocalStore>,
    state: Mutex<EngineState>,
    wake: Notify,
    callback: Option<EventCallback>,
}

impl SyncEngine {
    /// Creates an engine, restoring cart and queue from the store
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn CartTransport>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        let status = match config.initial_connectivity {
            Some(true) => SyncStatus::Idle,
            _ => SyncStatus::Offline,
        };

        let state = EngineState {
            model: CartModel::hydrate(Arc::clone(&store)),
            queue: MutationQueue::hydrate(Arc::clone(&store)),
            status,
            issues: HashMap::new(),
            failed: HashMap::new(),
            gate: SequenceGate::new(),
            last_server_revision: None,
            epoch: 0,
            consecutive_failures: 0,
            in_flight: false,
        };

        Self {
            config,
            transport,
            store,
            state: Mutex::new(state),
            wake: Notify::new(),
            callback: None,
        }
    }

    /// Sets the callback that receives cart events
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ----- user mutations -----

    /// Adds units of a product and queues the change
    pub fn add_item(
        &self,
        product_id: impl Into<ProductId>,
        quantity: i64,
        unit_price: Decimal,
    ) -> SyncResult<LineId> {
        let product_id = product_id.into();
        let mut state = self.lock()?;

        let staged = state.model.stage_add(&product_id, quantity, unit_price)?;
        let added =
            u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity { quantity })?;
        let operation = PendingOperation::add(
            product_id,
            staged.change.line_id.clone(),
            added,
            unit_price,
            staged.change.prior_line.clone(),
        );
        let change = Self::record_mutation(&mut state, staged, operation)?;
        drop(state);

        self.wake.notify_one();
        Ok(change.line_id)
    }

    /// Removes a line and queues the change; absent lines are a no-op
    pub fn remove_line(&self, line_id: &LineId) -> SyncResult<()> {
        let mut state = self.lock()?;

        let staged = state.model.stage_remove(line_id);
        if !staged.change.changed {
            return Ok(());
        }
        let operation = PendingOperation::remove(
            staged.change.product_id.clone(),
            staged.change.line_id.clone(),
            staged.change.prior_line.clone(),
        );
        Self::record_mutation(&mut state, staged, operation)?;
        drop(state);

        self.wake.notify_one();
        Ok(())
    }

    /// Sets a line's quantity (zero removes it) and queues the change
    pub fn set_quantity(&self, line_id: &LineId, quantity: i64) -> SyncResult<()> {
        let mut state = self.lock()?;

        let staged = state.model.stage_set_quantity(line_id, quantity)?;
        if !staged.change.changed {
            return Ok(());
        }
        let change = &staged.change;
        let operation = if quantity == 0 {
            PendingOperation::remove(
                change.product_id.clone(),
                change.line_id.clone(),
                change.prior_line.clone(),
            )
        } else {
            let quantity =
                u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity { quantity })?;
            PendingOperation::set_quantity(
                change.product_id.clone(),
                change.line_id.clone(),
                quantity,
                change.prior_line.clone(),
            )
        };
        Self::record_mutation(&mut state, staged, operation)?;
        drop(state);

        self.wake.notify_one();
        Ok(())
    }

    /// Queues a permanently failed operation again with a fresh retry budget
    ///
    /// Only possible while no newer operation on the product is queued.
    pub fn retry_line(&self, product_id: &ProductId) -> SyncResult<bool> {
        let mut state = self.lock()?;
        if state.queue.has_pending_for(product_id) {
            return Ok(false);
        }
        let Some(mut operation) = state.failed.remove(product_id) else {
            return Ok(false);
        };

        log::info!("Retrying operation {} on {}", operation.op_id, product_id);
        operation.attempts = 0;
        if let Err(e) = state.queue.enqueue(operation.clone()) {
            state.failed.insert(product_id.clone(), operation);
            return Err(CartError::storage("Failed to persist pending operations", e).into());
        }
        state.issues.remove(product_id);
        drop(state);

        self.wake.notify_one();
        Ok(true)
    }

    /// Hides a line's badge without retrying
    pub fn dismiss_issue(&self, product_id: &ProductId) -> SyncResult<bool> {
        Ok(self.lock()?.forget_issue(product_id))
    }

    /// Empties the cart and queue and starts a new session
    ///
    /// A request already in flight may still complete, but its result is
    /// discarded.
    pub fn clear(&self) -> SyncResult<()> {
        let mut state = self.lock()?;
        state.model.clear()?;
        state.queue.clear();
        Self::start_new_session(&mut state);
        log::info!("Cart cleared");
        Ok(())
    }

    /// Ends the session and wipes local persistence
    pub fn logout(&self) -> SyncResult<()> {
        let mut state = self.lock()?;
        self.store.clear().map_err(CartError::from)?;
        state.model.reset();
        state.queue.reset();
        Self::start_new_session(&mut state);
        log::info!("Cart session ended");
        Ok(())
    }

    fn start_new_session(state: &mut EngineState) {
        state.epoch += 1;
        state.issues.clear();
        state.failed.clear();
        state.gate.reset();
        state.last_server_revision = None;
        state.consecutive_failures = 0;
        if matches!(state.status, SyncStatus::Backoff { .. }) {
            state.status = SyncStatus::Idle;
        }
    }

    // ----- queries -----

    /// Copy of the current cart
    pub fn cart(&self) -> SyncResult<CartState> {
        Ok(self.lock()?.model.state().clone())
    }

    /// Cart total from price snapshots
    pub fn total(&self) -> SyncResult<Decimal> {
        Ok(self.lock()?.model.compute_total())
    }

    /// Number of units in the cart
    pub fn item_count(&self) -> SyncResult<u64> {
        Ok(self.lock()?.model.item_count())
    }

    /// Current engine state
    pub fn status(&self) -> SyncResult<SyncStatus> {
        Ok(self.lock()?.status)
    }

    /// Copy of the unconfirmed operations, oldest first
    pub fn pending(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self.lock()?.queue.iter().cloned().collect())
    }

    /// Badges currently shown on lines
    pub fn line_issues(&self) -> SyncResult<HashMap<ProductId, LineIssue>> {
        Ok(self.lock()?.issues.clone())
    }

    /// Highest notification sequence applied so far
    pub fn last_notification_sequence(&self) -> SyncResult<Option<u64>> {
        Ok(self.lock()?.gate.high_water_mark())
    }

    // ----- connectivity and sync -----

    /// Reports a connectivity change
    pub fn set_online(&self, online: bool) -> SyncResult<()> {
        let mut events = Vec::new();
        {
            let mut state = self.lock()?;
            let from = state.status;
            let to = match (online, from) {
                (false, _) => SyncStatus::Offline,
                (true, SyncStatus::Offline) => SyncStatus::Idle,
                (true, current) => current,
            };
            if from != to {
                log::info!("Connectivity changed: {} -> {}", from, to);
                state.status = to;
                events.push(CartEvent::StatusChanged { from, to });
            }
        }
        self.emit(events);

        if online {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Sends queued operations until the queue is empty or a send fails
    ///
    /// Runs immediately even while backing off; does nothing while offline.
    pub async fn sync_once(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        let timeout = Timeout::new(self.config.request_timeout);
        let batching = self.transport.supports_batching();

        loop {
            let mut events = Vec::new();

            let (batch, epoch) = {
                let mut state = self.lock()?;
                if state.status == SyncStatus::Offline {
                    report.skipped_offline = true;
                    return Ok(report);
                }
                if state.in_flight {
                    return Err(SyncError::SyncInProgress);
                }

                let Some(mut batch) = state
                    .queue
                    .next_batch(batching, self.config.max_batch_size)
                else {
                    Self::transition(&mut state, SyncStatus::Idle, &mut events);
                    drop(state);
                    self.emit(events);
                    return Ok(report);
                };

                let ids: Vec<_> = batch.iter().map(|op| op.op_id.clone()).collect();
                state.queue.record_attempt(&ids);
                for op in batch.iter_mut() {
                    op.attempts = op.attempts.saturating_add(1);
                }
                state.in_flight = true;
                Self::transition(&mut state, SyncStatus::Syncing, &mut events);
                (batch, state.epoch)
            };
            self.emit(std::mem::take(&mut events));

            log::debug!("Submitting batch of {} operations", batch.len());
            let mut guard = InFlightGuard {
                engine: self,
                completed: false,
            };
            let result = match timeout.execute(self.transport.submit(&batch)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.config.request_timeout)),
            };
            guard.completed = true;
            drop(guard);

            let mut state = self.lock()?;
            if state.epoch != epoch {
                log::info!("Discarding sync result from an ended session");
                report.discarded = true;
                if state.status == SyncStatus::Syncing {
                    Self::transition(&mut state, SyncStatus::Idle, &mut events);
                }
                drop(state);
                self.emit(events);
                return Ok(report);
            }

            let reply = result.and_then(|reply| {
                if reply.outcomes.len() == batch.len() {
                    Ok(reply)
                } else {
                    Err(TransportError::MalformedResponse(format!(
                        "expected {} outcomes, got {}",
                        batch.len(),
                        reply.outcomes.len()
                    )))
                }
            });

            match reply {
                Ok(reply) => {
                    state.consecutive_failures = 0;
                    for (sent, outcome) in batch.iter().zip(reply.outcomes) {
                        // the queue's copy carries any prior line rebased by an
                        // earlier rejection in this batch
                        let Some(op) = state.queue.dequeue(&sent.op_id) else {
                            // dropped while in flight, e.g. by a product removal
                            continue;
                        };
                        match outcome {
                            OperationOutcome::Confirmed => {
                                report.confirmed += 1;
                                state.clear_failure(&op.product_id);
                                events.push(CartEvent::Confirmed {
                                    op_id: op.op_id.clone(),
                                    product_id: op.product_id.clone(),
                                });
                            }
                            OperationOutcome::Rejected(reason) => {
                                report.rejected += 1;
                                Self::roll_back(&mut state, &op, &reason)?;
                                events.push(CartEvent::Rejected {
                                    op_id: op.op_id.clone(),
                                    product_id: op.product_id.clone(),
                                    reason,
                                });
                            }
                        }
                    }
                    if let Some(snapshot) = reply.snapshot {
                        Self::reconcile(&mut state, &snapshot, &mut events)?;
                    }
                    drop(state);
                    self.emit(events);
                }
                Err(error) => {
                    log::warn!("Sync round-trip failed: {}", error);
                    let mut gave_up = false;
                    for sent in &batch {
                        if self.config.retry_policy.is_exhausted(sent.attempts)
                            && Self::fail_permanently(&mut state, &sent.op_id, &mut events)
                        {
                            report.permanently_failed += 1;
                            gave_up = true;
                        }
                    }

                    // a new head starts again from the initial delay
                    state.consecutive_failures = if gave_up {
                        1
                    } else {
                        state.consecutive_failures.saturating_add(1)
                    };
                    if state.status != SyncStatus::Offline {
                        if state.queue.is_empty() {
                            Self::transition(&mut state, SyncStatus::Idle, &mut events);
                        } else {
                            let attempt = state.consecutive_failures;
                            let retry_in = self.config.retry_policy.delay_for_attempt(attempt);
                            report.retry_in = Some(retry_in);
                            Self::transition(
                                &mut state,
                                SyncStatus::Backoff { attempt, retry_in },
                                &mut events,
                            );
                        }
                    }
                    report.transport_error = Some(error);
                    drop(state);
                    self.emit(events);
                    return Ok(report);
                }
            }
        }
    }

    /// Fetches the server cart and merges it
    pub async fn refresh_from_server(&self) -> SyncResult<bool> {
        let epoch = {
            let state = self.lock()?;
            if state.status == SyncStatus::Offline {
                return Err(SyncError::Offline);
            }
            state.epoch
        };

        let timeout = Timeout::new(self.config.request_timeout);
        let snapshot = match timeout.execute(self.transport.fetch_cart()).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(self.config.request_timeout).into()),
        };

        let mut events = Vec::new();
        let merged = {
            let mut state = self.lock()?;
            if state.epoch != epoch {
                log::info!("Discarding server cart from an ended session");
                return Ok(false);
            }
            Self::reconcile(&mut state, &snapshot, &mut events)?
        };
        self.emit(events);
        Ok(merged)
    }

    /// Applies a push notification; returns false if it was stale
    pub fn ingest(&self, notification: &Notification) -> SyncResult<bool> {
        let mut events = Vec::new();
        {
            let mut state = self.lock()?;
            if !state.gate.is_fresh(notification) {
                return Ok(false);
            }

            let product_id = &notification.product_id;
            match &notification.event {
                NotificationEvent::PriceChanged { unit_price } => {
                    if state.model.update_price(product_id, *unit_price)? {
                        events.push(CartEvent::PriceUpdated {
                            product_id: product_id.clone(),
                            unit_price: *unit_price,
                        });
                    }
                }
                NotificationEvent::StockChanged { available } => {
                    let wanted = state
                        .model
                        .state()
                        .line_for_product(product_id)
                        .map(|l| l.quantity);
                    if let Some(wanted) = wanted {
                        if *available < wanted {
                            state.issues.insert(
                                product_id.clone(),
                                LineIssue::LowStock {
                                    available: *available,
                                },
                            );
                        } else if matches!(
                            state.issues.get(product_id),
                            Some(LineIssue::LowStock { .. })
                        ) {
                            state.issues.remove(product_id);
                        }
                        events.push(CartEvent::StockChanged {
                            product_id: product_id.clone(),
                            available: *available,
                        });
                    }
                }
                NotificationEvent::ProductRemoved => {
                    let dropped = state.queue.remove_for_product(product_id);
                    let removed = state.model.remove_product(product_id)?;
                    state.forget_issue(product_id);
                    if removed || !dropped.is_empty() {
                        log::info!(
                            "Product {} removed from catalog ({} pending operations dropped)",
                            product_id,
                            dropped.len()
                        );
                        events.push(CartEvent::ProductRemoved {
                            product_id: product_id.clone(),
                        });
                    }
                }
            }
            // only once applied, so a failed merge can be redelivered
            state.gate.record(notification);
        }
        self.emit(events);
        Ok(true)
    }

    /// Subscribes the engine to a notification channel topic
    pub fn attach(self: &Arc<Self>, channel: &dyn NotificationChannel, topic: &str) -> Subscription {
        let engine: Weak<Self> = Arc::downgrade(self);
        let handler: NotificationHandler = Arc::new(move |notification: &Notification| {
            if let Some(engine) = engine.upgrade() {
                if let Err(e) = engine.ingest(notification) {
                    log::warn!("Failed to apply notification: {}", e);
                }
            }
        });
        channel.subscribe(topic, handler)
    }

    /// Drives sync cycles until `shutdown` flips to true
    ///
    /// Wakes on mutations and connectivity changes, and sleeps out backoff
    /// delays between failed cycles.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        log::info!("Sync engine started");
        loop {
            let wait = match self.lock() {
                Ok(state) => match state.status {
                    SyncStatus::Backoff { retry_in, .. } => Some(retry_in),
                    SyncStatus::Idle if !state.queue.is_empty() => Some(Duration::ZERO),
                    _ => None,
                },
                Err(e) => {
                    log::error!("Sync engine stopping: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = self.wake.notified() => {}
                _ = sleep_or_forever(wait) => {}
            }

            match self.sync_once().await {
                Ok(report) if report.confirmed + report.rejected > 0 => {
                    log::info!(
                        "Sync cycle: {} confirmed, {} rejected",
                        report.confirmed,
                        report.rejected
                    );
                }
                Ok(_) => {}
                Err(SyncError::SyncInProgress) => {}
                Err(e) => log::warn!("Sync cycle failed: {}", e),
            }
        }
        log::info!("Sync engine stopped");
    }

    // ----- internals -----

    fn lock(&self) -> SyncResult<MutexGuard<'_, EngineState>> {
        self.state.lock().map_err(|_| SyncError::LockPoisoned)
    }

    fn emit(&self, events: Vec<CartEvent>) {
        if let Some(callback) = &self.callback {
            for event in &events {
                callback(event);
            }
        }
    }

    /// Stores the operation, then the cart
    ///
    /// A crash between the two writes leaves a queued operation whose effect
    /// is missing locally; it is still delivered and the next server cart
    /// brings the line back.
    fn record_mutation(
        state: &mut EngineState,
        staged: StagedChange,
        operation: PendingOperation,
    ) -> SyncResult<AppliedChange> {
        let op_id = state
            .queue
            .enqueue(operation)
            .map_err(|e| CartError::storage("Failed to persist pending operations", e))?;

        match state.model.commit_staged(staged) {
            Ok(change) => {
                state.clear_failure(&change.product_id);
                Ok(change)
            }
            Err(e) => {
                state.queue.dequeue(&op_id);
                Err(e.into())
            }
        }
    }

    fn transition(state: &mut EngineState, to: SyncStatus, events: &mut Vec<CartEvent>) {
        let from = state.status;
        if from != to {
            log::debug!("Sync status: {} -> {}", from, to);
            state.status = to;
            events.push(CartEvent::StatusChanged { from, to });
        }
    }

    /// Undoes a refused operation on its product, keeping later queued
    /// operations on the same product applied on top
    fn roll_back(
        state: &mut EngineState,
        rejected: &PendingOperation,
        reason: &RejectionReason,
    ) -> SyncResult<()> {
        log::info!(
            "Operation {} on {} rejected: {}",
            rejected.op_id,
            rejected.product_id,
            reason
        );

        let later = state.queue.operations_for(&rejected.product_id);
        let priors = state.model.rebase_product(
            &rejected.product_id,
            rejected.prior_line.clone(),
            &later,
        )?;
        for (op, prior) in later.iter().zip(priors) {
            state.queue.set_prior_line(&op.op_id, prior);
        }

        if let RejectionReason::PriceChanged {
            current_price: Some(price),
        } = reason
        {
            state.model.update_price(&rejected.product_id, *price)?;
        }
        Ok(())
    }

    fn fail_permanently(state: &mut EngineState, op_id: &OpId, events: &mut Vec<CartEvent>) -> bool {
        let Some(op) = state.queue.dequeue(op_id) else {
            return false;
        };
        log::error!(
            "Operation {} on {} failed permanently after {} attempts",
            op.op_id,
            op.product_id,
            op.attempts
        );
        state.issues.insert(
            op.product_id.clone(),
            LineIssue::PermanentFailure {
                op_id: op.op_id.clone(),
                attempts: op.attempts,
            },
        );
        events.push(CartEvent::PermanentFailure {
            op_id: op.op_id.clone(),
            product_id: op.product_id.clone(),
            attempts: op.attempts,
        });
        state.failed.insert(op.product_id.clone(), op);
        true
    }

    /// Merges a server snapshot if it is newer than the last one applied
    fn reconcile(
        state: &mut EngineState,
        snapshot: &ServerCartSnapshot,
        events: &mut Vec<CartEvent>,
    ) -> SyncResult<bool> {
        if let Some(last) = state.last_server_revision {
            if snapshot.server_revision <= last {
                log::debug!(
                    "Ignoring server cart revision {} (already at {})",
                    snapshot.server_revision,
                    last
                );
                return Ok(false);
            }
        }

        let mut protected: HashSet<ProductId> = state.queue.pending_products();
        protected.extend(state.issues.iter().filter_map(|(product, issue)| {
            matches!(issue, LineIssue::PermanentFailure { .. }).then(|| product.clone())
        }));

        let changed = state.model.merge_snapshot(snapshot, &protected)?;
        state.last_server_revision = Some(snapshot.server_revision);
        if changed {
            log::info!("Merged server cart revision {}", snapshot.server_revision);
        }
        events.push(CartEvent::Reconciled {
            server_revision: snapshot.server_revision,
        });
        Ok(changed)
    }
}

/// Clears the in-flight flag even if the sync future is dropped mid-request
struct InFlightGuard<'a> {
    engine: &'a SyncEngine,
    completed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.engine.state.lock() {
            state.in_flight = false;
            if !self.completed && state.status == SyncStatus::Syncing {
                state.status = SyncStatus::Idle;
            }
        }
    }
}

async fn sleep_or_forever(wait: Option<Duration>) {
    match wait {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}
