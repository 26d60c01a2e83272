// crates/sync-engine/src/notification.rs
//! Server push notifications
//!
//! A [`NotificationChannel`] fans notifications out to subscribers of a
//! topic. A [`NotificationPump`] keeps a [`NotificationSource`] connected,
//! reconnecting with backoff whenever the stream drops. The [`SequenceGate`]
//! discards anything older than what was already applied for a product.

use crate::transport::TransportError;
use async_trait::async_trait;
use cartsync_core::{Notification, ProductId};
use cartsync_resilience::RetryPolicy;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Handler invoked for each delivered notification
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Stream of notifications from one connection; ends when the connection drops
pub type NotificationStream = BoxStream<'static, Notification>;

/// Topic-based delivery of notifications
pub trait NotificationChannel: Send + Sync {
    /// Registers a handler until the returned subscription is dropped
    fn subscribe(&self, topic: &str, handler: NotificationHandler) -> Subscription;
}

/// Live registration on a channel; unsubscribes on drop
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `unsubscribe` exactly once
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Ends the subscription now
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

type Subscribers = HashMap<String, Vec<(u64, NotificationHandler)>>;

/// In-process channel, used by tests and by the HTTP pump
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryChannel {
    /// Creates a channel with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a notification to every subscriber of `topic`
    ///
    /// Handlers run outside the channel lock. Returns how many were called.
    pub fn publish(&self, topic: &str, notification: &Notification) -> usize {
        let handlers: Vec<NotificationHandler> = match self.subscribers.lock() {
            Ok(subscribers) => subscribers
                .get(topic)
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default(),
            Err(_) => {
                log::error!("Notification channel lock poisoned");
                return 0;
            }
        };

        for handler in &handlers {
            handler(notification);
        }
        handlers.len()
    }

    /// Number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .map(|s| s.get(topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl NotificationChannel for InMemoryChannel {
    fn subscribe(&self, topic: &str, handler: NotificationHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers
                .entry(topic.to_string())
                .or_default()
                .push((id, handler));
        }

        let subscribers = Arc::clone(&self.subscribers);
        let topic = topic.to_string();
        Subscription::new(move || {
            if let Ok(mut subscribers) = subscribers.lock() {
                if let Some(list) = subscribers.get_mut(&topic) {
                    list.retain(|(entry, _)| *entry != id);
                    if list.is_empty() {
                        subscribers.remove(&topic);
                    }
                }
            }
        })
    }
}

/// Per-product high-water mark of applied notification sequences
#[derive(Debug, Clone, Default)]
pub struct SequenceGate {
    applied: HashMap<ProductId, u64>,
}

impl SequenceGate {
    /// Creates an empty gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true, and records the sequence, if the notification is newer
    /// than everything applied so far for its product
    pub fn admit(&mut self, notification: &Notification) -> bool {
        if !self.is_fresh(notification) {
            return false;
        }
        self.record(notification);
        true
    }

    /// Returns true if the notification is newer than everything applied
    /// for its product, without recording it
    pub fn is_fresh(&self, notification: &Notification) -> bool {
        match self.applied.get(&notification.product_id) {
            Some(&last) if notification.sequence <= last => {
                log::debug!(
                    "Dropping stale notification {} for {} (last applied {})",
                    notification.sequence,
                    notification.product_id,
                    last
                );
                false
            }
            _ => true,
        }
    }

    /// Marks a notification as applied
    pub fn record(&mut self, notification: &Notification) {
        let last = self
            .applied
            .entry(notification.product_id.clone())
            .or_insert(notification.sequence);
        *last = (*last).max(notification.sequence);
    }

    /// Last applied sequence for a product
    pub fn last_applied(&self, product_id: &ProductId) -> Option<u64> {
        self.applied.get(product_id).copied()
    }

    /// Highest sequence applied for any product
    pub fn high_water_mark(&self) -> Option<u64> {
        self.applied.values().copied().max()
    }

    /// Forgets everything
    pub fn reset(&mut self) {
        self.applied.clear();
    }
}

/// Opens connections to a notification feed
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Opens a new connection
    async fn connect(&self) -> Result<NotificationStream, TransportError>;
}

/// Counters from a pump run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Successful connections
    pub connections: u64,
    /// Failed connection attempts
    pub failed_connects: u64,
    /// Notifications forwarded
    pub delivered: u64,
}

/// Keeps a notification source connected and forwards what it yields
pub struct NotificationPump {
    source: Arc<dyn NotificationSource>,
    policy: RetryPolicy,
}

impl NotificationPump {
    /// Creates a pump; `policy` only shapes reconnect delays
    pub fn new(source: Arc<dyn NotificationSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Runs until `shutdown` flips to true, reconnecting forever
    pub async fn run<F>(&self, sink: F, mut shutdown: watch::Receiver<bool>) -> PumpStats
    where
        F: Fn(Notification) + Send + Sync,
    {
        let mut stats = PumpStats::default();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.source.connect().await {
                Ok(mut stream) => {
                    failures = 0;
                    stats.connections += 1;
                    log::info!("Notification stream connected");

                    loop {
                        tokio::select! {
                            _ = stopped(&mut shutdown) => return stats,
                            next = stream.next() => match next {
                                Some(notification) => {
                                    stats.delivered += 1;
                                    sink(notification);
                                }
                                None => break,
                            }
                        }
                    }
                    log::warn!("Notification stream disconnected");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    stats.failed_connects += 1;
                    log::warn!("Notification connect failed (attempt {}): {}", failures, e);
                }
            }

            let delay = self.policy.delay_for_attempt(failures.max(1));
            log::debug!("Reconnecting notification stream in {:?}", delay);
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        stats
    }
}

/// Resolves once shutdown is requested or the sender is gone
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
