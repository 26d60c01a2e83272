// crates/network/src/notifications.rs
//! Long-poll notification feed

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use async_trait::async_trait;
use cartsync_core::Notification;
use cartsync_sync_engine::{NotificationSource, NotificationStream, TransportError};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Polls `GET {base}/notifications?after={cursor}` for new notifications
///
/// The cursor is the highest sequence seen so far and survives reconnects,
/// so a new connection resumes where the previous one stopped.
#[derive(Clone)]
pub struct HttpNotificationSource {
    client: Client,
    cursor: Arc<AtomicU64>,
    poll_timeout: Duration,
    idle_delay: Duration,
}

impl HttpNotificationSource {
    /// Creates a source starting from the beginning of the feed
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cursor: Arc::new(AtomicU64::new(0)),
            poll_timeout: Duration::from_secs(30),
            idle_delay: Duration::from_secs(1),
        }
    }

    /// Sets how long the server may hold a poll open
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the pause after an empty answer
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Resumes from a known sequence
    pub fn with_cursor(self, after: u64) -> Self {
        self.cursor.store(after, Ordering::SeqCst);
        self
    }

    /// Highest sequence seen so far
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Fetches the next page of notifications
    pub async fn poll(&self) -> NetworkResult<Vec<Notification>> {
        let after = self.cursor().to_string();
        let response = self
            .client
            .long_poll(&["notifications"], &[("after", after)], self.poll_timeout)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        response
            .json::<Vec<Notification>>()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

struct PollState {
    source: HttpNotificationSource,
    buffer: VecDeque<Notification>,
}

#[async_trait]
impl NotificationSource for HttpNotificationSource {
    /// Polls once to prove the feed is reachable, then streams until a poll fails
    async fn connect(&self) -> Result<NotificationStream, TransportError> {
        let first = self.poll().await?;
        let state = PollState {
            source: self.clone(),
            buffer: first.into(),
        };

        let feed = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(notification) = state.buffer.pop_front() {
                    state
                        .source
                        .cursor
                        .fetch_max(notification.sequence, Ordering::SeqCst);
                    return Some((notification, state));
                }

                match state.source.poll().await {
                    Ok(page) if page.is_empty() => {
                        tokio::time::sleep(state.source.idle_delay).await;
                    }
                    Ok(page) => state.buffer.extend(page),
                    Err(e) => {
                        log::warn!("Notification poll failed: {}", e);
                        return None;
                    }
                }
            }
        });

        Ok(feed.boxed())
    }
}
