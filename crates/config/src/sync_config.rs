//! Sync engine configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry, timeout and batching behaviour of the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSection {
    /// Submissions per operation before it is marked permanently failed
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on any retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier between consecutive retries
    pub multiplier: f64,

    /// Jitter as a fraction of the delay (0.2 = ±20%)
    pub jitter: f64,

    /// Limit for one round-trip to the backend in seconds
    pub request_timeout_secs: u64,

    /// Upper bound on operations per submission when the backend batches
    pub max_batch_size: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.2,
            request_timeout_secs: 10,
            max_batch_size: 20,
        }
    }
}

impl SyncSection {
    /// Initial retry delay
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Retry delay cap
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Round-trip timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ConfigSection for SyncSection {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.max_attempts, 1, 50, "sync.max_attempts"),
            Validator::in_range(self.initial_delay_ms, 10, 60_000, "sync.initial_delay_ms"),
            Validator::in_range(self.max_delay_ms, 10, 3_600_000, "sync.max_delay_ms"),
            Validator::ordered(
                self.initial_delay_ms,
                self.max_delay_ms,
                "sync.initial_delay_ms",
            ),
            Validator::in_range(self.multiplier, 1.0, 10.0, "sync.multiplier"),
            Validator::in_range(self.jitter, 0.0, 1.0, "sync.jitter"),
            Validator::in_range(self.request_timeout_secs, 1, 300, "sync.request_timeout_secs"),
            Validator::in_range(self.max_batch_size, 1, 500, "sync.max_batch_size"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.max_attempts = other.max_attempts;
        self.initial_delay_ms = other.initial_delay_ms;
        self.max_delay_ms = other.max_delay_ms;
        self.multiplier = other.multiplier;
        self.jitter = other.jitter;
        self.request_timeout_secs = other.request_timeout_secs;
        self.max_batch_size = other.max_batch_size;
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}
