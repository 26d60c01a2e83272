// crates/resilience/src/retry.rs
//! Retry policies with exponential backoff

use crate::error::ResilienceError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first attempt)
    max_attempts: u32,
    /// Delay before the first retry
    initial_delay: Duration,
    /// Maximum delay between retries
    max_delay: Duration,
    /// Backoff multiplier
    multiplier: f64,
    /// Jitter as a fraction of the delay (0.2 = ±20%)
    jitter: f64,
}

impl RetryPolicy {
    /// Creates a new retry policy with a 500ms base, 30s cap and ±20% jitter
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    /// Sets the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction, clamped to `0.0..=1.0`
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt`, without jitter
    ///
    /// Attempt 0 is the first try and has no delay.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }

    /// Delay before retry number `attempt`, with jitter applied and the cap enforced
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if base.is_zero() || self.jitter == 0.0 {
            return base;
        }

        let factor = 1.0 + rand::rng().random_range(-self.jitter..=self.jitter);
        let jittered = base.as_millis() as f64 * factor;
        let capped = jittered.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped as u64)
    }

    /// Returns the maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the maximum delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns true once `attempts` submissions have used up the budget
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Executes an async operation with retry logic
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ResilienceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut last_error = String::new();

    while attempt < policy.max_attempts() {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = e.to_string();
                attempt += 1;

                if attempt >= policy.max_attempts() {
                    break;
                }

                let delay = policy.delay_for_attempt(attempt);
                log::debug!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt,
                    last_error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(ResilienceError::RetriesExhausted {
        attempts: attempt,
        last_error,
    })
}
