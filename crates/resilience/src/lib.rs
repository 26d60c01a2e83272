// crates/resilience/src/lib.rs
//! Resilience patterns for cart synchronization
//!
//! This module provides:
//! - Retry with exponential backoff and jitter
//! - Timeout handling for network round-trips
//!
//! # Example
//!
//! ```rust
//! use cartsync_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(5)
//!     .with_initial_delay(Duration::from_millis(500))
//!     .with_max_delay(Duration::from_secs(30));
//!
//! assert!(policy.delay_for_attempt(1) <= Duration::from_millis(600));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{with_retry, RetryPolicy};
pub use timeout::{with_timeout, Timeout};
