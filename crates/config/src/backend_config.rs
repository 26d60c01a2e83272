//! Backend connection configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cart backend location, health check and notification polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSection {
    /// Root of the backend API
    pub base_url: String,

    /// Path below `base_url` answering health checks
    pub health_path: String,

    /// Seconds between connectivity checks
    pub connectivity_interval_secs: u64,

    /// Long-poll timeout for the notification feed in seconds
    pub notification_poll_secs: u64,

    /// Pause between empty notification polls in milliseconds
    pub notification_idle_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            health_path: "health".to_string(),
            connectivity_interval_secs: 15,
            notification_poll_secs: 30,
            notification_idle_ms: 1_000,
        }
    }
}

impl BackendSection {
    /// Interval between connectivity checks
    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_interval_secs)
    }

    /// Notification long-poll timeout
    pub fn notification_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs)
    }

    /// Pause between empty notification polls
    pub fn notification_idle_delay(&self) -> Duration {
        Duration::from_millis(self.notification_idle_ms)
    }
}

impl ConfigSection for BackendSection {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::http_url(&self.base_url, "backend.base_url"),
            Validator::not_empty(&self.health_path, "backend.health_path"),
            Validator::in_range(
                self.connectivity_interval_secs,
                1,
                3_600,
                "backend.connectivity_interval_secs",
            ),
            Validator::in_range(
                self.notification_poll_secs,
                1,
                300,
                "backend.notification_poll_secs",
            ),
            Validator::in_range(
                self.notification_idle_ms,
                0,
                60_000,
                "backend.notification_idle_ms",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        self.health_path = other.health_path;
        self.connectivity_interval_secs = other.connectivity_interval_secs;
        self.notification_poll_secs = other.notification_poll_secs;
        self.notification_idle_ms = other.notification_idle_ms;
    }

    fn section_name(&self) -> &'static str {
        "backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BackendSection::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.notification_poll_timeout(), Duration::from_secs(30));
        assert_eq!(config.notification_idle_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = BackendSection {
            base_url: "localhost:8080".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "backend.base_url");
    }

    #[test]
    fn test_zero_poll_timeout_rejected() {
        let config = BackendSection {
            notification_poll_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
