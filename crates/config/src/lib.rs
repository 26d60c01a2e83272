//! Cartsync Configuration System
//!
//! TOML configuration for the cart client. Each concern owns a section type
//! implementing `ConfigSection`; the root `Config` validates and merges them
//! together.
//!
//! # Architecture
//!
//! - **Trait-based**: `sync`, `store` and `backend` sections implement `ConfigSection`
//! - **Layered**: defaults, then `cartsync.toml`, then `CARTSYNC_*` variables
//! - **Atomic writes**: config files are never left half written
//!
//! # Example
//!
//! ```rust,no_run
//! use cartsync_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("no home directory");
//! let config = manager.load_effective().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Backend: {}", config.backend.base_url);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
mod backend_config;
mod store_config;
mod sync_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{ConfigManager, ENV_PREFIX};
pub use validation::{ConfigSection, Validator};

pub use backend_config::BackendSection;
pub use store_config::{StoreSection, DEFAULT_STORE_SCOPE};
pub use sync_config::SyncSection;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Every settable `section.field` key
pub const KEYS: &[&str] = &[
    "sync.max_attempts",
    "sync.initial_delay_ms",
    "sync.max_delay_ms",
    "sync.multiplier",
    "sync.jitter",
    "sync.request_timeout_secs",
    "sync.max_batch_size",
    "store.data_dir",
    "store.scope",
    "backend.base_url",
    "backend.health_path",
    "backend.connectivity_interval_secs",
    "backend.notification_poll_secs",
    "backend.notification_idle_ms",
];

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Retry, timeout and batching
    pub sync: SyncSection,

    /// Local persistence
    pub store: StoreSection,

    /// Backend connection
    pub backend: BackendSection,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.sync.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.store.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.backend.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.sync.merge(other.sync);
        self.store.merge(other.store);
        self.backend.merge(other.backend);
    }

    /// Reads one value by its `section.field` key
    pub fn get(&self, key: &str) -> ConfigResult<String> {
        let value = match key {
            "sync.max_attempts" => self.sync.max_attempts.to_string(),
            "sync.initial_delay_ms" => self.sync.initial_delay_ms.to_string(),
            "sync.max_delay_ms" => self.sync.max_delay_ms.to_string(),
            "sync.multiplier" => self.sync.multiplier.to_string(),
            "sync.jitter" => self.sync.jitter.to_string(),
            "sync.request_timeout_secs" => self.sync.request_timeout_secs.to_string(),
            "sync.max_batch_size" => self.sync.max_batch_size.to_string(),
            "store.data_dir" => self
                .store
                .data_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            "store.scope" => self.store.scope.clone(),
            "backend.base_url" => self.backend.base_url.clone(),
            "backend.health_path" => self.backend.health_path.clone(),
            "backend.connectivity_interval_secs" => {
                self.backend.connectivity_interval_secs.to_string()
            }
            "backend.notification_poll_secs" => self.backend.notification_poll_secs.to_string(),
            "backend.notification_idle_ms" => self.backend.notification_idle_ms.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Sets one value by its `section.field` key
    ///
    /// The value is parsed for the field's type but not range-checked;
    /// `ConfigManager::set` also validates and writes the file.
    /// An empty `store.data_dir` unsets it.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        match key {
            "sync.max_attempts" => self.sync.max_attempts = parse(key, value)?,
            "sync.initial_delay_ms" => self.sync.initial_delay_ms = parse(key, value)?,
            "sync.max_delay_ms" => self.sync.max_delay_ms = parse(key, value)?,
            "sync.multiplier" => self.sync.multiplier = parse(key, value)?,
            "sync.jitter" => self.sync.jitter = parse(key, value)?,
            "sync.request_timeout_secs" => self.sync.request_timeout_secs = parse(key, value)?,
            "sync.max_batch_size" => self.sync.max_batch_size = parse(key, value)?,
            "store.data_dir" => {
                self.store.data_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            "store.scope" => self.store.scope = value.to_string(),
            "backend.base_url" => self.backend.base_url = value.to_string(),
            "backend.health_path" => self.backend.health_path = value.to_string(),
            "backend.connectivity_interval_secs" => {
                self.backend.connectivity_interval_secs = parse(key, value)?
            }
            "backend.notification_poll_secs" => {
                self.backend.notification_poll_secs = parse(key, value)?
            }
            "backend.notification_idle_ms" => {
                self.backend.notification_idle_ms = parse(key, value)?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sync: SyncSection::default(),
            store: StoreSection::default(),
            backend: BackendSection::default(),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::BadValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: match std::any::type_name::<T>() {
            "f64" | "f32" => "number",
            _ => "whole number",
        },
    })
}
