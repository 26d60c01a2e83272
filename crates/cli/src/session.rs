// FILE: crates/cli/src/session.rs
//! Wiring from configuration to a running cart engine

use anyhow::{Context, Result};
use cartsync_config::{BackendSection, Config, ConfigManager, SyncSection};
use cartsync_network::{
    Client, ClientConfig, ConnectivityChecker, HttpCartTransport, HttpNotificationSource,
};
use cartsync_resilience::RetryPolicy;
use cartsync_store::FileStore;
use cartsync_sync_engine::{EventCallback, SyncConfig, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line overrides applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub data_dir: Option<PathBuf>,
    pub offline: bool,
}

/// A file-backed cart engine plus the backend plumbing around it
pub struct CartSession {
    pub config: Config,
    pub options: SessionOptions,
    pub store_dir: PathBuf,
    pub engine: Arc<SyncEngine>,
    pub checker: ConnectivityChecker,
    pub notifications: HttpNotificationSource,
}

impl CartSession {
    /// Restores the cart from disk and connects it to the configured backend
    ///
    /// Nothing is sent until a sync is requested; the engine starts offline.
    pub fn open(
        config: Config,
        options: SessionOptions,
        callback: Option<EventCallback>,
    ) -> Result<Self> {
        let store_dir = match &options.data_dir {
            Some(dir) => dir.clone(),
            None => config
                .store
                .resolve_dir(&ConfigManager::default_data_dir().context("No data directory")?),
        };
        let store = Arc::new(FileStore::with_scope(&store_dir, config.store.scope.clone()));

        let client = Client::with_config(client_config(&config.backend, &config.sync))
            .context("Invalid backend configuration")?;
        let transport = Arc::new(HttpCartTransport::new(client.clone()));

        let mut engine = SyncEngine::new(sync_config(&config.sync), transport, store);
        if let Some(callback) = callback {
            engine = engine.with_event_callback(callback);
        }

        log::debug!("Cart store at {}", store_dir.display());
        Ok(Self {
            checker: ConnectivityChecker::with_path(client.clone(), &config.backend.health_path),
            notifications: HttpNotificationSource::new(client)
                .with_poll_timeout(config.backend.notification_poll_timeout())
                .with_idle_delay(config.backend.notification_idle_delay()),
            engine: Arc::new(engine),
            config,
            options,
            store_dir,
        })
    }

    /// Checks the backend and reports the result to the engine
    ///
    /// Always offline when `--offline` was given.
    pub async fn check_online(&self) -> Result<bool> {
        let online = !self.options.offline && self.checker.is_online().await;
        self.engine.set_online(online)?;
        Ok(online)
    }
}

/// Engine settings from the `sync` section
pub fn sync_config(section: &SyncSection) -> SyncConfig {
    SyncConfig {
        retry_policy: retry_policy(section),
        request_timeout: section.request_timeout(),
        max_batch_size: section.max_batch_size,
        initial_connectivity: None,
    }
}

/// Backoff policy from the `sync` section
pub fn retry_policy(section: &SyncSection) -> RetryPolicy {
    RetryPolicy::new(section.max_attempts)
        .with_initial_delay(section.initial_delay())
        .with_max_delay(section.max_delay())
        .with_multiplier(section.multiplier)
        .with_jitter(section.jitter)
}

/// HTTP client settings from the `backend` and `sync` sections
pub fn client_config(backend: &BackendSection, sync: &SyncSection) -> ClientConfig {
    ClientConfig {
        base_url: backend.base_url.clone(),
        timeout: sync.request_timeout(),
        ..ClientConfig::default()
    }
}
