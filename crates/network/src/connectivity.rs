// crates/network/src/connectivity.rs
//! Backend reachability checks

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use cartsync_sync_engine::SyncEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Checks the backend health endpoint
#[derive(Clone)]
pub struct ConnectivityChecker {
    client: Client,
    health_path: Vec<String>,
}

impl ConnectivityChecker {
    /// Creates a checker probing `{base}/health`
    pub fn new(client: Client) -> Self {
        Self::with_path(client, "health")
    }

    /// Creates a checker probing a custom path below the base URL
    pub fn with_path(client: Client, path: &str) -> Self {
        Self {
            client,
            health_path: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    fn segments(&self) -> Vec<&str> {
        self.health_path.iter().map(String::as_str).collect()
    }

    /// Checks if the backend answers
    pub async fn is_online(&self) -> bool {
        self.client.is_accessible(&self.segments()).await
    }

    /// Checks connectivity and returns error if offline
    pub async fn check(&self) -> NetworkResult<()> {
        if self.is_online().await {
            Ok(())
        } else {
            Err(NetworkError::NetworkUnavailable)
        }
    }

    /// Estimates latency by timing a HEAD request
    pub async fn estimate_latency(&self) -> NetworkResult<Duration> {
        let start = Instant::now();
        self.client.head(&self.segments()).await?;
        Ok(start.elapsed())
    }

    /// Feeds health check results into the engine until `shutdown` flips to true
    pub async fn monitor(
        &self,
        engine: Arc<SyncEngine>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut last = None;
        loop {
            let online = self.is_online().await;
            if last != Some(online) {
                log::info!("Backend is {}", if online { "reachable" } else { "unreachable" });
                last = Some(online);
            }
            if let Err(e) = engine.set_online(online) {
                log::error!("Failed to report connectivity: {}", e);
                return;
            }

            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;

    #[test]
    fn test_connectivity_checker_creation() {
        let client = Client::new().expect("Failed to create client");
        let checker = ConnectivityChecker::new(client);
        assert_eq!(checker.segments(), vec!["health"]);
    }

    #[test]
    fn test_connectivity_checker_with_custom_path() {
        let client = Client::new().expect("Failed to create client");
        let checker = ConnectivityChecker::with_path(client, "/status/live/");
        assert_eq!(checker.segments(), vec!["status", "live"]);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_offline() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            retry_policy: None,
            ..ClientConfig::default()
        };
        let checker = ConnectivityChecker::new(Client::with_config(config).unwrap());
        assert!(!checker.is_online().await);
        assert!(matches!(
            checker.check().await,
            Err(NetworkError::NetworkUnavailable)
        ));
    }
}
