// crates/network/src/client.rs
//! HTTP client wrapper for the cart backend

use crate::error::{NetworkError, NetworkResult};
use cartsync_resilience::RetryPolicy;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, Url};
use serde::Serialize;
use std::time::Duration;

/// Header carrying the operation ID so the backend can deduplicate retries
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the backend API, e.g. `https://shop.example/api`
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Retry policy for reads; writes are sent once
    pub retry_policy: Option<RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("cartsync/{}", env!("CARGO_PKG_VERSION")),
            retry_policy: Some(RetryPolicy::new(3).with_initial_delay(Duration::from_millis(100))),
        }
    }
}

/// HTTP client bound to one backend
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    base: Url,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(NetworkError::InvalidUrl(config.base_url.clone()));
        }

        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner: client,
            base,
            config,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds a URL below the base, percent-encoding each segment
    pub fn url(&self, segments: &[&str]) -> NetworkResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| NetworkError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Performs a GET request, retrying connection failures and 5xx answers
    pub async fn get(&self, segments: &[&str], query: &[(&str, String)]) -> NetworkResult<Response> {
        let url = self.url(segments)?;
        self.request(|| self.inner.get(url.clone()).query(query)).await
    }

    /// Performs a single GET with its own timeout, for long polls
    pub async fn long_poll(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        timeout: Duration,
    ) -> NetworkResult<Response> {
        let url = self.url(segments)?;
        self.send(self.inner.get(url).query(query).timeout(timeout), timeout)
            .await
    }

    /// Performs a HEAD request
    pub async fn head(&self, segments: &[&str]) -> NetworkResult<Response> {
        let url = self.url(segments)?;
        self.request(|| self.inner.head(url.clone())).await
    }

    /// Sends a JSON body once, tagged with an idempotency key
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        idempotency_key: &str,
        body: Option<&B>,
    ) -> NetworkResult<Response> {
        let url = self.url(segments)?;
        let mut builder = self
            .inner
            .request(method, url)
            .header(IDEMPOTENCY_HEADER, idempotency_key);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder, self.config.timeout).await
    }

    /// Checks if a path answers successfully
    pub async fn is_accessible(&self, segments: &[&str]) -> bool {
        matches!(self.head(segments).await, Ok(response) if response.status().is_success())
    }

    async fn send(&self, builder: RequestBuilder, timeout: Duration) -> NetworkResult<Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout(timeout)
            } else {
                NetworkError::Http(e)
            }
        })
    }

    /// Internal request handler with retry
    async fn request<F>(&self, build: F) -> NetworkResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self
            .config
            .retry_policy
            .as_ref()
            .map(|p| p.max_attempts())
            .unwrap_or(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match self.send(build(), self.config.timeout).await {
                Ok(response) if !response.status().is_server_error() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    NetworkError::Status {
                        status: status.as_u16(),
                        message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                    }
                }
                Err(e) => e,
            };

            if attempts >= max_attempts || !error.is_retryable() {
                return Err(error);
            }
            if let Some(policy) = &self.config.retry_policy {
                let delay = policy.delay_for_attempt(attempts);
                log::debug!("Request attempt {} failed ({}), retrying in {:?}", attempts, error, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
