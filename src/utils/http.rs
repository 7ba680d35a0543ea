//! Shared HTTP client with optional rate limiting.
//!
//! One client instance is shared by every fetcher and HTTP-family invoker;
//! its timeout bounds all individual calls.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, Method};

use crate::error::BridgeError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared HTTP client with sensible defaults and optional rate limiting.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    rate_limiter: Option<Arc<DirectRateLimiter>>,
}

impl HttpClient {
    /// Create a client with the given per-call timeout and no rate limiting.
    pub fn new(timeout: Duration) -> Result<Self, BridgeError> {
        Self::with_rate_limit(timeout, 0)
    }

    /// Create a client limited to `requests_per_second` upstream calls.
    /// A limit of 0 disables rate limiting.
    pub fn with_rate_limit(
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, BridgeError> {
        let rate_limiter = NonZeroU32::new(requests_per_second).map(|rps| {
            tracing::info!(rps = requests_per_second, "Rate limiting enabled");
            Arc::new(RateLimiter::direct(Quota::per_second(rps)))
        });

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            rate_limiter,
        })
    }

    /// The underlying client, for callers that manage their own requests.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn get(&self, url: &str) -> RateLimitedRequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RateLimitedRequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            inner: self.client.request(method, url),
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

/// Request builder that waits on the rate limiter before sending.
pub struct RateLimitedRequestBuilder {
    inner: reqwest::RequestBuilder,
    rate_limiter: Option<Arc<DirectRateLimiter>>,
}

impl RateLimitedRequestBuilder {
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.inner = self.inner.header(key.as_ref(), value.as_ref());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.inner = self.inner.body(body);
        self
    }

    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.inner = self.inner.json(json);
        self
    }

    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.until_ready().await;
        }
        self.inner.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_without_rate_limit() {
        let client = HttpClient::new(Duration::from_secs(30)).unwrap();
        assert!(client.rate_limiter.is_none());
    }

    #[test]
    fn test_client_with_rate_limit() {
        let client = HttpClient::with_rate_limit(Duration::from_secs(30), 5).unwrap();
        assert!(client.rate_limiter.is_some());
    }

    #[test]
    fn test_zero_rps_disables_rate_limiting() {
        let client = HttpClient::with_rate_limit(Duration::from_secs(30), 0).unwrap();
        assert!(client.rate_limiter.is_none());
    }
}
