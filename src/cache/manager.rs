//! Request cache for rate-limited market data APIs
//!
//! Provides a `RequestCache` that memoizes decoded JSON responses by a logical
//! cache key for a fixed time-to-live, and pauses before every outbound fetch
//! to stay under the provider's rate limit.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::transport::{HttpTransport, Transport};

/// How long a stored response is considered fresh (2 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_millis(120_000);

/// Pause before every outbound request (1.1 seconds)
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1_100);

/// Errors that can occur when fetching through the cache
#[derive(Debug, Error)]
pub enum RequestError {
    /// Transport failure before any response arrived
    #[error("Network request failed: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response arrived with a non-success status
    #[error("HTTP error, status: {status}")]
    Fetch { status: u16 },

    /// Response body was not valid JSON
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::Network(Box::new(err))
    }
}

/// Timing configuration for the request cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum age of an entry that is still served from the cache
    pub ttl: Duration,
    /// Fixed pause before each outbound request on a miss
    pub request_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

/// A decoded response stored under a cache key
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Logical query identifier (e.g. "price_bitcoin")
    pub key: String,
    /// Decoded response payload
    pub value: Value,
    /// Monotonic time the entry was written, used for freshness
    pub stored_at: Instant,
    /// Wall-clock time the entry was written
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Freshness of a key, derived at read time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never fetched successfully
    Missing,
    /// Stored and younger than the TTL
    Fresh,
    /// Stored but older than the TTL; the next fetch overwrites it
    Stale,
}

/// Memoizing fetcher shared by every market data accessor
///
/// Cloning is cheap: clones share the same entry map and transport, so one
/// instance created at startup can be handed to every client. Entries are
/// never evicted; a stale entry stays in the map until the next successful
/// fetch for its key overwrites it.
///
/// The map lock is only held for lookups and stores, never across the
/// pre-fetch delay or the network await. Concurrent misses therefore proceed
/// independently, and concurrent misses for the same key each fetch, with the
/// last one to finish winning.
pub struct RequestCache<T = HttpTransport> {
    transport: Arc<T>,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    config: CacheConfig,
}

impl<T> Clone for RequestCache<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            entries: Arc::clone(&self.entries),
            config: self.config,
        }
    }
}

impl<T> fmt::Debug for RequestCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RequestCache<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCache<HttpTransport> {
    /// Creates a cache over a default HTTP transport with the default timings
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new(), CacheConfig::default())
    }

    /// Creates a cache over a default HTTP transport with custom timings
    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_transport(HttpTransport::new(), config)
    }
}

impl<T: Transport> RequestCache<T> {
    /// Creates an empty cache over the given transport
    pub fn with_transport(transport: T, config: CacheConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            entries: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Returns the timing configuration
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Returns the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the decoded response for `url`, served from the cache when fresh
    ///
    /// On a miss (no entry, or an entry older than the TTL) this sleeps for the
    /// configured request delay, fetches `url`, decodes the body as JSON and
    /// stores it under `key`. A failed fetch or decode leaves the cache as it
    /// was. Failures are not retried.
    ///
    /// # Arguments
    /// * `url` - Fully-formed request target
    /// * `key` - Logical query identifier (e.g. "price_bitcoin")
    ///
    /// # Returns
    /// * `Ok(Value)` - The fresh cached or newly fetched payload
    /// * `Err(RequestError)` - Network, status, or decode failure
    pub async fn fetch_cached(&self, url: &str, key: &str) -> Result<Value, RequestError> {
        if let Some(value) = self.lookup_fresh(key).await {
            debug!(key, "cache hit");
            return Ok(value);
        }

        debug!(
            key,
            delay_ms = self.config.request_delay.as_millis() as u64,
            "cache miss"
        );
        tokio::time::sleep(self.config.request_delay).await;

        let response = self.transport.get(url).await.map_err(|err| {
            warn!(url, error = %err, "request failed");
            err
        })?;

        if !response.is_success() {
            warn!(url, status = response.status, "request returned error status");
            return Err(RequestError::Fetch {
                status: response.status,
            });
        }

        let value: Value = serde_json::from_str(&response.body).map_err(|err| {
            warn!(url, error = %err, "response body is not valid JSON");
            RequestError::Decode(err)
        })?;

        self.store(key, value.clone()).await;
        debug!(key, "cache entry stored");

        Ok(value)
    }

    /// Returns the entry stored under `key`, fresh or stale
    pub async fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Reports whether `key` is missing, fresh, or stale right now
    pub async fn entry_state(&self, key: &str) -> EntryState {
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => EntryState::Missing,
            Some(entry) if entry.is_fresh(self.config.ttl, Instant::now()) => EntryState::Fresh,
            Some(_) => EntryState::Stale,
        }
    }

    /// Number of stored entries, including stale ones
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been stored yet
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn lookup_fresh(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.config.ttl, Instant::now()))
            .map(|entry| entry.value.clone())
    }

    async fn store(&self, key: &str, value: Value) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: Instant::now(),
            cached_at: Utc::now(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RawResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory transport that serves scripted responses and counts calls
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<HashMap<String, Result<RawResponse, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn respond(&self, url: &str, status: u16, body: &str) {
            self.responses.lock().unwrap().insert(
                url.to_string(),
                Ok(RawResponse {
                    status,
                    body: body.to_string(),
                }),
            );
        }

        fn fail(&self, url: &str, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), Err(message.to_string()));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<RawResponse, RequestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.responses.lock().unwrap().get(url).cloned();
            match scripted {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(RequestError::Network(message.into())),
                None => Ok(RawResponse {
                    status: 404,
                    body: String::new(),
                }),
            }
        }
    }

    const PRICE_URL: &str = "https://market.test/simple/price?ids=bitcoin&vs_currencies=usd";
    const RATE_URL: &str = "https://rates.test/convert?from=USD&to=IDR";

    fn create_test_cache() -> RequestCache<ScriptedTransport> {
        RequestCache::with_transport(ScriptedTransport::default(), CacheConfig::default())
    }

    #[test]
    fn test_default_config_matches_constants() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_millis(120_000));
        assert_eq!(config.request_delay, Duration::from_millis(1_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_hits_cache() {
        let cache = create_test_cache();
        cache
            .transport()
            .respond(PRICE_URL, 200, r#"{"bitcoin":{"usd":65000}}"#);

        let first = cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();
        let second = cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(first, json!({"bitcoin": {"usd": 65000}}));
        assert_eq!(first, second);
        assert_eq!(cache.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_has_no_delay() {
        let cache = create_test_cache();
        cache
            .transport()
            .respond(PRICE_URL, 200, r#"{"bitcoin":{"usd":65000}}"#);
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        let start = Instant::now();
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_waits_request_delay() {
        let cache = create_test_cache();
        cache
            .transport()
            .respond(PRICE_URL, 200, r#"{"bitcoin":{"usd":65000}}"#);

        let start = Instant::now();
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert!(start.elapsed() >= DEFAULT_REQUEST_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_miss_waits_regardless_of_previous_request() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);
        cache.transport().respond(RATE_URL, 200, r#"{"b":2}"#);
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        // A different key right after the last request still pays the full delay
        let start = Instant::now();
        cache.fetch_cached(RATE_URL, "exchange_rate").await.unwrap();

        assert!(start.elapsed() >= DEFAULT_REQUEST_DELAY);
        assert_eq!(cache.transport().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_one_new_fetch() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"bitcoin":{"usd":1}}"#);
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();
        let first_stored = cache.peek("price_bitcoin").await.unwrap().stored_at;

        tokio::time::advance(DEFAULT_TTL).await;
        assert_eq!(cache.entry_state("price_bitcoin").await, EntryState::Stale);

        cache.transport().respond(PRICE_URL, 200, r#"{"bitcoin":{"usd":2}}"#);
        let refreshed = cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(refreshed, json!({"bitcoin": {"usd": 2}}));
        assert_eq!(cache.transport().calls(), 2);
        let entry = cache.peek("price_bitcoin").await.unwrap();
        assert!(entry.stored_at > first_stored);
        assert_eq!(cache.entry_state("price_bitcoin").await, EntryState::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_just_under_ttl_is_fresh() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"x":1}"#);
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        tokio::time::advance(DEFAULT_TTL - Duration::from_millis(1)).await;
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(cache.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_past_ttl_refetches_after_delay() {
        let cache = create_test_cache();
        cache.transport().respond(RATE_URL, 200, r#"{"info":{"rate":15800}}"#);
        cache.fetch_cached(RATE_URL, "exchange_rate").await.unwrap();

        tokio::time::advance(Duration::from_millis(130_000)).await;
        cache.transport().respond(RATE_URL, 200, r#"{"info":{"rate":16200}}"#);

        let start = Instant::now();
        let value = cache.fetch_cached(RATE_URL, "exchange_rate").await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(1_100));
        assert_eq!(value["info"]["rate"], json!(16200));
        assert_eq!(cache.transport().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_is_fetch_error_and_keeps_prior_entry() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"bitcoin":{"usd":65000}}"#);
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        tokio::time::advance(DEFAULT_TTL).await;
        cache.transport().respond(PRICE_URL, 429, "Too Many Requests");

        let result = cache.fetch_cached(PRICE_URL, "price_bitcoin").await;

        assert!(matches!(result, Err(RequestError::Fetch { status: 429 })));
        let entry = cache.peek("price_bitcoin").await.expect("prior entry kept");
        assert_eq!(entry.value, json!({"bitcoin": {"usd": 65000}}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_within_ttl_of_prior_entry_still_serves_it() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"v":1}"#);
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        // A different key failing must not disturb the fresh one
        cache.transport().respond(RATE_URL, 429, "");
        assert!(cache.fetch_cached(RATE_URL, "exchange_rate").await.is_err());

        let value = cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();
        assert_eq!(value, json!({"v": 1}));
        assert_eq!(cache.entry_state("exchange_rate").await, EntryState::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_writes_no_entry() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, "<html>not json</html>");

        let result = cache.fetch_cached(PRICE_URL, "price_bitcoin").await;

        assert!(matches!(result, Err(RequestError::Decode(_))));
        assert!(cache.peek("price_bitcoin").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_is_surfaced_and_not_retried() {
        let cache = create_test_cache();
        cache.transport().fail(PRICE_URL, "connection refused");

        let result = cache.fetch_cached(PRICE_URL, "price_bitcoin").await;

        match result {
            Err(RequestError::Network(source)) => {
                assert_eq!(source.to_string(), "connection refused")
            }
            other => panic!("expected network error, got {:?}", other),
        }
        assert_eq!(cache.transport().calls(), 1);
        assert_eq!(cache.entry_state("price_bitcoin").await, EntryState::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_is_retried_only_by_caller() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 500, "");
        assert!(cache.fetch_cached(PRICE_URL, "price_bitcoin").await.is_err());

        cache.transport().respond(PRICE_URL, 200, r#"{"ok":true}"#);
        let value = cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(cache.transport().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_different_keys_do_not_serialize() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);
        cache.transport().respond(RATE_URL, 200, r#"{"b":2}"#);

        let start = Instant::now();
        let (a, b) = tokio::join!(
            cache.fetch_cached(PRICE_URL, "price_bitcoin"),
            cache.fetch_cached(RATE_URL, "exchange_rate"),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        // Both delays overlap instead of adding up
        assert!(start.elapsed() < DEFAULT_REQUEST_DELAY * 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_same_key_misses_both_fetch() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);

        let (a, b) = tokio::join!(
            cache.fetch_cached(PRICE_URL, "price_bitcoin"),
            cache.fetch_cached(PRICE_URL, "price_bitcoin"),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.transport().calls(), 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_entries() {
        let cache = create_test_cache();
        let clone = cache.clone();
        cache.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);

        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();
        clone.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(clone.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_instances_are_isolated() {
        let first = create_test_cache();
        let second = create_test_cache();
        first.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);
        second.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);

        first.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();

        assert_eq!(second.entry_state("price_bitcoin").await, EntryState::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_partition_by_query_not_url() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);

        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();
        cache.fetch_cached(PRICE_URL, "price_bitcoin_again").await.unwrap();

        assert_eq!(cache.transport().calls(), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_at_timestamp_is_recorded() {
        let cache = create_test_cache();
        cache.transport().respond(PRICE_URL, 200, r#"{"a":1}"#);

        let before = Utc::now();
        cache.fetch_cached(PRICE_URL, "price_bitcoin").await.unwrap();
        let after = Utc::now();

        let entry = cache.peek("price_bitcoin").await.unwrap();
        assert_eq!(entry.key, "price_bitcoin");
        assert!(entry.cached_at >= before);
        assert!(entry.cached_at <= after);
    }
}
