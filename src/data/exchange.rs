//! USD to IDR exchange rate client
//!
//! Fetches the conversion rate from exchangerate.host through the shared
//! request cache, falling back to a fixed rate when the provider is unavailable.

use serde_json::Value;
use tracing::warn;

use crate::cache::{HttpTransport, RequestCache, Transport};

/// Base URL for the exchangerate.host API
pub const EXCHANGE_RATE_BASE_URL: &str = "https://api.exchangerate.host";

/// Rupiah per dollar used when no live rate is available
pub const DEFAULT_EXCHANGE_RATE: f64 = 16000.0;

/// Cache key for the USD/IDR rate
const EXCHANGE_RATE_KEY: &str = "exchange_rate";

/// Client for fetching the USD/IDR conversion rate
#[derive(Debug)]
pub struct ExchangeRateClient<T = HttpTransport> {
    cache: RequestCache<T>,
    base_url: String,
}

impl<T> Clone for ExchangeRateClient<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl Default for ExchangeRateClient<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRateClient<HttpTransport> {
    /// Create a new ExchangeRateClient with its own default cache
    pub fn new() -> Self {
        Self::with_cache(RequestCache::new())
    }
}

impl<T: Transport> ExchangeRateClient<T> {
    /// Create a new ExchangeRateClient sharing the given cache
    pub fn with_cache(cache: RequestCache<T>) -> Self {
        Self {
            cache,
            base_url: EXCHANGE_RATE_BASE_URL.to_string(),
        }
    }

    /// Use a custom base URL (e.g. a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch the number of rupiah per US dollar
    ///
    /// Never fails: a failed request, a missing `info.rate`, or a zero rate all
    /// yield [`DEFAULT_EXCHANGE_RATE`].
    pub async fn exchange_rate(&self) -> f64 {
        let url = format!("{}/convert?from=USD&to=IDR", self.base_url);

        match self.cache.fetch_cached(&url, EXCHANGE_RATE_KEY).await {
            Ok(value) => parse_rate(&value).unwrap_or_else(|| {
                warn!("Exchange rate response has no rate, using default");
                DEFAULT_EXCHANGE_RATE
            }),
            Err(e) => {
                warn!(error = %e, "Failed to fetch exchange rate, using default");
                DEFAULT_EXCHANGE_RATE
            }
        }
    }
}

/// Extract `info.rate`, treating zero as absent
fn parse_rate(value: &Value) -> Option<f64> {
    value
        .get("info")
        .and_then(|info| info.get("rate"))
        .and_then(Value::as_f64)
        .filter(|rate| *rate != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_parse_rate() {
        let value = json!({"success": true, "info": {"rate": 16250.5}, "result": 16250.5});
        assert_eq!(parse_rate(&value), Some(16250.5));
    }

    #[test]
    fn test_parse_rate_missing_info() {
        assert_eq!(parse_rate(&json!({"success": false})), None);
        assert_eq!(parse_rate(&json!({"info": {}})), None);
        assert_eq!(parse_rate(&json!({"info": {"rate": "16000"}})), None);
    }

    #[test]
    fn test_parse_rate_zero_is_absent() {
        assert_eq!(parse_rate(&json!({"info": {"rate": 0}})), None);
    }

    #[tokio::test]
    async fn test_unreachable_provider_falls_back_to_default() {
        let cache = RequestCache::with_config(CacheConfig {
            request_delay: Duration::ZERO,
            ..CacheConfig::default()
        });
        let client = ExchangeRateClient::with_cache(cache.clone()).with_base_url("http://127.0.0.1:9");

        let rate = client.exchange_rate().await;

        assert_eq!(rate, DEFAULT_EXCHANGE_RATE);
        assert!(cache.is_empty().await);
    }
}
