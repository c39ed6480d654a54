//! CoinGecko market data client
//!
//! This module provides accessors for token listings, prices, price history and
//! token details. Every request goes through the shared [`RequestCache`], and
//! each accessor decides whether a failure falls back to an empty value or is
//! propagated to the caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::tokens::{all_tokens, is_manual_price_token};
use super::{MarketToken, PricePoint, SelectionMode, TokenDetails, TokenSummary};
use crate::cache::{HttpTransport, RequestCache, RequestError, Transport};

/// Base URL for the CoinGecko API
pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Cache key for the top-100 market listing
const TOKEN_LIST_KEY: &str = "token_list";

/// Cache key for the extended listing used by signals
const SIGNAL_MARKETS_KEY: &str = "signal_markets";

/// Errors that can occur when fetching market data
#[derive(Debug, Error)]
pub enum MarketError {
    /// The cached request failed
    #[error("Market request failed: {0}")]
    Request(#[from] RequestError),

    /// Response was JSON but not in the expected shape
    #[error("Failed to parse market response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),
}

/// Client for the CoinGecko market data API
#[derive(Debug)]
pub struct MarketClient<T = HttpTransport> {
    cache: RequestCache<T>,
    base_url: String,
}

impl<T> Clone for MarketClient<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl Default for MarketClient<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketClient<HttpTransport> {
    /// Create a new MarketClient with its own default cache
    pub fn new() -> Self {
        Self::with_cache(RequestCache::new())
    }
}

impl<T: Transport> MarketClient<T> {
    /// Create a new MarketClient sharing the given cache
    pub fn with_cache(cache: RequestCache<T>) -> Self {
        Self {
            cache,
            base_url: COINGECKO_BASE_URL.to_string(),
        }
    }

    /// Use a custom base URL (e.g. a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the shared request cache
    pub fn cache(&self) -> &RequestCache<T> {
        &self.cache
    }

    /// Fetch the top 100 tokens by market cap
    ///
    /// Returns an empty list if the request or parsing fails.
    pub async fn token_list(&self) -> Vec<MarketToken> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=100&page=1",
            self.base_url
        );

        match self.fetch_as::<Vec<MarketToken>>(&url, TOKEN_LIST_KEY).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to fetch token list");
                Vec::new()
            }
        }
    }

    /// Fetch the current USD price of a token
    ///
    /// Returns `None` if the request fails or the response has no non-zero
    /// price for the token.
    pub async fn token_price(&self, token_id: &str) -> Option<f64> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, token_id
        );

        match self.cache.fetch_cached(&url, &price_key(token_id)).await {
            Ok(value) => parse_simple_price(&value, token_id),
            Err(e) => {
                warn!(token_id, error = %e, "Failed to fetch token price");
                None
            }
        }
    }

    /// When the stored price for a token was fetched, if one is stored
    pub async fn price_cached_at(&self, token_id: &str) -> Option<DateTime<Utc>> {
        self.cache
            .peek(&price_key(token_id))
            .await
            .map(|entry| entry.cached_at)
    }

    /// Resolve the price to calculate with
    ///
    /// The manual-price catalogue token never touches the network and uses
    /// `manual_price`; any other token is looked up with [`Self::token_price`].
    pub async fn resolve_price(&self, token_id: &str, manual_price: Option<f64>) -> Option<f64> {
        if is_manual_price_token(token_id) {
            return manual_price;
        }
        self.token_price(token_id).await
    }

    /// Fetch 7 days of daily USD prices for a token
    ///
    /// Returns an empty list if the request fails or has no `prices` array.
    pub async fn token_history(&self, token_id: &str) -> Vec<PricePoint> {
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days=7&interval=daily",
            self.base_url, token_id
        );

        match self.cache.fetch_cached(&url, &format!("history_{}", token_id)).await {
            Ok(value) => parse_history(&value),
            Err(e) => {
                warn!(token_id, error = %e, "Failed to fetch token history");
                Vec::new()
            }
        }
    }

    /// Fetch market details for a single token
    ///
    /// # Returns
    /// * `Ok(TokenDetails)` - Details including current USD price
    /// * `Err(MarketError)` - If the request fails or has no USD price
    pub async fn token_details(&self, token_id: &str) -> Result<TokenDetails, MarketError> {
        let url = format!("{}/coins/{}", self.base_url, token_id);
        let value = self
            .cache
            .fetch_cached(&url, &format!("detail_{}", token_id))
            .await?;

        parse_details(value)
    }

    /// Fetch the top 250 tokens with sparklines and 1h/24h/7d price changes
    pub async fn signal_markets(&self) -> Result<Vec<MarketToken>, MarketError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=250&page=1&sparkline=true&price_change_percentage=1h,24h,7d",
            self.base_url
        );

        self.fetch_as(&url, SIGNAL_MARKETS_KEY).await
    }

    /// Tokens offered for selection in the given mode
    ///
    /// Static mode returns the built-in catalogue. Dynamic mode returns the
    /// live listing filtered to tokens whose market cap grew over 24h or 7d,
    /// which is empty when the listing cannot be fetched.
    pub async fn selectable_tokens(&self, mode: SelectionMode) -> Vec<TokenSummary> {
        match mode {
            SelectionMode::Static => all_tokens().iter().map(TokenSummary::from).collect(),
            SelectionMode::Dynamic => self
                .token_list()
                .await
                .iter()
                .filter(|token| token.has_growing_market_cap())
                .map(TokenSummary::from)
                .collect(),
        }
    }

    async fn fetch_as<D: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        key: &str,
    ) -> Result<D, MarketError> {
        let value = self.cache.fetch_cached(url, key).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn price_key(token_id: &str) -> String {
    format!("price_{}", token_id)
}

/// Extract `{id}.usd` from a `/simple/price` response, treating zero as absent
fn parse_simple_price(value: &Value, token_id: &str) -> Option<f64> {
    value
        .get(token_id)
        .and_then(|token| token.get("usd"))
        .and_then(Value::as_f64)
        .filter(|price| *price != 0.0)
}

/// `/coins/{id}/market_chart` response
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

/// Convert `[timestamp_ms, price]` pairs into price points, skipping bad timestamps
fn parse_history(value: &Value) -> Vec<PricePoint> {
    let chart = match MarketChartResponse::deserialize(value) {
        Ok(chart) => chart,
        Err(e) => {
            warn!(error = %e, "Unexpected market chart response");
            return Vec::new();
        }
    };

    chart
        .prices
        .into_iter()
        .filter_map(|(timestamp_ms, price)| {
            DateTime::from_timestamp_millis(timestamp_ms as i64)
                .map(|timestamp| PricePoint { timestamp, price })
        })
        .collect()
}

/// `/coins/{id}` response
#[derive(Debug, Deserialize)]
struct CoinDetailResponse {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<CoinImage>,
    #[serde(default)]
    market_data: Option<CoinMarketData>,
    #[serde(default)]
    links: Option<CoinLinks>,
}

#[derive(Debug, Deserialize)]
struct CoinImage {
    #[serde(default)]
    large: Option<String>,
}

/// Per-currency market figures; values can be `null`
#[derive(Debug, Deserialize)]
struct CoinMarketData {
    #[serde(default)]
    current_price: HashMap<String, Option<f64>>,
    #[serde(default)]
    price_change_percentage_1h_in_currency: HashMap<String, Option<f64>>,
    #[serde(default)]
    price_change_percentage_24h_in_currency: HashMap<String, Option<f64>>,
    #[serde(default)]
    total_volume: HashMap<String, Option<f64>>,
    #[serde(default)]
    market_cap: HashMap<String, Option<f64>>,
    #[serde(default)]
    fully_diluted_valuation: HashMap<String, Option<f64>>,
    #[serde(default)]
    circulating_supply: Option<f64>,
    #[serde(default)]
    total_supply: Option<f64>,
    #[serde(default)]
    max_supply: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinLinks {
    #[serde(default)]
    twitter_screen_name: Option<String>,
}

fn usd(figures: &HashMap<String, Option<f64>>) -> Option<f64> {
    figures.get("usd").copied().flatten()
}

fn parse_details(value: Value) -> Result<TokenDetails, MarketError> {
    let response: CoinDetailResponse = serde_json::from_value(value)?;
    let market_data = response
        .market_data
        .ok_or_else(|| MarketError::MissingField("market_data".to_string()))?;
    let current_price = usd(&market_data.current_price)
        .ok_or_else(|| MarketError::MissingField("market_data.current_price.usd".to_string()))?;

    Ok(TokenDetails {
        id: response.id,
        name: response.name,
        symbol: response.symbol,
        image: response.image.and_then(|image| image.large),
        current_price,
        price_change_percentage_1h: usd(&market_data.price_change_percentage_1h_in_currency),
        price_change_percentage_24h: usd(&market_data.price_change_percentage_24h_in_currency),
        total_volume: usd(&market_data.total_volume),
        market_cap: usd(&market_data.market_cap).unwrap_or(0.0),
        fully_diluted_valuation: usd(&market_data.fully_diluted_valuation).unwrap_or(0.0),
        circulating_supply: market_data.circulating_supply.unwrap_or(0.0),
        total_supply: market_data.total_supply,
        max_supply: market_data.max_supply,
        twitter_username: response
            .links
            .and_then(|links| links.twitter_screen_name)
            .filter(|name| !name.is_empty()),
    })
}
