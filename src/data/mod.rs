//! Core data models for the token calculator
//!
//! This module contains the data types used throughout the application for
//! representing tokens, market listings, price history and token details, plus
//! the API clients that fetch them through the shared request cache.

pub mod exchange;
pub mod market;
pub mod tokens;

pub use exchange::{ExchangeRateClient, DEFAULT_EXCHANGE_RATE};
pub use market::{MarketClient, MarketError};
pub use tokens::{all_tokens, get_token_by_id, is_manual_price_token, MANUAL_PRICE_TOKEN_ID};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A token from the built-in catalogue
///
/// Uses `&'static str` for string fields to allow static initialization of the
/// catalogue. Convert to [`TokenSummary`] when an owned value is needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenInfo {
    /// CoinGecko identifier (e.g. "bitcoin")
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Ticker symbol
    pub symbol: &'static str,
    /// 24h market cap change in percent
    pub market_cap_change_percentage_24h: f64,
}

/// Owned token entry offered for selection, from either the catalogue or the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_change_percentage_24h: f64,
}

impl From<&TokenInfo> for TokenSummary {
    fn from(token: &TokenInfo) -> Self {
        Self {
            id: token.id.to_string(),
            name: token.name.to_string(),
            symbol: token.symbol.to_string(),
            market_cap_change_percentage_24h: token.market_cap_change_percentage_24h,
        }
    }
}

impl From<&MarketToken> for TokenSummary {
    fn from(token: &MarketToken) -> Self {
        Self {
            id: token.id.clone(),
            name: token.name.clone(),
            symbol: token.symbol.to_uppercase(),
            market_cap_change_percentage_24h: token.market_cap_change_percentage_24h.unwrap_or(0.0),
        }
    }
}

/// Keeps the tokens whose name contains `query`, ignoring case
///
/// A blank query keeps everything.
pub fn search_tokens(tokens: Vec<TokenSummary>, query: &str) -> Vec<TokenSummary> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return tokens;
    }
    tokens
        .into_iter()
        .filter(|token| token.name.to_lowercase().contains(&needle))
        .collect()
}

/// Where the selectable token list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Built-in catalogue, no network access
    #[default]
    Static,
    /// Live market listing, filtered to tokens with growing market cap
    Dynamic,
}

/// One row of the CoinGecko `/coins/markets` listing
///
/// Every numeric field is optional because the provider returns `null` for
/// thinly traded tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketToken {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h: Option<f64>,
    /// Not part of the standard listing; treated as absent when missing
    #[serde(default)]
    pub market_cap_change_percentage_7d: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h_in_currency: Option<f64>,
    #[serde(default)]
    pub sparkline_in_7d: Option<Sparkline>,
}

impl MarketToken {
    /// Whether market cap grew over the last 24h or 7d
    pub fn has_growing_market_cap(&self) -> bool {
        self.market_cap_change_percentage_24h.unwrap_or(0.0) > 0.0
            || self.market_cap_change_percentage_7d.unwrap_or(0.0) > 0.0
    }
}

/// Seven days of hourly prices attached to a market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<f64>,
}

impl Sparkline {
    /// Lowest and highest price over the window, skipping non-finite points
    pub fn range(&self) -> Option<(f64, f64)> {
        self.price
            .iter()
            .copied()
            .filter(|price| price.is_finite())
            .fold(None, |range, price| match range {
                None => Some((price, price)),
                Some((low, high)) => Some((low.min(price), high.max(price))),
            })
    }
}

/// A single point of a token's price history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// When the price was observed
    pub timestamp: DateTime<Utc>,
    /// Price in USD
    pub price: f64,
}

/// Market detail for a single token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub id: String,
    pub name: String,
    pub symbol: String,
    /// Large logo URL
    pub image: Option<String>,
    /// Current price in USD
    pub current_price: f64,
    /// 1h price change in percent (USD)
    pub price_change_percentage_1h: Option<f64>,
    /// 24h price change in percent (USD)
    pub price_change_percentage_24h: Option<f64>,
    /// 24h trading volume in USD
    pub total_volume: Option<f64>,
    /// Market capitalisation in USD, zero when unreported
    pub market_cap: f64,
    /// Fully diluted valuation in USD, zero when unreported
    pub fully_diluted_valuation: f64,
    /// Tokens in circulation, zero when unreported
    pub circulating_supply: f64,
    /// Tokens minted so far; `None` when the provider reports null
    pub total_supply: Option<f64>,
    /// Hard cap on supply; `None` for uncapped tokens
    pub max_supply: Option<f64>,
    /// Twitter handle from the token's links
    pub twitter_username: Option<String>,
}
