//! Token price signals
//!
//! Picks tokens from the market listing whose price rose sharply over the last
//! hour or day, flags the ones worth notifying about, and enriches them with
//! their twitter handle.

use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::cache::Transport;
use crate::data::{MarketClient, MarketError, MarketToken};

/// Minimum 1h or 24h rise, in percent, for a token to be listed as a signal
pub const SIGNAL_THRESHOLD: f64 = 10.0;

/// Minimum 1h or 24h rise, in percent, for a signal to be flagged for notification
pub const NOTIFY_THRESHOLD: f64 = 15.0;

/// A token whose price is rising fast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSignal {
    /// The market listing row
    pub token: MarketToken,
    /// Twitter handle, if the detail lookup succeeded and has one
    pub twitter_username: Option<String>,
    /// Rise is at or above [`NOTIFY_THRESHOLD`]
    pub notify: bool,
}

impl TokenSignal {
    /// Notification text for a flagged signal
    pub fn notification_message(&self) -> String {
        format!(
            "{} is up {:.2}% in 1h ({:.2}% in 24h)",
            self.token.name,
            self.token.price_change_percentage_1h_in_currency.unwrap_or(0.0),
            self.token.price_change_percentage_24h_in_currency.unwrap_or(0.0),
        )
    }
}

fn exceeds(token: &MarketToken, threshold: f64) -> bool {
    token
        .price_change_percentage_1h_in_currency
        .is_some_and(|change| change >= threshold)
        || token
            .price_change_percentage_24h_in_currency
            .is_some_and(|change| change >= threshold)
}

/// Selects signal tokens, flags notifications and sorts by volume, highest first
///
/// Tokens without a reported volume sort last.
pub fn filter_signals(tokens: Vec<MarketToken>) -> Vec<TokenSignal> {
    let mut signals: Vec<TokenSignal> = tokens
        .into_iter()
        .filter(|token| exceeds(token, SIGNAL_THRESHOLD))
        .map(|token| TokenSignal {
            notify: exceeds(&token, NOTIFY_THRESHOLD),
            token,
            twitter_username: None,
        })
        .collect();

    signals.sort_by(|a, b| {
        let a_volume = a.token.total_volume.unwrap_or(f64::NEG_INFINITY);
        let b_volume = b.token.total_volume.unwrap_or(f64::NEG_INFINITY);
        b_volume.total_cmp(&a_volume)
    });

    signals
}

/// Fetches the market listing and returns the current signals
///
/// Twitter handles are looked up concurrently. A failed lookup leaves that
/// signal without a handle rather than failing the whole batch; only a failure
/// to fetch the listing itself is returned as an error.
pub async fn collect_signals<T: Transport>(
    client: &MarketClient<T>,
) -> Result<Vec<TokenSignal>, MarketError> {
    let tokens = client.signal_markets().await?;
    let mut signals = filter_signals(tokens);

    let handles = join_all(signals.iter().map(|signal| async move {
        match client.token_details(&signal.token.id).await {
            Ok(details) => details.twitter_username,
            Err(e) => {
                debug!(token_id = %signal.token.id, error = %e, "No details for signal token");
                None
            }
        }
    }))
    .await;

    for (signal, handle) in signals.iter_mut().zip(handles) {
        signal.twitter_username = handle;
    }

    Ok(signals)
}
