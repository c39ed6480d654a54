//! Background refresh system
//!
//! Re-polls the market listing for token signals, or a single token's price,
//! on an interval in the background, using tokio channels to communicate
//! updates to the caller.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::Transport;
use crate::calculator::{PriceAlert, PriceTracker};
use crate::data::MarketClient;
use crate::signal::{collect_signals, TokenSignal};

/// Messages sent from background refresh to the caller
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// Signals recomputed from a fresh listing
    SignalsUpdated(Vec<TokenSignal>),
    /// New price for a watched token, with an alert on a sharp rise
    PriceUpdated {
        token_id: String,
        price: Option<f64>,
        alert: Option<PriceAlert>,
    },
    /// An error occurred during refresh
    RefreshError(String),
    /// Refresh started
    RefreshStarted,
    /// Refresh completed
    RefreshCompleted,
}

/// Configuration for refresh intervals
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between signal refreshes
    pub signal_interval: Duration,
    /// Interval between price polls; must exceed the cache TTL plus the
    /// request delay for each poll to reach the network
    pub price_interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            signal_interval: Duration::from_secs(300), // 5 minutes
            price_interval: Duration::from_secs(180),  // 3 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh system
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Creates a new RefreshHandle and spawns the background refresh task
    ///
    /// The first refresh runs immediately, then once per `signal_interval`.
    ///
    /// # Arguments
    /// * `config` - Configuration for refresh intervals
    /// * `client` - Market client whose cache the refreshes go through
    ///
    /// # Returns
    /// A RefreshHandle that receives updates via the `receiver` channel
    pub fn spawn<T: Transport + 'static>(config: RefreshConfig, client: MarketClient<T>) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            let signal_interval = config.signal_interval;
            let tx = msg_tx;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(signal_interval);

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            debug!("Refreshing signals");
                            let _ = tx.send(RefreshMessage::RefreshStarted).await;

                            let message = match collect_signals(&client).await {
                                Ok(signals) => RefreshMessage::SignalsUpdated(signals),
                                Err(e) => {
                                    warn!(error = %e, "Signal refresh failed");
                                    RefreshMessage::RefreshError(e.to_string())
                                }
                            };
                            let _ = tx.send(message).await;

                            if tx.send(RefreshMessage::RefreshCompleted).await.is_err() {
                                // Receiver dropped
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Spawns a background task that polls the price of one token
    ///
    /// Every poll sends a `PriceUpdated` message. Successive prices go
    /// through a [`PriceTracker`], so the first rise of at least 10% between
    /// two polls carries an alert. A failed lookup sends a `None` price and
    /// does not reset the tracker.
    pub fn spawn_price_watch<T: Transport + 'static>(
        config: RefreshConfig,
        client: MarketClient<T>,
        token_id: String,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            let price_interval = config.price_interval;
            let tx = msg_tx;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(price_interval);
                let mut tracker = PriceTracker::new();

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            debug!(token_id = %token_id, "Refreshing price");
                            let _ = tx.send(RefreshMessage::RefreshStarted).await;

                            let price = client.token_price(&token_id).await;
                            let alert = price.and_then(|price| tracker.observe(price));
                            if let Some(ref alert) = alert {
                                info!(
                                    token_id = %token_id,
                                    change_percent = alert.change_percent,
                                    "Price alert"
                                );
                            }

                            let _ = tx
                                .send(RefreshMessage::PriceUpdated {
                                    token_id: token_id.clone(),
                                    price,
                                    alert,
                                })
                                .await;

                            if tx.send(RefreshMessage::RefreshCompleted).await.is_err() {
                                // Receiver dropped
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Waits for the next refresh message
    ///
    /// Returns `None` once the background task has stopped.
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Shuts down the background refresh task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for pending refresh messages without blocking
///
/// # Arguments
/// * `handle` - The RefreshHandle to check
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
