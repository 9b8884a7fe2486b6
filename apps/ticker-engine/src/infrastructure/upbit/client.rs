//! Upbit Ticker WebSocket Client
//!
//! Maintains the single upstream connection to the exchange ticker stream.
//! The client owns the connection lifecycle: subscribing after connect,
//! keep-alive pings, reconnection with capped backoff, and re-issuing the
//! subscription set after every reconnect.
//!
//! # Protocol
//!
//! A subscription is one text frame holding a JSON array: a ticket object
//! followed by a type object listing the market codes, e.g.
//! `[{"ticket":"..."},{"type":"ticker","codes":["KRW-BTC"]}]`. Tick
//! messages arrive as JSON in text or binary frames.
//!
//! # Failure isolation
//!
//! A frame that fails to normalize is logged and dropped; it never tears
//! down the connection or disturbs other markets.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::codec::TickerCodec;
use super::heartbeat::{KeepAlive, KeepAliveConfig, KeepAliveSignal, LinkHealth};
use super::reconnect::{Backoff, BackoffConfig};
use crate::domain::market::MarketKey;
use crate::domain::ticker::CanonicalTick;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors from the feed client.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Feed Events
// =============================================================================

/// Events emitted by the feed client to the ingest pipeline.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Connected and subscribed.
    Connected,
    /// Connection lost.
    Disconnected,
    /// Waiting to reconnect.
    Reconnecting {
        /// Reconnect attempt number since the last successful connect.
        attempt: u32,
    },
    /// One normalized tick.
    Tick(CanonicalTick),
}

// =============================================================================
// Configuration
// =============================================================================

/// Feed client configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL of the ticker stream.
    pub url: String,
    /// Quote currency for which 24h trade value is retained.
    pub domestic_quote: String,
    /// Reconnect backoff tuning.
    pub backoff: BackoffConfig,
    /// Keep-alive tuning.
    pub keep_alive: KeepAliveConfig,
}

impl FeedConfig {
    /// Configuration with default backoff and keep-alive tuning.
    #[must_use]
    pub fn new(url: impl Into<String>, domestic_quote: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            domestic_quote: domestic_quote.into(),
            backoff: BackoffConfig::default(),
            keep_alive: KeepAliveConfig::default(),
        }
    }
}

// =============================================================================
// Ticker Client
// =============================================================================

/// WebSocket client for the exchange ticker stream.
///
/// One instance serves the whole process. Subscription changes made while
/// connected are pushed to the server live; the full set is replayed after
/// every reconnect.
pub struct TickerClient {
    config: FeedConfig,
    codec: TickerCodec,
    event_tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
    subscriptions: parking_lot::RwLock<BTreeSet<MarketKey>>,
    resubscribe: Notify,
}

impl TickerClient {
    /// Create a feed client.
    #[must_use]
    pub fn new(
        config: FeedConfig,
        event_tx: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let codec = TickerCodec::new(config.domestic_quote.clone());
        Self {
            config,
            codec,
            event_tx,
            cancel,
            subscriptions: parking_lot::RwLock::new(BTreeSet::new()),
            resubscribe: Notify::new(),
        }
    }

    /// Add markets to the subscription set.
    ///
    /// Keys are canonicalized; already-subscribed markets are no-ops. When a
    /// connection is live the updated set is sent to the server.
    pub fn subscribe<I>(&self, markets: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut changed = false;
        let count;
        {
            let mut subs = self.subscriptions.write();
            for market in markets {
                changed |= subs.insert(MarketKey::normalize(market.as_ref()));
            }
            count = subs.len();
        }

        if changed {
            #[allow(clippy::cast_precision_loss)]
            metrics::set_subscribed_markets(count as f64);
            self.resubscribe.notify_one();
        }
    }

    /// Remove markets from the subscription set.
    pub fn unsubscribe<I>(&self, markets: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut changed = false;
        let count;
        {
            let mut subs = self.subscriptions.write();
            for market in markets {
                changed |= subs.remove(&MarketKey::normalize(market.as_ref()));
            }
            count = subs.len();
        }

        if changed {
            #[allow(clippy::cast_precision_loss)]
            metrics::set_subscribed_markets(count as f64);
            self.resubscribe.notify_one();
        }
    }

    /// Currently subscribed markets, sorted.
    #[must_use]
    pub fn subscribed_markets(&self) -> Vec<MarketKey> {
        self.subscriptions.read().iter().cloned().collect()
    }

    /// Run the connection loop until cancelled.
    ///
    /// Reconnects with backoff on every failure; the backoff resets after
    /// each successful connect.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; the signature leaves room for
    /// unrecoverable configuration failures.
    pub async fn run(self: Arc<Self>) -> Result<(), FeedError> {
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("feed client cancelled");
                return Ok(());
            }

            match self.connect_and_run(&mut backoff).await {
                Ok(()) => {
                    tracing::info!("feed connection closed gracefully");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "feed connection error");
                    metrics::record_disconnect();
                    let _ = self.event_tx.send(FeedEvent::Disconnected).await;

                    let delay = backoff.next_delay();
                    let attempt = backoff.attempt();
                    tracing::info!(attempt, delay_ms = delay.as_millis(), "reconnecting to feed");
                    metrics::record_reconnect_attempt();
                    let _ = self.event_tx.send(FeedEvent::Reconnecting { attempt }).await;

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("feed client cancelled during reconnect delay");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect, subscribe, and process frames until failure or cancellation.
    async fn connect_and_run(&self, backoff: &mut Backoff) -> Result<(), FeedError> {
        tracing::info!(url = %self.config.url, "connecting to ticker feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        backoff.reset();

        if let Some(frame) = self.subscription_frame() {
            write.send(Message::Text(frame.into())).await?;
        }
        let _ = self.event_tx.send(FeedEvent::Connected).await;

        let health = Arc::new(LinkHealth::new());
        let (signal_tx, mut signal_rx) = mpsc::channel::<KeepAliveSignal>(8);
        let keep_alive_cancel = CancellationToken::new();
        let keep_alive = KeepAlive::new(
            self.config.keep_alive.clone(),
            health.clone(),
            signal_tx,
            keep_alive_cancel.clone(),
        );
        let _keep_alive_handle = tokio::spawn(keep_alive.run());

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    keep_alive_cancel.cancel();
                    return Ok(());
                }
                () = self.resubscribe.notified() => {
                    if let Some(frame) = self.subscription_frame() {
                        tracing::debug!("subscription set changed, re-subscribing");
                        write.send(Message::Text(frame.into())).await?;
                    }
                }
                signal = signal_rx.recv() => {
                    match signal {
                        Some(KeepAliveSignal::Ping) => {
                            health.ping_sent();
                            write.send(Message::Ping(vec![].into())).await?;
                        }
                        Some(KeepAliveSignal::LinkDead) => {
                            keep_alive_cancel.cancel();
                            return Err(FeedError::ConnectionClosed);
                        }
                        None => {
                            tracing::debug!("keep-alive channel closed");
                        }
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            health.pong_received();
                            self.ingest_frame(self.codec.normalize_text(&text)).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            health.pong_received();
                            self.ingest_frame(self.codec.normalize_slice(&data)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            health.pong_received();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("server sent close frame");
                            keep_alive_cancel.cancel();
                            return Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            keep_alive_cancel.cancel();
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            keep_alive_cancel.cancel();
                            return Err(FeedError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Forward a normalized tick, or drop a malformed frame with a warning.
    async fn ingest_frame(&self, result: Result<CanonicalTick, super::codec::CodecError>) {
        match result {
            Ok(tick) => {
                metrics::record_tick_normalized();
                let _ = self.event_tx.send(FeedEvent::Tick(tick)).await;
            }
            Err(e) => {
                metrics::record_frame_dropped();
                tracing::warn!(error = %e, "dropping malformed feed frame");
            }
        }
    }

    /// Build the subscription frame for the current set, if non-empty.
    fn subscription_frame(&self) -> Option<String> {
        let codes: Vec<String> = self
            .subscriptions
            .read()
            .iter()
            .map(|market| market.as_str().to_owned())
            .collect();

        if codes.is_empty() {
            return None;
        }

        let frame = serde_json::json!([
            {"ticket": Uuid::new_v4().to_string()},
            {"type": "ticker", "codes": codes},
        ]);
        Some(frame.to_string())
    }
}
