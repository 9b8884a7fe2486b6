//! Application Services
//!
//! Wires the feed client to the cache and fan-out hub, and exposes the
//! read-side facade consumers use: latest-tick lookup, live update
//! subscriptions, and position valuation against cached prices.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::domain::market::MarketKey;
use crate::domain::ticker::CanonicalTick;
use crate::domain::valuation::{self, HeldPosition, Valuation};
use crate::infrastructure::broadcast::{TickerHub, TickerUpdate};
use crate::infrastructure::cache::TickerCache;
use crate::infrastructure::metrics;
use crate::infrastructure::upbit::FeedEvent;

// =============================================================================
// Feed Status
// =============================================================================

/// Connection state of the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connected and subscribed.
    Connected,
    /// Waiting out a backoff delay.
    Reconnecting,
}

impl ConnectionState {
    /// Lowercase name for health reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Shared feed status observed by the health endpoint.
#[derive(Debug, Default)]
pub struct FeedStatus {
    state: RwLock<ConnectionState>,
    ticks_received: AtomicU64,
    reconnect_attempts: AtomicU32,
    last_tick_at: RwLock<Option<DateTime<Utc>>>,
}

impl FeedStatus {
    /// Fresh status, disconnected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Update the connection state.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Whether the feed is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Record one normalized tick.
    pub fn record_tick(&self, at: DateTime<Utc>) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
        *self.last_tick_at.write() = Some(at);
    }

    /// Total ticks received since startup.
    #[must_use]
    pub fn ticks_received(&self) -> u64 {
        self.ticks_received.load(Ordering::Relaxed)
    }

    /// Reconnect attempts since the last successful connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Update the reconnect attempt counter.
    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::Relaxed);
    }

    /// Time of the most recent tick.
    #[must_use]
    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        *self.last_tick_at.read()
    }
}

// =============================================================================
// Ticker Service
// =============================================================================

/// One valued holding.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionValuation {
    /// The held position.
    pub position: HeldPosition,
    /// Its derived valuation.
    pub valuation: Valuation,
}

/// Totals across a set of valued holdings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortfolioSummary {
    /// Total cost basis.
    pub buy_amount: Decimal,
    /// Total current value.
    pub eval_amount: Decimal,
    /// Total profit.
    pub profit: Decimal,
    /// Profit as a percentage of the cost basis, zero when the basis is.
    pub profit_rate: Decimal,
}

impl PortfolioSummary {
    /// Sum a set of valued holdings.
    #[must_use]
    pub fn from_valuations(valuations: &[PositionValuation]) -> Self {
        let buy_amount: Decimal = valuations.iter().map(|v| v.position.buy_amount).sum();
        let eval_amount: Decimal = valuations.iter().map(|v| v.valuation.eval_amount).sum();
        let profit = eval_amount - buy_amount;
        let profit_rate = if buy_amount > Decimal::ZERO {
            profit / buy_amount * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Self {
            buy_amount,
            eval_amount,
            profit,
            profit_rate,
        }
    }
}

/// Read-side facade over the cache and fan-out hub.
#[derive(Debug)]
pub struct TickerService {
    cache: Arc<TickerCache>,
    hub: Arc<TickerHub>,
    status: Arc<FeedStatus>,
}

impl TickerService {
    /// Create the service over shared pipeline components.
    #[must_use]
    pub const fn new(cache: Arc<TickerCache>, hub: Arc<TickerHub>, status: Arc<FeedStatus>) -> Self {
        Self { cache, hub, status }
    }

    /// Latest cached tick for a market, accepting raw key forms.
    #[must_use]
    pub fn latest(&self, market: &str) -> Option<Arc<CanonicalTick>> {
        self.cache.get(&MarketKey::normalize(market))
    }

    /// Point-in-time copy of every cached tick.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<MarketKey, Arc<CanonicalTick>> {
        self.cache.snapshot()
    }

    /// Subscribe to live updates for one market.
    #[must_use]
    pub fn watch(&self, market: &str) -> broadcast::Receiver<TickerUpdate> {
        self.hub.subscribe(market)
    }

    /// Feed connection status.
    #[must_use]
    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    /// Number of markets with a cached tick.
    #[must_use]
    pub fn cached_markets(&self) -> usize {
        self.cache.len()
    }

    /// Value one position against the latest cached tick.
    ///
    /// `server_valuation` is the holdings collaborator's own figure, used
    /// when populated.
    #[must_use]
    pub fn value_position(
        &self,
        position: &HeldPosition,
        server_valuation: Option<&Valuation>,
    ) -> Valuation {
        let tick = self.cache.get(&position.market);
        valuation::compute(position, tick.as_deref(), server_valuation)
    }

    /// Value a set of positions, pairing each with any server-supplied
    /// valuation keyed by market.
    #[must_use]
    pub fn value_positions(
        &self,
        positions: &[HeldPosition],
        server_valuations: &HashMap<MarketKey, Valuation>,
    ) -> Vec<PositionValuation> {
        positions
            .iter()
            .map(|position| {
                let server = server_valuations.get(&position.market);
                PositionValuation {
                    position: position.clone(),
                    valuation: self.value_position(position, server),
                }
            })
            .collect()
    }
}

// =============================================================================
// Feed Pipeline
// =============================================================================

/// Drive feed events into the cache and fan-out hub until cancelled or the
/// event channel closes.
pub async fn run_feed_pipeline(
    mut events: mpsc::Receiver<FeedEvent>,
    cache: Arc<TickerCache>,
    hub: Arc<TickerHub>,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("feed pipeline cancelled");
                return;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("feed event channel closed, stopping pipeline");
                    return;
                };
                handle_event(event, &cache, &hub, &status);
            }
        }
    }
}

fn handle_event(event: FeedEvent, cache: &TickerCache, hub: &TickerHub, status: &FeedStatus) {
    match event {
        FeedEvent::Connected => {
            status.set_state(ConnectionState::Connected);
            status.set_reconnect_attempts(0);
            metrics::set_feed_connected(true);
        }
        FeedEvent::Disconnected => {
            status.set_state(ConnectionState::Disconnected);
            metrics::set_feed_connected(false);
        }
        FeedEvent::Reconnecting { attempt } => {
            status.set_state(ConnectionState::Reconnecting);
            status.set_reconnect_attempts(attempt);
        }
        FeedEvent::Tick(tick) => {
            status.record_tick(tick.received_at);
            let entry = cache.apply(tick);
            let delivered = hub.publish(&entry);
            metrics::record_updates_delivered(delivered as u64);

            let latency = (Utc::now() - entry.tick.received_at)
                .to_std()
                .unwrap_or_default();
            metrics::record_ingest_latency(latency.as_secs_f64());

            #[allow(clippy::cast_precision_loss)]
            metrics::set_cached_markets(cache.len() as f64);
        }
    }
}
