//! Per-Market Fan-Out
//!
//! Distributes cached tick updates to in-process consumers using one tokio
//! broadcast channel per market. Channels are created lazily on the first
//! subscribe and reaped once their last receiver is gone, so a market nobody
//! watches costs nothing on the publish path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::domain::market::MarketKey;
use crate::domain::ticker::CanonicalTick;
use crate::infrastructure::cache::CacheEntry;

/// One fan-out message: a cached tick plus its cache write sequence.
///
/// The sequence matches what [`TickerCache`] readers observe, so a consumer
/// can reconcile a live update against a snapshot taken earlier.
///
/// [`TickerCache`]: crate::infrastructure::cache::TickerCache
#[derive(Debug, Clone)]
pub struct TickerUpdate {
    /// Canonical market key.
    pub market: MarketKey,
    /// The cached tick.
    pub tick: Arc<CanonicalTick>,
    /// Per-market cache write sequence.
    pub sequence: u64,
}

/// Fan-out hub configuration.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Buffered updates per market channel before slow receivers lag.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Per-market broadcast hub.
#[derive(Debug)]
pub struct TickerHub {
    config: HubConfig,
    channels: RwLock<HashMap<MarketKey, broadcast::Sender<TickerUpdate>>>,
}

impl TickerHub {
    /// Create a hub with the given configuration.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Create a hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HubConfig::default())
    }

    /// Subscribe to updates for one market.
    ///
    /// The key is canonicalized first, so raw and canonical forms of the
    /// same market land on the same channel.
    #[must_use]
    pub fn subscribe(&self, market: &str) -> broadcast::Receiver<TickerUpdate> {
        let key = MarketKey::normalize(market);
        let mut channels = self.channels.write();

        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.config.channel_capacity).0)
            .subscribe()
    }

    /// Publish a cache entry to the market's subscribers.
    ///
    /// Returns the number of receivers reached. A market without a channel
    /// or without live receivers is a no-op; a channel whose last receiver
    /// has gone is reaped on the way out.
    pub fn publish(&self, entry: &CacheEntry) -> usize {
        let market = entry.tick.market.clone();

        let delivered = {
            let channels = self.channels.read();
            let Some(sender) = channels.get(&market) else {
                return 0;
            };

            if sender.receiver_count() == 0 {
                None
            } else {
                sender
                    .send(TickerUpdate {
                        market: market.clone(),
                        tick: entry.tick.clone(),
                        sequence: entry.sequence,
                    })
                    .ok()
            }
        };

        match delivered {
            Some(count) => count,
            None => {
                self.reap(&market);
                0
            }
        }
    }

    /// Number of live receivers for a market.
    #[must_use]
    pub fn receiver_count(&self, market: &str) -> usize {
        let key = MarketKey::normalize(market);
        self.channels
            .read()
            .get(&key)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of markets with a live channel.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Drop the channel for a market if it has no receivers left.
    fn reap(&self, market: &MarketKey) {
        let mut channels = self.channels.write();
        if let Some(sender) = channels.get(market)
            && sender.receiver_count() == 0
        {
            channels.remove(market);
        }
    }
}

impl Default for TickerHub {
    fn default() -> Self {
        Self::with_defaults()
    }
}
