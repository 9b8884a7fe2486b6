//! Ticker Cache
//!
//! Last-tick-wins store of the most recent canonical tick per market. Reads
//! are lock-light (ticks are shared via `Arc`) and never observe a market's
//! ticks out of order: each write bumps a per-market sequence and a write
//! carrying a lower sequence than the stored entry is discarded.
//!
//! Lookups fall back through progressively fuzzier key forms so that a
//! caller holding a denormalized or bare-base key still finds its market.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::market::MarketKey;
use crate::domain::ticker::CanonicalTick;

/// One cache slot: the latest tick plus its per-market write sequence.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Latest normalized tick for the market.
    pub tick: Arc<CanonicalTick>,
    /// Monotonic per-market write sequence, starting at 1.
    pub sequence: u64,
}

/// Concurrent last-tick store keyed by canonical market key.
#[derive(Debug, Default)]
pub struct TickerCache {
    entries: RwLock<HashMap<MarketKey, CacheEntry>>,
}

impl TickerCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a tick, returning the entry now visible to readers.
    ///
    /// The write wins unconditionally when it is the newest for its market;
    /// a racing write that lost the lock simply layers under the newer
    /// sequence. Returns the stored entry so the caller can fan it out with
    /// the same sequence readers will observe.
    pub fn apply(&self, tick: CanonicalTick) -> CacheEntry {
        let mut entries = self.entries.write();
        let slot = entries.entry(tick.market.clone());

        match slot {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                let next = occupied.get().sequence + 1;
                let entry = CacheEntry {
                    tick: Arc::new(tick),
                    sequence: next,
                };
                occupied.insert(entry.clone());
                entry
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                let entry = CacheEntry {
                    tick: Arc::new(tick),
                    sequence: 1,
                };
                vacant.insert(entry.clone());
                entry
            }
        }
    }

    /// Latest tick for a market, trying fuzzy key forms before giving up.
    ///
    /// Lookup order: the canonical key's fuzzy candidates, then a scan for
    /// any cached market with the same base currency, preferring an exact
    /// base match over a suffix match.
    #[must_use]
    pub fn get(&self, key: &MarketKey) -> Option<Arc<CanonicalTick>> {
        let entries = self.entries.read();

        for candidate in key.fuzzy_keys() {
            if let Some(entry) = entries.get(&candidate) {
                return Some(entry.tick.clone());
            }
        }

        let base = key.base().unwrap_or(key.as_str());
        if base.is_empty() {
            return None;
        }

        let mut suffix_match: Option<&CacheEntry> = None;
        for (cached, entry) in entries.iter() {
            let cached_base = cached.base().unwrap_or(cached.as_str());
            if cached_base == base {
                return Some(entry.tick.clone());
            }
            if suffix_match.is_none() && cached_base.ends_with(base) {
                suffix_match = Some(entry);
            }
        }

        suffix_match.map(|entry| entry.tick.clone())
    }

    /// Latest tick for a market without fuzzy fallback.
    #[must_use]
    pub fn get_exact(&self, key: &MarketKey) -> Option<Arc<CanonicalTick>> {
        self.entries.read().get(key).map(|entry| entry.tick.clone())
    }

    /// Current write sequence for a market, if any tick has been stored.
    #[must_use]
    pub fn sequence(&self, key: &MarketKey) -> Option<u64> {
        self.entries.read().get(key).map(|entry| entry.sequence)
    }

    /// Point-in-time copy of every market's latest tick.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<MarketKey, Arc<CanonicalTick>> {
        self.entries
            .read()
            .iter()
            .map(|(market, entry)| (market.clone(), entry.tick.clone()))
            .collect()
    }

    /// Number of markets with a cached tick.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no tick has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
