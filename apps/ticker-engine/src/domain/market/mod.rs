//! Market Key Resolution
//!
//! Canonicalizes instrument identifiers into the `QUOTE-BASE` form used as
//! the cache key (e.g. `"KRWBTC"`, `"krw-btc"`, `"KRW-BTC"` all resolve to
//! `KRW-BTC`), and generates candidate keys for fuzzy lookup when an exact
//! match misses.
//!
//! # Canonical form
//!
//! `QUOTE-BASE`, uppercase, `-` separator. The quote currency is the
//! currency the price is denominated in; the base is the asset being priced.
//! Normalization is idempotent: `normalize(normalize(s)) == normalize(s)`.

use serde::{Deserialize, Serialize};

/// Separator characters accepted in raw identifiers.
const SEPARATORS: [char; 3] = ['-', '/', '_'];

/// Canonical market identifier in `QUOTE-BASE` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketKey(String);

impl MarketKey {
    /// Normalize a raw instrument identifier into a canonical market key.
    ///
    /// Uppercases and strips whitespace. An existing separator (`-`, `/`,
    /// `_`) is kept and unified to `-`. Otherwise a 3-letter quote-currency
    /// prefix is split off the remaining base symbol (`KRWBTC` → `KRW-BTC`).
    /// If no split is possible the uppercased string is returned unchanged.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        if cleaned.contains(SEPARATORS) {
            return Self(cleaned.replace(['/', '_'], "-"));
        }

        if let Some((quote, base)) = split_quote_prefix(&cleaned) {
            return Self(format!("{quote}-{base}"));
        }

        Self(cleaned)
    }

    /// View the canonical key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The quote currency segment, when the key carries a separator.
    #[must_use]
    pub fn quote(&self) -> Option<&str> {
        self.0.split_once('-').map(|(quote, _)| quote)
    }

    /// The base symbol segment, when the key carries a separator.
    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.0.split_once('-').map(|(_, base)| base)
    }

    /// Candidate keys for a degraded fuzzy lookup, in priority order: the
    /// key itself, the key with separator removed, and lower-cased variants.
    ///
    /// Suffix matching against base symbols is a last resort handled by the
    /// cache, never by this list.
    #[must_use]
    pub fn fuzzy_keys(&self) -> Vec<Self> {
        let stripped = self.0.replace('-', "");
        let mut candidates = vec![
            Self(self.0.clone()),
            Self(stripped.clone()),
            Self(self.0.to_lowercase()),
            Self(stripped.to_lowercase()),
        ];
        candidates.dedup();
        candidates
    }
}

impl std::fmt::Display for MarketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketKey {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

/// Split a 3-letter quote-currency prefix off a separator-free symbol.
///
/// Accepts `^([A-Z]{3})([A-Z0-9]+)$` and returns `(quote, base)`.
fn split_quote_prefix(symbol: &str) -> Option<(&str, &str)> {
    if !symbol.is_ascii() || symbol.len() <= 3 {
        return None;
    }

    let (quote, base) = symbol.split_at(3);

    if quote.chars().all(|c| c.is_ascii_uppercase())
        && base.chars().all(|c| c.is_ascii_alphanumeric())
    {
        Some((quote, base))
    } else {
        None
    }
}

/// Market catalog entry supplied by the external catalog collaborator.
///
/// Read-only to the core; no freshness contract beyond "current at call
/// time".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    /// Canonical market key.
    pub market: MarketKey,
    /// Local (Korean) display name.
    pub korean_name: String,
    /// English display name.
    pub english_name: String,
}
