//! Canonical Tick Types
//!
//! The normalized, alias-resolved representation of one point-in-time price
//! observation for a market. Instances are produced by the feed codec and
//! handed straight to the ticker cache; they are never persisted.
//!
//! # Sign convention
//!
//! `signed_change` is `prev_close - price` whenever both are known: a price
//! *rise* yields a *negative* value. Display layers invert the sign via
//! [`CanonicalTick::display_change`]; the inversion lives at the display
//! boundary only, never inside the core.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::MarketKey;

/// Directional hint extracted from string-valued change fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeDirection {
    /// Price moved up (rise/up/plus/buy markers).
    Up,
    /// Price moved down (fall/down/minus/sell markers).
    Down,
    /// No usable marker found.
    #[default]
    Unknown,
}

impl ChangeDirection {
    /// Classify a raw string marker.
    #[must_use]
    pub fn from_marker(marker: &str) -> Self {
        let lower = marker.to_lowercase();

        if ["rise", "up", "plus", "buy"].iter().any(|m| lower.contains(m)) {
            Self::Up
        } else if ["fall", "down", "minus", "sell"]
            .iter()
            .any(|m| lower.contains(m))
        {
            Self::Down
        } else {
            Self::Unknown
        }
    }

    /// Apply the hint's sign to an absolute magnitude.
    ///
    /// Unknown defaults to positive.
    #[must_use]
    pub fn signed(self, magnitude: Decimal) -> Decimal {
        match self {
            Self::Down => -magnitude,
            Self::Up | Self::Unknown => magnitude,
        }
    }
}

/// One normalized price observation for a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTick {
    /// Canonical market key.
    pub market: MarketKey,
    /// Last trade price, non-negative.
    pub price: Decimal,
    /// Previous closing price, when the feed carried one.
    pub prev_close: Option<Decimal>,
    /// `prev_close - price` when derivable (negative on a price rise),
    /// otherwise the feed's own signed or hinted change figure.
    pub signed_change: Option<Decimal>,
    /// Change rate as a percentage (`1.69` means 1.69%).
    pub change_rate_pct: Option<Decimal>,
    /// Accumulated 24h trade value; populated only for markets quoted in
    /// the designated domestic currency.
    pub acc_trade_value_24h: Option<Decimal>,
    /// Time the message was normalized.
    pub received_at: DateTime<Utc>,
}

impl CanonicalTick {
    /// Display-facing change value: the negation of [`signed_change`].
    ///
    /// A price rise of 1,000,000 is stored as `-1000000` and displayed as
    /// `+1000000`.
    ///
    /// [`signed_change`]: Self::signed_change
    #[must_use]
    pub fn display_change(&self) -> Option<Decimal> {
        self.signed_change.map(|change| -change)
    }
}
