//! Position Valuation
//!
//! Pure derivation of per-holding financial metrics (evaluation amount,
//! profit, profit rate) from a held position and the latest canonical tick.
//! Valuations are recomputed on every read and never persisted.
//!
//! # Source precedence
//!
//! The richest available source wins: a populated server-supplied valuation
//! is used as-is, otherwise the metrics are computed from the latest tick,
//! otherwise the buy amount plus any partially-known profit figure is used.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::market::MarketKey;
use crate::domain::ticker::CanonicalTick;

/// One hundred, for percentage conversion.
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// A held position, owned by the external holdings collaborator.
///
/// Read-only to the core; consumed as a snapshot passed in by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldPosition {
    /// Canonical market key of the held asset.
    pub market: MarketKey,
    /// Held quantity, non-negative.
    pub quantity: Decimal,
    /// Average buy price, non-negative.
    pub avg_buy_price: Decimal,
    /// Total buy amount (cost basis), non-negative.
    pub buy_amount: Decimal,
}

/// Derived valuation metrics for one holding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Valuation {
    /// Current value of the held quantity at the latest known price.
    pub eval_amount: Decimal,
    /// Eval amount minus cost basis.
    pub profit: Decimal,
    /// Profit as a percentage of the buy amount.
    pub profit_rate: Decimal,
}

impl Valuation {
    /// Whether this valuation carries a usable evaluation amount.
    ///
    /// A record with a zero eval amount is treated as absent and falls
    /// through to the next valuation source; its profit figure may still be
    /// consumed by the final fallback.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        !self.eval_amount.is_zero()
    }
}

/// Compute the valuation for a position.
///
/// Fallback precedence, highest first:
///
/// 1. a populated `server_valuation` supplied by the holdings collaborator
///    is used as-is;
/// 2. otherwise, with a tick available:
///    `eval_amount = round(quantity * price)`,
///    `profit = round(quantity * (price - avg_buy_price))`,
///    `profit_rate = profit / buy_amount * 100` (0 when `buy_amount` is 0);
/// 3. otherwise `eval_amount = buy_amount + profit`, using any
///    partially-known profit figure, or zero.
#[must_use]
pub fn compute(
    position: &HeldPosition,
    tick: Option<&CanonicalTick>,
    server_valuation: Option<&Valuation>,
) -> Valuation {
    if let Some(server) = server_valuation
        && server.is_populated()
    {
        return *server;
    }

    if let Some(tick) = tick {
        let eval_amount = round_amount(position.quantity * tick.price);
        let profit = round_amount(position.quantity * (tick.price - position.avg_buy_price));

        return Valuation {
            eval_amount,
            profit,
            profit_rate: profit_rate(profit, position.buy_amount),
        };
    }

    let profit = server_valuation.map_or(Decimal::ZERO, |server| server.profit);

    Valuation {
        eval_amount: position.buy_amount + profit,
        profit,
        profit_rate: profit_rate(profit, position.buy_amount),
    }
}

/// Profit as a percentage of the buy amount, guarded against a zero basis.
fn profit_rate(profit: Decimal, buy_amount: Decimal) -> Decimal {
    if buy_amount > Decimal::ZERO {
        profit / buy_amount * HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Round a monetary amount to a whole unit, halves away from zero.
fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn position(quantity: &str, avg_buy_price: &str, buy_amount: &str) -> HeldPosition {
        HeldPosition {
            market: MarketKey::normalize("KRW-BTC"),
            quantity: dec(quantity),
            avg_buy_price: dec(avg_buy_price),
            buy_amount: dec(buy_amount),
        }
    }

    fn tick(price: &str) -> CanonicalTick {
        CanonicalTick {
            market: MarketKey::normalize("KRW-BTC"),
            price: dec(price),
            prev_close: None,
            signed_change: None,
            change_rate_pct: None,
            acc_trade_value_24h: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn computes_from_tick() {
        let position = position("0.5", "50000000", "25000000");
        let tick = tick("60000000");

        let valuation = compute(&position, Some(&tick), None);

        assert_eq!(valuation.eval_amount, dec("30000000"));
        assert_eq!(valuation.profit, dec("5000000"));
        assert_eq!(valuation.profit_rate, dec("20"));
    }

    #[test]
    fn rounds_eval_amount_and_profit() {
        let position = position("0.333", "1000", "333");
        let tick = tick("1001.5");

        let valuation = compute(&position, Some(&tick), None);

        // 0.333 * 1001.5 = 333.4995, 0.333 * 1.5 = 0.4995
        assert_eq!(valuation.eval_amount, dec("333"));
        assert_eq!(valuation.profit, dec("0"));
    }

    #[test]
    fn server_valuation_takes_precedence() {
        let position = position("1", "100", "100");
        let tick = tick("200");
        let server = Valuation {
            eval_amount: dec("150"),
            profit: dec("50"),
            profit_rate: dec("50"),
        };

        let valuation = compute(&position, Some(&tick), Some(&server));

        assert_eq!(valuation, server);
    }

    #[test]
    fn empty_server_valuation_falls_through_to_tick() {
        let position = position("1", "100", "100");
        let tick = tick("200");
        let server = Valuation::default();

        let valuation = compute(&position, Some(&tick), Some(&server));

        assert_eq!(valuation.eval_amount, dec("200"));
        assert_eq!(valuation.profit, dec("100"));
    }

    #[test]
    fn falls_back_to_buy_amount_without_tick() {
        let position = position("1", "100", "100");

        let valuation = compute(&position, None, None);

        assert_eq!(valuation.eval_amount, dec("100"));
        assert_eq!(valuation.profit, Decimal::ZERO);
        assert_eq!(valuation.profit_rate, Decimal::ZERO);
    }

    #[test]
    fn fallback_uses_partial_profit_figure() {
        let position = position("1", "100", "100");
        // Profit known but eval amount missing: the record is not populated,
        // yet its profit figure feeds the buy-amount fallback.
        let server = Valuation {
            eval_amount: Decimal::ZERO,
            profit: dec("-50"),
            profit_rate: Decimal::ZERO,
        };

        let valuation = compute(&position, None, Some(&server));

        assert_eq!(valuation.eval_amount, dec("50"));
        assert_eq!(valuation.profit, dec("-50"));
        assert_eq!(valuation.profit_rate, dec("-50"));
    }

    #[test]
    fn zero_buy_amount_guards_profit_rate() {
        let position = position("1", "0", "0");
        let tick = tick("500");

        let valuation = compute(&position, Some(&tick), None);

        assert_eq!(valuation.eval_amount, dec("500"));
        assert_eq!(valuation.profit, dec("500"));
        assert_eq!(valuation.profit_rate, Decimal::ZERO);
    }

    #[test]
    fn negative_profit_with_zero_buy_amount_still_guarded() {
        let position = position("1", "500", "0");
        let tick = tick("100");

        let valuation = compute(&position, Some(&tick), None);

        assert_eq!(valuation.profit, dec("-400"));
        assert_eq!(valuation.profit_rate, Decimal::ZERO);
    }
}
