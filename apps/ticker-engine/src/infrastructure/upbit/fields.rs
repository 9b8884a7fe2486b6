//! Feed Field Alias Tables
//!
//! The exchange feed is duck-typed: the same logical field arrives under
//! snake_case exchange names, camelCase names, or the abbreviated SIMPLE
//! format, depending on the message path. Each canonical field maps to an
//! ordered alias list consulted front to back, so the extraction priority
//! is auditable here rather than buried in parsing code.

/// Instrument identifier aliases (market code, symbol, product code).
pub const MARKET: &[&str] = &["market", "code", "cd", "symbol", "product_code", "productCode"];

/// Last trade price aliases, in priority order: trade price, last price,
/// close.
pub const TRADE_PRICE: &[&str] = &[
    "trade_price",
    "tradePrice",
    "tp",
    "last_price",
    "lastPrice",
    "close",
    "closing_price",
    "closingPrice",
    "price",
];

/// Previous closing price aliases.
pub const PREV_CLOSE: &[&str] = &[
    "prev_closing_price",
    "prevClosingPrice",
    "pcp",
    "prev_close",
    "prevClose",
    "previous_close",
    "previousClose",
];

/// String-valued fields that may carry a directional marker
/// (rise/up/plus/buy or fall/down/minus/sell).
pub const DIRECTION: &[&str] = &[
    "change",
    "c",
    "change_type",
    "changeType",
    "ask_bid",
    "askBid",
    "direction",
];

/// Signed price-change aliases; the sign is trusted as-is.
pub const SIGNED_CHANGE: &[&str] = &["signed_change_price", "signedChangePrice", "scp"];

/// Absolute price-change aliases; the directional marker supplies the sign.
pub const ABS_CHANGE: &[&str] = &[
    "change_price",
    "changePrice",
    "cp",
    "change_amount",
    "changeAmount",
];

/// Change-rate aliases; values below 1 in magnitude are fractions.
pub const CHANGE_RATE: &[&str] = &[
    "signed_change_rate",
    "signedChangeRate",
    "scr",
    "change_rate",
    "changeRate",
    "cr",
];

/// Inner raw-payload wrapper fields, unwrapped one level only.
pub const INNER_RAW: &[&str] = &["raw", "_raw"];

/// Whether a field name carries an accumulated 24h trade value.
///
/// Matches the accumulated/trade/value-or-price naming pattern plus the
/// SIMPLE-format `atp24h` abbreviation.
#[must_use]
pub fn is_acc_trade_value_field(name: &str) -> bool {
    let lower = name.to_lowercase();

    if lower == "atp24h" {
        return true;
    }

    lower.contains("acc")
        && lower.contains("trade")
        && (lower.contains("price") || lower.contains("value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_price_priority_starts_with_trade_price() {
        assert_eq!(TRADE_PRICE[0], "trade_price");
        assert_eq!(TRADE_PRICE[1], "tradePrice");
    }

    #[test]
    fn acc_trade_value_field_patterns() {
        assert!(is_acc_trade_value_field("acc_trade_price_24h"));
        assert!(is_acc_trade_value_field("accTradeValue24h"));
        assert!(is_acc_trade_value_field("atp24h"));
        assert!(!is_acc_trade_value_field("acc_trade_volume_24h"));
        assert!(!is_acc_trade_value_field("trade_price"));
    }
}
