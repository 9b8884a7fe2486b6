//! Ticker Payload Normalizer
//!
//! Converts one raw tick message (a JSON object, a JSON-encoded string, or
//! a string with a framing marker ahead of the JSON body) into one
//! [`CanonicalTick`]. Field extraction runs over the ordered alias tables in
//! [`fields`](super::fields), so messages in any of the feed's naming
//! conventions normalize to identical records.
//!
//! Failure to resolve a market key or price is a soft failure: the message
//! is dropped and the cache entry for that market is left unchanged.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::fields;
use crate::domain::market::MarketKey;
use crate::domain::ticker::{CanonicalTick, ChangeDirection};

/// One hundred, for fraction-to-percent conversion.
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Codec errors. All variants are soft failures for the ingest loop.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// No well-formed JSON object could be located in the payload.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// No instrument identifier could be resolved.
    #[error("no market key in payload")]
    MissingMarket,

    /// No usable (non-negative numeric) price field was present.
    #[error("no usable price in payload")]
    MissingPrice,
}

/// Normalizes raw feed payloads into canonical ticks.
#[derive(Debug, Clone)]
pub struct TickerCodec {
    domestic_quote: String,
}

impl TickerCodec {
    /// Create a codec with the designated domestic quote currency.
    ///
    /// The accumulated 24h trade value is only populated for markets quoted
    /// in this currency.
    #[must_use]
    pub fn new(domestic_quote: impl Into<String>) -> Self {
        Self {
            domestic_quote: domestic_quote.into(),
        }
    }

    /// Normalize a text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when no object, market key, or price can be
    /// extracted.
    pub fn normalize_text(&self, text: &str) -> Result<CanonicalTick, CodecError> {
        let value = extract_json_object(text)?;
        self.normalize_value(&value)
    }

    /// Normalize a binary frame carrying UTF-8 encoded JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the frame is not UTF-8 or normalization
    /// fails.
    pub fn normalize_slice(&self, data: &[u8]) -> Result<CanonicalTick, CodecError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| CodecError::MalformedPayload(format!("non-UTF-8 frame: {e}")))?;
        self.normalize_text(text)
    }

    /// Normalize an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when no object, market key, or price can be
    /// extracted.
    pub fn normalize_value(&self, value: &Value) -> Result<CanonicalTick, CodecError> {
        let unwrapped = unwrap_payload(value)?;
        let obj = match &unwrapped {
            Value::Object(obj) => obj,
            other => {
                return Err(CodecError::MalformedPayload(format!(
                    "expected JSON object, got {other}"
                )));
            }
        };

        let market = extract_market(obj)?;
        let price = numeric_field(obj, fields::TRADE_PRICE)
            .filter(|price| !price.is_sign_negative())
            .ok_or(CodecError::MissingPrice)?;

        let prev_close = numeric_field(obj, fields::PREV_CLOSE);
        let hint = direction_hint(obj);
        let signed_change = derive_signed_change(obj, price, prev_close, hint);
        let change_rate_pct = derive_change_rate(obj, signed_change, prev_close);
        let acc_trade_value_24h = self.derive_acc_trade_value(obj, &market);

        Ok(CanonicalTick {
            market,
            price,
            prev_close,
            signed_change,
            change_rate_pct,
            acc_trade_value_24h,
            received_at: Utc::now(),
        })
    }

    /// Maximum positive accumulated-value field, domestic-quote markets
    /// only.
    fn derive_acc_trade_value(&self, obj: &Map<String, Value>, market: &MarketKey) -> Option<Decimal> {
        if market.quote() != Some(self.domestic_quote.as_str()) {
            return None;
        }

        obj.iter()
            .filter(|(name, _)| fields::is_acc_trade_value_field(name))
            .filter_map(|(_, value)| parse_decimal(value))
            .filter(|value| value > &Decimal::ZERO)
            .max()
    }
}

/// Locate and parse the JSON object embedded in a text payload.
///
/// Tolerates a leading array-wrapper or framing marker by extracting the
/// substring between the first `{` and the last `}`.
fn extract_json_object(text: &str) -> Result<Value, CodecError> {
    let start = text.find('{');
    let end = text.rfind('}');

    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end])
            .map_err(|e| CodecError::MalformedPayload(e.to_string())),
        _ => {
            let preview: String = text.chars().take(50).collect();
            Err(CodecError::MalformedPayload(format!(
                "no JSON object in: {preview}..."
            )))
        }
    }
}

/// Unwrap one level of payload nesting.
///
/// An array yields its first element; an object with an inner `raw`/`_raw`
/// field yields that field (parsed when it is itself a JSON string). One
/// level only.
fn unwrap_payload(value: &Value) -> Result<Value, CodecError> {
    let candidate = match value {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| CodecError::MalformedPayload("empty array payload".to_string()))?,
        other => other,
    };

    if let Value::Object(obj) = candidate
        && let Some(inner) = first_field(obj, fields::INNER_RAW)
    {
        return match inner {
            Value::Object(_) => Ok(inner.clone()),
            Value::String(text) => extract_json_object(text),
            _ => Ok(candidate.clone()),
        };
    }

    Ok(candidate.clone())
}

/// Resolve the market key from the first present identifier alias.
fn extract_market(obj: &Map<String, Value>) -> Result<MarketKey, CodecError> {
    let raw = first_field(obj, fields::MARKET)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or(CodecError::MissingMarket)?;

    Ok(MarketKey::normalize(raw))
}

/// Signed change: `prev_close - price` when derivable (negative on a price
/// rise), else the feed's signed field as-is, else the absolute field with
/// the directional hint's sign.
fn derive_signed_change(
    obj: &Map<String, Value>,
    price: Decimal,
    prev_close: Option<Decimal>,
    hint: ChangeDirection,
) -> Option<Decimal> {
    if let Some(prev) = prev_close {
        return Some(prev - price);
    }

    numeric_field(obj, fields::SIGNED_CHANGE)
        .or_else(|| numeric_field(obj, fields::ABS_CHANGE).map(|abs| hint.signed(abs.abs())))
}

/// Change rate as a percentage.
///
/// A non-zero raw rate wins: magnitudes below 1 are fractions (×100), larger
/// magnitudes are already percentages, and the raw field's sign is kept.
/// Otherwise the rate is derived from `signed_change / prev_close`.
fn derive_change_rate(
    obj: &Map<String, Value>,
    signed_change: Option<Decimal>,
    prev_close: Option<Decimal>,
) -> Option<Decimal> {
    if let Some(rate) = numeric_field(obj, fields::CHANGE_RATE)
        && !rate.is_zero()
    {
        let magnitude = if rate.abs() < Decimal::ONE {
            rate.abs() * HUNDRED
        } else {
            rate.abs()
        };

        return Some(if rate.is_sign_negative() {
            -magnitude
        } else {
            magnitude
        });
    }

    match (signed_change, prev_close) {
        (Some(change), Some(prev)) if !prev.is_zero() => Some(change / prev * HUNDRED),
        _ => None,
    }
}

/// First non-unknown directional marker among the direction aliases.
fn direction_hint(obj: &Map<String, Value>) -> ChangeDirection {
    fields::DIRECTION
        .iter()
        .filter_map(|alias| obj.get(*alias))
        .filter_map(Value::as_str)
        .map(ChangeDirection::from_marker)
        .find(|direction| *direction != ChangeDirection::Unknown)
        .unwrap_or_default()
}

/// First present field among an alias list.
fn first_field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| obj.get(*alias))
}

/// First parseable numeric field among an alias list.
fn numeric_field(obj: &Map<String, Value>, aliases: &[&str]) -> Option<Decimal> {
    aliases
        .iter()
        .filter_map(|alias| obj.get(*alias))
        .find_map(parse_decimal)
}

/// Parse a JSON value as a decimal.
///
/// Strings tolerate thousands separators and currency symbols
/// (`"1,000,000"`, `"₩60,000,000"`).
fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => decimal_from_str(&number.to_string()),
        Value::String(text) => {
            let cleaned: String = text
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '₩' | '$' | '¥') && !c.is_whitespace())
                .collect();

            if cleaned.is_empty() {
                None
            } else {
                decimal_from_str(&cleaned)
            }
        }
        _ => None,
    }
}

fn decimal_from_str(text: &str) -> Option<Decimal> {
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    fn codec() -> TickerCodec {
        TickerCodec::new("KRW")
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Field-by-field comparison ignoring `received_at`.
    fn assert_same_tick(a: &CanonicalTick, b: &CanonicalTick) {
        assert_eq!(a.market, b.market);
        assert_eq!(a.price, b.price);
        assert_eq!(a.prev_close, b.prev_close);
        assert_eq!(a.signed_change, b.signed_change);
        assert_eq!(a.change_rate_pct, b.change_rate_pct);
        assert_eq!(a.acc_trade_value_24h, b.acc_trade_value_24h);
    }

    #[test]
    fn sign_convention_on_price_rise() {
        let tick = codec()
            .normalize_text(
                r#"{"market":"KRW-BTC","trade_price":60000000,"prev_closing_price":59000000,"change":"RISE"}"#,
            )
            .unwrap();

        assert_eq!(tick.market.as_str(), "KRW-BTC");
        assert_eq!(tick.price, dec("60000000"));
        // prev_close - price: a rise is stored negative.
        assert_eq!(tick.signed_change, Some(dec("-1000000")));
        assert_eq!(tick.display_change(), Some(dec("1000000")));
    }

    #[test]
    fn wrapper_shapes_normalize_identically() {
        let codec = codec();

        let plain = codec
            .normalize_text(
                r#"{"market":"KRW-ETH","trade_price":5000000,"prev_closing_price":4900000}"#,
            )
            .unwrap();

        let framed = codec
            .normalize_text(
                r#"42["ticker",{"market":"KRW-ETH","trade_price":5000000,"prev_closing_price":4900000}]"#,
            )
            .unwrap();

        let camel = codec
            .normalize_text(
                r#"{"symbol":"KRW-ETH","tradePrice":5000000,"prevClosingPrice":4900000}"#,
            )
            .unwrap();

        let nested = codec
            .normalize_value(&serde_json::json!({
                "raw": {"market":"KRW-ETH","trade_price":5000000,"prev_closing_price":4900000}
            }))
            .unwrap();

        assert_same_tick(&plain, &framed);
        assert_same_tick(&plain, &camel);
        assert_same_tick(&plain, &nested);
    }

    #[test]
    fn stringified_payload_is_unwrapped() {
        let tick = codec()
            .normalize_value(&serde_json::json!({
                "raw": "{\"market\":\"KRW-BTC\",\"trade_price\":100}"
            }))
            .unwrap();

        assert_eq!(tick.price, dec("100"));
    }

    #[test_case("0.0169", "1.69" ; "fraction reinterpreted as percent")]
    #[test_case("1.69", "1.69" ; "percent kept as-is")]
    #[test_case("-0.0169", "-1.69" ; "negative fraction keeps sign")]
    fn change_rate_fraction_vs_percent(raw: &str, expected: &str) {
        let payload = format!(r#"{{"market":"KRW-BTC","trade_price":100,"change_rate":{raw}}}"#);
        let tick = codec().normalize_text(&payload).unwrap();

        assert_eq!(tick.change_rate_pct, Some(dec(expected)));
    }

    #[test]
    fn change_rate_derived_when_raw_absent() {
        let tick = codec()
            .normalize_text(
                r#"{"market":"KRW-BTC","trade_price":60000000,"prev_closing_price":59000000}"#,
            )
            .unwrap();

        // signed_change / prev_close * 100, same sign as signed_change.
        let rate = tick.change_rate_pct.unwrap();
        assert!(rate < Decimal::ZERO);
        assert!((rate - dec("-1.6949")).abs() < dec("0.001"));
        assert_eq!(
            rate.is_sign_negative(),
            tick.signed_change.unwrap().is_sign_negative()
        );
    }

    #[test]
    fn change_rate_derived_when_raw_zero() {
        let tick = codec()
            .normalize_text(
                r#"{"market":"KRW-BTC","trade_price":99,"prev_closing_price":100,"change_rate":0}"#,
            )
            .unwrap();

        assert_eq!(tick.change_rate_pct, Some(dec("1")));
    }

    #[test]
    fn signed_change_field_trusted_as_is() {
        let tick = codec()
            .normalize_text(
                r#"{"market":"KRW-BTC","trade_price":100,"signed_change_price":-250}"#,
            )
            .unwrap();

        assert_eq!(tick.signed_change, Some(dec("-250")));
    }

    #[test]
    fn abs_change_takes_direction_hint_sign() {
        let codec = codec();

        let down = codec
            .normalize_text(
                r#"{"market":"KRW-BTC","trade_price":100,"change_price":250,"change":"FALL"}"#,
            )
            .unwrap();
        assert_eq!(down.signed_change, Some(dec("-250")));

        let unknown = codec
            .normalize_text(r#"{"market":"KRW-BTC","trade_price":100,"change_price":250}"#)
            .unwrap();
        assert_eq!(unknown.signed_change, Some(dec("250")));
    }

    #[test]
    fn acc_trade_value_domestic_only() {
        let codec = codec();

        let domestic = codec
            .normalize_text(
                r#"{"market":"KRW-ETH","trade_price":100,"acc_trade_price_24h":5000000000}"#,
            )
            .unwrap();
        assert_eq!(domestic.acc_trade_value_24h, Some(dec("5000000000")));

        let foreign = codec
            .normalize_text(
                r#"{"market":"USD-ETH","trade_price":100,"acc_trade_price_24h":5000000000}"#,
            )
            .unwrap();
        assert_eq!(foreign.acc_trade_value_24h, None);
    }

    #[test]
    fn acc_trade_value_takes_maximum_positive() {
        let tick = codec()
            .normalize_text(
                r#"{"market":"KRW-ETH","trade_price":100,"acc_trade_price_24h":300,"accTradeValue24h":900,"atp24h":-5}"#,
            )
            .unwrap();

        assert_eq!(tick.acc_trade_value_24h, Some(dec("900")));
    }

    #[test]
    fn numeric_strings_strip_separators_and_symbols() {
        let tick = codec()
            .normalize_text(r#"{"market":"KRW-BTC","trade_price":"₩60,000,000"}"#)
            .unwrap();

        assert_eq!(tick.price, dec("60000000"));
    }

    #[test]
    fn price_alias_priority() {
        // trade_price beats close even when both are present.
        let tick = codec()
            .normalize_text(r#"{"market":"KRW-BTC","close":90,"trade_price":100}"#)
            .unwrap();

        assert_eq!(tick.price, dec("100"));
    }

    #[test]
    fn simple_format_aliases() {
        let tick = codec()
            .normalize_text(r#"{"cd":"KRW-XRP","tp":800,"pcp":820,"c":"FALL","atp24h":123456}"#)
            .unwrap();

        assert_eq!(tick.market.as_str(), "KRW-XRP");
        assert_eq!(tick.price, dec("800"));
        assert_eq!(tick.signed_change, Some(dec("20")));
        assert_eq!(tick.acc_trade_value_24h, Some(dec("123456")));
    }

    #[test]
    fn missing_market_is_soft_failure() {
        let result = codec().normalize_text(r#"{"trade_price":100}"#);
        assert!(matches!(result, Err(CodecError::MissingMarket)));
    }

    #[test]
    fn missing_price_is_soft_failure() {
        let result = codec().normalize_text(r#"{"market":"KRW-BTC","volume":5}"#);
        assert!(matches!(result, Err(CodecError::MissingPrice)));

        let negative = codec().normalize_text(r#"{"market":"KRW-BTC","trade_price":-1}"#);
        assert!(matches!(negative, Err(CodecError::MissingPrice)));
    }

    #[test]
    fn unparsable_payload_is_soft_failure() {
        let result = codec().normalize_text("not json at all");
        assert!(matches!(result, Err(CodecError::MalformedPayload(_))));

        let truncated = codec().normalize_text(r#"{"market":"KRW-BTC""#);
        assert!(matches!(truncated, Err(CodecError::MalformedPayload(_))));
    }

    #[test]
    fn binary_frame_normalizes() {
        let tick = codec()
            .normalize_slice(br#"{"market":"KRW-BTC","trade_price":100}"#)
            .unwrap();

        assert_eq!(tick.price, dec("100"));
    }
}
