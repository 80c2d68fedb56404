//! Upstream Payload Normalization
//!
//! The market-data API has answered in two shapes over time:
//!
//! ```text
//! Envelope  { "success": true, "data": { ...sections... }, "message": "..." }
//! Sections  { "rates": ..., "banks": [...], "border": ..., "crypto": ..., "stocks": [...] }
//! ```
//!
//! Quote sections are either a list of entries or a map keyed by code, and
//! numbers arrive as JSON numbers or strings (sometimes with a decimal
//! comma). Anything else is rejected with [`MarketError::UnrecognizedShape`].
//!
//! Individual entries that cannot be read are skipped; a payload whose
//! shape is unknown is an error.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{MarketError, Result};
use crate::model::{BankQuote, MarketSnapshot, Quote};

/// Envelopes nested deeper than this are rejected
const MAX_ENVELOPE_DEPTH: usize = 2;

/// Known upstream shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    Envelope {
        #[serde(default)]
        success: Option<bool>,
        data: Value,
        #[serde(default)]
        message: Option<String>,
    },
    Sections(Sections),
}

/// Top-level market sections, at least one present
#[derive(Debug, Default, Deserialize)]
pub struct Sections {
    #[serde(default)]
    pub rates: Option<QuoteSection>,
    #[serde(default)]
    pub banks: Option<Vec<Value>>,
    #[serde(default)]
    pub border: Option<QuoteSection>,
    #[serde(default)]
    pub crypto: Option<QuoteSection>,
    #[serde(default)]
    pub stocks: Option<QuoteSection>,
}

impl Sections {
    fn is_empty(&self) -> bool {
        self.rates.is_none()
            && self.banks.is_none()
            && self.border.is_none()
            && self.crypto.is_none()
            && self.stocks.is_none()
    }
}

/// A quote section: `[{code, value, ...}]` or `{code: value | {value, ...}}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QuoteSection {
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

#[derive(Deserialize)]
struct QuoteEntry {
    #[serde(default, alias = "symbol", alias = "currency", alias = "ticker")]
    code: Option<String>,
    #[serde(default, alias = "nombre")]
    name: Option<String>,
    #[serde(alias = "price", alias = "rate", alias = "precio", deserialize_with = "decimal")]
    value: Decimal,
    #[serde(
        default,
        alias = "change_24h",
        alias = "changePercent",
        alias = "variation",
        deserialize_with = "optional_decimal"
    )]
    change: Option<Decimal>,
}

#[derive(Deserialize)]
struct BankEntry {
    #[serde(alias = "bank", alias = "banco")]
    name: String,
    #[serde(default, alias = "compra", deserialize_with = "optional_decimal")]
    buy: Option<Decimal>,
    #[serde(default, alias = "venta", deserialize_with = "optional_decimal")]
    sell: Option<Decimal>,
}

/// Normalize a raw upstream payload
pub fn normalize(raw: Value) -> Result<MarketSnapshot> {
    normalize_at_depth(raw, 0)
}

fn normalize_at_depth(raw: Value, depth: usize) -> Result<MarketSnapshot> {
    if !raw.is_object() {
        return Err(MarketError::UnrecognizedShape(format!(
            "expected an object, got {}",
            kind_of(&raw)
        )));
    }

    let payload: UpstreamPayload = serde_json::from_value(raw)
        .map_err(|e| MarketError::UnrecognizedShape(e.to_string()))?;

    match payload {
        UpstreamPayload::Envelope {
            success: Some(false),
            message,
            ..
        } => Err(MarketError::Upstream(
            message.unwrap_or_else(|| "request unsuccessful".into()),
        )),
        UpstreamPayload::Envelope { data, .. } => {
            if depth >= MAX_ENVELOPE_DEPTH {
                return Err(MarketError::UnrecognizedShape("envelope nested too deeply".into()));
            }
            normalize_at_depth(data, depth + 1)
        }
        UpstreamPayload::Sections(sections) if sections.is_empty() => Err(
            MarketError::UnrecognizedShape("no known market sections".into()),
        ),
        UpstreamPayload::Sections(sections) => Ok(from_sections(sections)),
    }
}

fn from_sections(sections: Sections) -> MarketSnapshot {
    let mut snapshot = MarketSnapshot::empty(Utc::now());

    snapshot.rates = sections.rates.map(|s| quotes("rates", s)).unwrap_or_default();
    snapshot.border = sections.border.map(|s| quotes("border", s)).unwrap_or_default();
    snapshot.crypto = sections.crypto.map(|s| quotes("crypto", s)).unwrap_or_default();
    snapshot.stocks = sections.stocks.map(|s| quotes("stocks", s)).unwrap_or_default();
    snapshot.banks = sections
        .banks
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<BankEntry>(entry) {
            Ok(bank) => Some(BankQuote {
                name: bank.name.trim().to_string(),
                buy: bank.buy,
                sell: bank.sell,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable bank entry");
                None
            }
        })
        .collect();

    snapshot.sort();
    snapshot
}

fn quotes(section: &'static str, raw: QuoteSection) -> Vec<Quote> {
    let entries: Vec<(Option<String>, Value)> = match raw {
        QuoteSection::List(items) => items.into_iter().map(|v| (None, v)).collect(),
        QuoteSection::Map(items) => items.into_iter().map(|(k, v)| (Some(k), v)).collect(),
    };

    entries
        .into_iter()
        .filter_map(|(key, value)| {
            let quote = quote_from(key, value);
            if quote.is_none() {
                tracing::debug!(section, "Skipping unreadable quote entry");
            }
            quote
        })
        .collect()
}

fn quote_from(key: Option<String>, value: Value) -> Option<Quote> {
    if value.is_object() {
        let entry: QuoteEntry = serde_json::from_value(value).ok()?;
        let code = entry.code.or(key).filter(|c| !c.trim().is_empty())?;
        return Some(Quote {
            name: entry.name,
            change: entry.change,
            ..Quote::new(code, entry.value)
        });
    }

    let code = key?;
    parse_decimal(&value).map(|v| Quote::new(code, v))
}

/// JSON number or numeric string; the last of `.`/`,` is the decimal mark
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Decimal, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    parse_decimal(&raw).ok_or_else(|| serde::de::Error::custom(format!("not a number: {raw}")))
}

fn optional_decimal<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_decimal))
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_with_list_rates() {
        let snapshot = normalize(json!({
            "success": true,
            "data": {
                "rates": [
                    {"code": "USD", "name": "Dólar BCV", "value": 36.52, "change": 0.12},
                    {"code": "EUR", "value": "39,87"}
                ]
            }
        }))
        .unwrap();

        assert_eq!(snapshot.rates.len(), 2);
        assert_eq!(snapshot.rates[0].code, "EUR");
        assert_eq!(snapshot.rate("EUR").unwrap().value, dec!(39.87));
        let usd = snapshot.rate("usd").unwrap();
        assert_eq!(usd.value, dec!(36.52));
        assert_eq!(usd.change, Some(dec!(0.12)));
        assert_eq!(usd.name.as_deref(), Some("Dólar BCV"));
    }

    #[test]
    fn test_sections_with_map_rates() {
        let snapshot = normalize(json!({
            "rates": {"usd": 36.5, "eur": {"value": "39.9", "change": "-0.4%"}},
            "crypto": {"USDT": "37,10"},
            "banks": [
                {"bank": "Mercantil", "compra": "36,40", "venta": "36,90"},
                {"name": "Banesco", "buy": 36.3}
            ]
        }))
        .unwrap();

        assert_eq!(snapshot.rate("USD").unwrap().value, dec!(36.5));
        assert_eq!(snapshot.rate("EUR").unwrap().change, Some(dec!(-0.4)));
        assert_eq!(snapshot.crypto[0].value, dec!(37.10));
        assert_eq!(snapshot.banks[0].name, "Banesco");
        assert_eq!(snapshot.banks[1].sell, Some(dec!(36.90)));
        assert!(snapshot.stocks.is_empty());
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let snapshot = normalize(json!({
            "stocks": [
                {"symbol": "BNC", "price": "0.41"},
                {"symbol": "BPV", "price": "n/a"},
                {"price": 12}
            ]
        }))
        .unwrap();

        assert_eq!(snapshot.stocks.len(), 1);
        assert_eq!(snapshot.stocks[0].code, "BNC");
    }

    #[test]
    fn test_unsuccessful_envelope_is_upstream_error() {
        let err = normalize(json!({"success": false, "data": null, "message": "quota exceeded"}))
            .unwrap_err();
        assert!(matches!(err, MarketError::Upstream(ref m) if m == "quota exceeded"));
    }

    #[test]
    fn test_unknown_shapes_are_rejected() {
        for raw in [
            json!({"foo": 1}),
            json!([1, 2, 3]),
            json!("rates"),
            json!({"data": {"data": {"data": {"rates": []}}}}),
        ] {
            let err = normalize(raw).unwrap_err();
            assert!(matches!(err, MarketError::UnrecognizedShape(_)), "{err}");
        }
    }

    #[test]
    fn test_decimal_separators() {
        assert_eq!(parse_decimal(&json!("1.234,56")), Some(dec!(1234.56)));
        assert_eq!(parse_decimal(&json!("1,234.56")), Some(dec!(1234.56)));
        assert_eq!(parse_decimal(&json!("36,52")), Some(dec!(36.52)));
        assert_eq!(parse_decimal(&json!(" 12 ")), Some(dec!(12)));
        assert_eq!(parse_decimal(&json!(1e-7)), Some(dec!(0.0000001)));
        assert_eq!(parse_decimal(&json!(true)), None);
    }
}
