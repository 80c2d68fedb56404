//! Domain Models
//!
//! The normalized market snapshot served to clients.
//! Uses `rust_decimal` for all quoted values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A quoted value: exchange rate, border rate, crypto or stock price
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Upper-cased code ("USD", "USDT", "BNC")
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub value: Decimal,

    /// Percentage change, when the upstream reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,
}

impl Quote {
    pub fn new(code: impl Into<String>, value: Decimal) -> Self {
        Self {
            code: code.into().trim().to_uppercase(),
            name: None,
            value,
            change: None,
        }
    }
}

/// Buy/sell quote published by a bank
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankQuote {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell: Option<Decimal>,
}

/// Everything the market page displays
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    /// Official exchange rates, sorted by code
    pub rates: Vec<Quote>,

    /// Bank quotes, sorted by name
    pub banks: Vec<BankQuote>,

    /// Border currency rates, sorted by code
    pub border: Vec<Quote>,

    /// Crypto P2P prices, sorted by code
    pub crypto: Vec<Quote>,

    /// Stock quotes, sorted by code
    pub stocks: Vec<Quote>,

    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Empty snapshot stamped `fetched_at`
    pub const fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            rates: Vec::new(),
            banks: Vec::new(),
            border: Vec::new(),
            crypto: Vec::new(),
            stocks: Vec::new(),
            fetched_at,
        }
    }

    /// Exchange rate by code, case-insensitive
    pub fn rate(&self, code: &str) -> Option<&Quote> {
        self.rates.iter().find(|q| q.code.eq_ignore_ascii_case(code))
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
            && self.banks.is_empty()
            && self.border.is_empty()
            && self.crypto.is_empty()
            && self.stocks.is_empty()
    }

    pub(crate) fn sort(&mut self) {
        self.rates.sort_by(|a, b| a.code.cmp(&b.code));
        self.banks.sort_by(|a, b| a.name.cmp(&b.name));
        self.border.sort_by(|a, b| a.code.cmp(&b.code));
        self.crypto.sort_by(|a, b| a.code.cmp(&b.code));
        self.stocks.sort_by(|a, b| a.code.cmp(&b.code));
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_rate_lookup_is_case_insensitive() {
        let mut snapshot = MarketSnapshot::empty(Utc::now());
        snapshot.rates.push(Quote::new("usd", dec!(36.52)));

        assert_eq!(snapshot.rate("USD").map(|q| q.value), Some(dec!(36.52)));
        assert!(snapshot.rate("EUR").is_none());
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_value(Quote::new("EUR", dec!(39.8))).unwrap();
        assert!(json.get("name").is_none());
        assert!(json.get("change").is_none());
        assert_eq!(json["code"], "EUR");
    }
}
