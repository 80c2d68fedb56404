//! Static Market Source
//!
//! For tests and local development. Serves a fixed payload.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::MarketSource;
use crate::error::Result;

/// Source returning the same payload on every fetch
pub struct StaticMarketSource {
    payload: Value,
}

impl Default for StaticMarketSource {
    fn default() -> Self {
        Self::sample()
    }
}

impl StaticMarketSource {
    pub const fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Realistic sample in the envelope shape
    pub fn sample() -> Self {
        Self::new(json!({
            "success": true,
            "data": {
                "rates": [
                    {"code": "USD", "name": "Dólar BCV", "value": "36,52", "change": "0.15"},
                    {"code": "EUR", "name": "Euro BCV", "value": "39,87", "change": "-0.22"}
                ],
                "banks": [
                    {"bank": "Banesco", "compra": "36,40", "venta": "36,95"},
                    {"bank": "Mercantil", "compra": "36,38", "venta": "36,90"},
                    {"bank": "Banco de Venezuela", "compra": "36,45", "venta": "36,99"}
                ],
                "border": {"COP": "0,0091", "BRL": "7,12"},
                "crypto": [
                    {"symbol": "USDT", "name": "Tether P2P", "price": 38.15, "change_24h": 0.4},
                    {"symbol": "BTC", "name": "Bitcoin", "price": 3_560_000, "change_24h": -1.1}
                ],
                "stocks": [
                    {"symbol": "BNC", "name": "Banco Nacional de Crédito", "price": "0,41", "variation": "2,5"},
                    {"symbol": "BPV", "name": "Banco Provincial", "price": "18,50", "variation": "-0,8"}
                ]
            }
        }))
    }
}

#[async_trait]
impl MarketSource for StaticMarketSource {
    async fn fetch_raw(&self) -> Result<Value> {
        Ok(self.payload.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
