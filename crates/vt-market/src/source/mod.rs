//! Market Data Sources
//!
//! Where the raw upstream payload comes from.

mod http;
mod static_source;

pub use http::HttpMarketSource;
pub use static_source::StaticMarketSource;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::MarketSnapshot;
use crate::normalize::normalize;

/// Market data source trait (Strategy pattern)
///
/// Implement this for each upstream: the live API, fixtures, etc.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetch the raw, unnormalized payload
    async fn fetch_raw(&self) -> Result<Value>;

    /// Fetch and normalize
    async fn snapshot(&self) -> Result<MarketSnapshot> {
        let raw = self.fetch_raw().await?;
        let snapshot = normalize(raw)?;
        tracing::debug!(
            source = self.name(),
            rates = snapshot.rates.len(),
            banks = snapshot.banks.len(),
            crypto = snapshot.crypto.len(),
            stocks = snapshot.stocks.len(),
            "Market snapshot normalized"
        );
        Ok(snapshot)
    }

    /// Source name
    fn name(&self) -> &str;
}
