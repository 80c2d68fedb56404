//! Live Market-Data API

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::MarketSource;
use crate::error::{MarketError, Result};

/// Fetches the payload from `MARKET_API_URL`
pub struct HttpMarketSource {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpMarketSource {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// `MARKET_API_URL` is required, `MARKET_API_KEY` optional
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        non_empty("MARKET_API_URL").map(|url| Self::new(url, non_empty("MARKET_API_KEY")))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MarketSource for HttpMarketSource {
    async fn fetch_raw(&self) -> Result<Value> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %self.url, status = status.as_u16(), "Market API returned an error status");
            return Err(MarketError::Upstream(format!("HTTP {}", status.as_u16())));
        }

        Ok(response.json().await?)
    }

    fn name(&self) -> &str {
        "market-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_is_required() {
        let lookup = |name: &str| (name == "MARKET_API_KEY").then(|| "key".to_string());
        assert!(HttpMarketSource::from_lookup(&lookup).is_none());
    }

    #[test]
    fn test_key_is_optional() {
        let lookup = |name: &str| (name == "MARKET_API_URL").then(|| " https://api.example.com/market ".to_string());
        let source = HttpMarketSource::from_lookup(&lookup).unwrap();
        assert_eq!(source.url(), "https://api.example.com/market");
        assert!(source.api_key.is_none());
    }
}
