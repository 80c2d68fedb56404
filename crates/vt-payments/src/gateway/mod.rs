//! Gateway Adapters
//!
//! One adapter per provider. Each knows how to authenticate, build the
//! provider's checkout request and map the answer into a [`GatewaySession`].
//!
//! ```text
//!                        ┌──────────────┐
//!                   ┌───▶│    Stripe    │  Checkout Session (async-stripe)
//!                   │    ├──────────────┤
//!                   ├───▶│    PayPal    │  OAuth token → Order (CAPTURE)
//! ┌─────────────┐   │    ├──────────────┤
//! │ Dispatcher  │───┼───▶│     Bold     │  methods discovery → payment link
//! └─────────────┘   │    ├──────────────┤
//!                   ├───▶│    ePayco    │  login → collection link
//!                   │    ├──────────────┤
//!                   └───▶│ Binance Pay  │  HMAC-SHA512 signed order
//!                        └──────────────┘
//! ```

mod binance;
mod bold;
mod epayco;
mod paypal;
mod stripe;

pub use self::binance::{BinanceConfig, BinancePayAdapter, binance_signature};
pub use self::bold::{BoldAdapter, BoldConfig, FALLBACK_PAYMENT_METHODS};
pub use self::epayco::{EpaycoAdapter, EpaycoConfig};
pub use self::paypal::{PayPalAdapter, PayPalConfig};
pub use self::stripe::{StripeAdapter, StripeConfig};
#[cfg(test)]
pub(crate) use self::stripe::stub::StripeStub;

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::checkout::{CheckoutContext, GatewaySession, PaymentMethod};
use crate::error::{PaymentError, Result};
use crate::transport::HttpResponse;

/// A provider checkout integration
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    /// Method this adapter serves
    fn method(&self) -> PaymentMethod;

    /// Whether credentials are present
    fn is_configured(&self) -> bool;

    /// Create a hosted checkout. Makes no network call when unconfigured.
    async fn create_checkout(&self, ctx: &CheckoutContext) -> Result<GatewaySession>;
}

/// Map a non-2xx response to a provider error, logging status and body
pub(crate) fn ensure_success(provider: &'static str, response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    tracing::error!(
        provider,
        status = response.status,
        body = %truncate(&response.body, 500),
        "Provider returned an error status"
    );
    Err(PaymentError::provider(
        provider,
        format!("HTTP {}", response.status),
    ))
}

/// Parse a JSON body, mapping failures to a provider error
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    response: &HttpResponse,
) -> Result<T> {
    response.json().map_err(|e| {
        tracing::error!(provider, error = %e, "Malformed provider response");
        PaymentError::provider(provider, format!("invalid response: {e}"))
    })
}

/// Two-decimal string ("12.99")
pub(crate) fn amount_2dp(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// JSON number for providers that reject string amounts
pub(crate) fn amount_number(amount: Decimal) -> serde_json::Value {
    serde_json::Number::from_str(&amount_2dp(amount))
        .map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
