//! PayPal Orders v2
//!
//! Client-credentials token exchange followed by a `CAPTURE` order. The
//! buyer is redirected to the order's `approve` link.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GatewayAdapter, amount_2dp, ensure_success, parse_body};
use crate::checkout::{CheckoutContext, GatewaySession, PaymentMethod};
use crate::config::{Lookup, var};
use crate::error::{PaymentError, Result};
use crate::transport::{HttpRequest, HttpTransport};

const PROVIDER: &str = "PayPal";
const SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_URL: &str = "https://api-m.paypal.com";
const BRAND_NAME: &str = "VT Premium";

/// PayPal credentials
#[derive(Clone, Debug)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Use the sandbox API
    pub sandbox: bool,
}

impl PayPalConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        let client_id = var(lookup, "PAYPAL_CLIENT_ID")?;
        let client_secret = var(lookup, "PAYPAL_CLIENT_SECRET")?;
        let sandbox = var(lookup, "PAYPAL_MODE").is_none_or(|mode| !mode.eq_ignore_ascii_case("live"));

        Some(Self {
            client_id,
            client_secret,
            sandbox,
        })
    }

    pub const fn base_url(&self) -> &'static str {
        if self.sandbox { SANDBOX_URL } else { LIVE_URL }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct OrderLink {
    href: String,
    rel: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<OrderLink>,
}

/// PayPal adapter
pub struct PayPalAdapter {
    config: Option<PayPalConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl PayPalAdapter {
    pub fn new(config: Option<PayPalConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    async fn access_token(&self, config: &PayPalConfig) -> Result<String> {
        let request = HttpRequest::post(format!("{}/v1/oauth2/token", config.base_url()))
            .basic(&config.client_id, &config.client_secret)
            .form(vec![("grant_type".into(), "client_credentials".into())]);

        let response = self.transport.send(request).await?;
        ensure_success(PROVIDER, &response)?;
        let token: TokenResponse = parse_body(PROVIDER, &response)?;
        Ok(token.access_token)
    }

    fn order_body(ctx: &CheckoutContext) -> serde_json::Value {
        let request = &ctx.request;
        json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": ctx.order_id,
                "description": request.description(),
                "custom_id": format!("{}:{}", request.user_id_or_guest(), request.months),
                "amount": {
                    "currency_code": request.currency,
                    "value": amount_2dp(request.total_amount),
                },
            }],
            "application_context": {
                "brand_name": BRAND_NAME,
                "user_action": "PAY_NOW",
                "shipping_preference": "NO_SHIPPING",
                "return_url": ctx.urls.success_url,
                "cancel_url": ctx.urls.cancel_url,
            },
        })
    }
}

#[async_trait]
impl GatewayAdapter for PayPalAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paypal
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn create_checkout(&self, ctx: &CheckoutContext) -> Result<GatewaySession> {
        let config = self
            .config
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PROVIDER))?;

        let token = self.access_token(config).await?;

        let request = HttpRequest::post(format!("{}/v2/checkout/orders", config.base_url()))
            .bearer(token)
            .json(Self::order_body(ctx));

        let response = self.transport.send(request).await?;
        ensure_success(PROVIDER, &response)?;
        let order: OrderResponse = parse_body(PROVIDER, &response)?;

        let checkout_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href)
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No approve link returned"))?;

        tracing::info!(order_id = %ctx.order_id, paypal_order = %order.id, "PayPal order created");

        Ok(GatewaySession {
            checkout_url,
            provider_ref: order.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::checkout::fixtures;
    use crate::transport::{Auth, MockTransport};

    fn config() -> Option<PayPalConfig> {
        Some(PayPalConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            sandbox: true,
        })
    }

    fn mock_with_order(links: serde_json::Value) -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .respond("/v1/oauth2/token", 200, json!({"access_token": "A21AA", "token_type": "Bearer"}))
                .respond("/v2/checkout/orders", 201, json!({"id": "5O190127TN364715T", "status": "CREATED", "links": links})),
        )
    }

    #[tokio::test]
    async fn test_token_then_order() {
        let mock = mock_with_order(json!([
            {"href": "https://api-m.sandbox.paypal.com/v2/checkout/orders/5O19", "rel": "self", "method": "GET"},
            {"href": "https://www.sandbox.paypal.com/checkoutnow?token=5O19", "rel": "approve", "method": "GET"}
        ]));
        let adapter = PayPalAdapter::new(config(), mock.clone());
        let ctx = fixtures::context(PaymentMethod::Paypal, "https://vt.example.com");

        let session = adapter.create_checkout(&ctx).await.unwrap();
        assert_eq!(session.checkout_url, "https://www.sandbox.paypal.com/checkoutnow?token=5O19");
        assert_eq!(session.provider_ref, "5O190127TN364715T");

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.starts_with(SANDBOX_URL));
        assert!(matches!(calls[0].auth, Some(Auth::Basic { .. })));
        assert_eq!(calls[1].auth, Some(Auth::Bearer("A21AA".into())));

        let body = calls[1].json_body().unwrap();
        assert_eq!(body["intent"], "CAPTURE");
        assert_eq!(body["purchase_units"][0]["amount"]["value"], "12.99");
        assert_eq!(body["purchase_units"][0]["custom_id"], "user-123:3");
    }

    #[tokio::test]
    async fn test_missing_approve_link_is_failure() {
        let mock = mock_with_order(json!([{"href": "https://x", "rel": "self"}]));
        let adapter = PayPalAdapter::new(config(), mock);
        let ctx = fixtures::context(PaymentMethod::Paypal, "https://vt.example.com");

        let err = adapter.create_checkout(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("approve"));
    }

    #[tokio::test]
    async fn test_token_failure_stops_before_order() {
        let mock = Arc::new(MockTransport::new().respond("/v1/oauth2/token", 401, json!({"error": "invalid_client"})));
        let adapter = PayPalAdapter::new(config(), mock.clone());
        let ctx = fixtures::context(PaymentMethod::Paypal, "https://vt.example.com");

        assert!(adapter.create_checkout(&ctx).await.is_err());
        assert_eq!(mock.calls_to("/v2/checkout/orders").len(), 0);
    }

    #[test]
    fn test_live_mode() {
        let live = PayPalConfig {
            sandbox: false,
            ..config().unwrap()
        };
        assert_eq!(live.base_url(), LIVE_URL);
    }
}
