//! Binance Pay Orders (v3)
//!
//! Every request is signed:
//!
//! ```text
//! signature = UPPER(HEX(HMAC_SHA512(secret_key, "{timestamp}\n{nonce}\n{body}\n")))
//! ```
//!
//! Binance answers HTTP 200 for business failures, so the body's `status`
//! must be `SUCCESS` for the order to count.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha512;

use super::{GatewayAdapter, amount_number, ensure_success, parse_body};
use crate::checkout::{CheckoutContext, GatewaySession, PaymentMethod};
use crate::config::{Lookup, var};
use crate::error::{PaymentError, Result};
use crate::transport::{HttpRequest, HttpTransport};

type HmacSha512 = Hmac<Sha512>;

const PROVIDER: &str = "Binance Pay";
const ORDER_URL: &str = "https://bpay.binanceapi.com/binancepay/openapi/v3/order";

/// Binance Pay credentials
#[derive(Clone, Debug)]
pub struct BinanceConfig {
    pub api_key: String,
    pub secret_key: String,
}

impl BinanceConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        Some(Self {
            api_key: var(lookup, "BINANCE_PAY_API_KEY")?,
            secret_key: var(lookup, "BINANCE_PAY_SECRET_KEY")?,
        })
    }
}

/// Uppercase hex HMAC-SHA512 over `"{timestamp}\n{nonce}\n{payload}\n"`
pub fn binance_signature(secret_key: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format!("{timestamp}\n{nonce}\n{payload}\n").as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

/// 32 alphanumeric characters
fn nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    data: Option<OrderData>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderData {
    prepay_id: String,
    #[serde(default)]
    checkout_url: Option<String>,
    #[serde(default)]
    universal_url: Option<String>,
}

/// Binance Pay adapter
pub struct BinancePayAdapter {
    config: Option<BinanceConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl BinancePayAdapter {
    pub fn new(config: Option<BinanceConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Letters and digits only, at most 32 characters
    fn merchant_trade_no(order_id: &str) -> String {
        order_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(32)
            .collect()
    }

    fn order_body(ctx: &CheckoutContext, crypto_currency: &str) -> serde_json::Value {
        let request = &ctx.request;
        let mut body = json!({
            "env": { "terminalType": "WEB" },
            "merchantTradeNo": Self::merchant_trade_no(&ctx.order_id),
            "orderAmount": amount_number(request.total_amount),
            "currency": crypto_currency,
            "description": request.description(),
            "goodsDetails": [{
                "goodsType": "02",
                "goodsCategory": "Z000",
                "referenceGoodsId": format!("premium-{}m", request.months),
                "goodsName": request.description(),
            }],
            "passThroughInfo": json!({
                "orderId": ctx.order_id,
                "userId": request.user_id_or_guest(),
                "months": request.months,
            }).to_string(),
            "returnUrl": ctx.urls.success_url,
            "cancelUrl": ctx.urls.cancel_url,
        });

        if let Some(webhook) = &ctx.urls.webhook_url {
            body["webhookUrl"] = json!(webhook);
        }
        body
    }
}

#[async_trait]
impl GatewayAdapter for BinancePayAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Binance
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn create_checkout(&self, ctx: &CheckoutContext) -> Result<GatewaySession> {
        let config = self
            .config
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PROVIDER))?;

        let crypto_currency = ctx
            .request
            .crypto_asset()
            .ok_or_else(|| PaymentError::InvalidRequest("selecciona una criptomoneda".into()))?;

        let payload = Self::order_body(ctx, &crypto_currency).to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let nonce = nonce();
        let signature = binance_signature(&config.secret_key, &timestamp, &nonce, &payload);

        let request = HttpRequest::post(ORDER_URL)
            .header("BinancePay-Timestamp", timestamp)
            .header("BinancePay-Nonce", nonce)
            .header("BinancePay-Certificate-SN", &config.api_key)
            .header("BinancePay-Signature", signature)
            .raw_json(payload);

        let response = self.transport.send(request).await?;
        ensure_success(PROVIDER, &response)?;
        let order: OrderResponse = parse_body(PROVIDER, &response)?;

        if order.status != "SUCCESS" {
            let message = order
                .error_message
                .unwrap_or_else(|| format!("status {}", order.status));
            tracing::error!(
                order_id = %ctx.order_id,
                code = ?order.code,
                %message,
                "Binance Pay rejected the order"
            );
            return Err(PaymentError::provider(PROVIDER, message));
        }

        let data = order
            .data
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No order data returned"))?;
        let checkout_url = data
            .checkout_url
            .or(data.universal_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No checkout URL returned"))?;

        tracing::info!(order_id = %ctx.order_id, prepay_id = %data.prepay_id, "Binance Pay order created");

        Ok(GatewaySession {
            checkout_url,
            provider_ref: data.prepay_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::checkout::fixtures;
    use crate::transport::MockTransport;

    fn config() -> Option<BinanceConfig> {
        Some(BinanceConfig {
            api_key: "bn-api-key".into(),
            secret_key: "test-secret-key".into(),
        })
    }

    #[test]
    fn test_signature_is_deterministic() {
        let signature = binance_signature(
            "test-secret-key",
            "1700000000000",
            "abcdefghijklmnopqrstuvwxyz012345",
            r#"{"merchantTradeNo":"VT1"}"#,
        );
        assert_eq!(
            signature,
            "4B259E47177D42DFC27AC2E62D7BF82C5A3CF458FE66629C64091C10E7A4872C5DC7A8F65187ED140C478A5189747239E585E39744ABE17F3FE3CFE2D6327DF1"
        );
    }

    #[test]
    fn test_nonce_shape() {
        let nonce = nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_merchant_trade_no() {
        assert_eq!(BinancePayAdapter::merchant_trade_no("VT-1700000000000"), "VT1700000000000");
    }

    #[tokio::test]
    async fn test_signed_order() {
        let mock = Arc::new(MockTransport::new().respond(ORDER_URL, 200, json!({
            "status": "SUCCESS",
            "code": "000000",
            "data": {
                "prepayId": "29383937493038367292",
                "checkoutUrl": "https://pay.binance.com/checkout/2938"
            }
        })));
        let adapter = BinancePayAdapter::new(config(), mock.clone());
        let mut ctx = fixtures::context(PaymentMethod::Binance, "https://vt.example.com");
        ctx.urls.webhook_url = Some("https://vt.example.com/api/webhooks/binance".into());

        let session = adapter.create_checkout(&ctx).await.unwrap();
        assert_eq!(session.provider_ref, "29383937493038367292");

        let call = &mock.calls()[0];
        let timestamp = call.header_value("BinancePay-Timestamp").unwrap();
        let nonce = call.header_value("BinancePay-Nonce").unwrap();
        let crate::transport::RequestBody::RawJson(payload) = &call.body else {
            panic!("expected raw JSON body");
        };
        assert_eq!(
            call.header_value("BinancePay-Signature").unwrap(),
            binance_signature("test-secret-key", timestamp, nonce, payload)
        );
        assert_eq!(call.header_value("BinancePay-Certificate-SN"), Some("bn-api-key"));

        let body = call.json_body().unwrap();
        assert_eq!(body["currency"], "USDT");
        assert_eq!(body["merchantTradeNo"], "VT1700000000000");
        assert_eq!(body["webhookUrl"], "https://vt.example.com/api/webhooks/binance");
    }

    #[tokio::test]
    async fn test_non_success_status_on_http_200_is_failure() {
        let mock = Arc::new(MockTransport::new().respond(ORDER_URL, 200, json!({
            "status": "FAIL",
            "code": "400201",
            "errorMessage": "merchantTradeNo is invalid or duplicated"
        })));
        let adapter = BinancePayAdapter::new(config(), mock);
        let ctx = fixtures::context(PaymentMethod::Binance, "https://vt.example.com");

        let err = adapter.create_checkout(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("duplicated"));
    }

    #[tokio::test]
    async fn test_crypto_currency_required() {
        let mock = Arc::new(MockTransport::new());
        let adapter = BinancePayAdapter::new(config(), mock.clone());
        let mut ctx = fixtures::context(PaymentMethod::Binance, "https://vt.example.com");
        ctx.request.crypto_currency = None;

        let err = adapter.create_checkout(&ctx).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
