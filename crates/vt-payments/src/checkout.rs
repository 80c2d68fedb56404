//! Checkout Request/Response Types
//!
//! The normalized shapes every gateway adapter consumes and produces.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User id recorded when the buyer is not signed in
pub const GUEST_USER: &str = "guest";

/// Only currency the plans are sold in
pub const PLAN_CURRENCY: &str = "USD";

/// Supported payment gateways
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Bold,
    Epayco,
    Binance,
    /// Anything else the client sent
    #[serde(other)]
    Unsupported,
}

impl PaymentMethod {
    /// The five gateways, in display order
    pub const ALL: [Self; 5] = [
        Self::Stripe,
        Self::Paypal,
        Self::Bold,
        Self::Epayco,
        Self::Binance,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Paypal => "paypal",
            Self::Bold => "bold",
            Self::Epayco => "epayco",
            Self::Binance => "binance",
            Self::Unsupported => "unsupported",
        }
    }

    /// Confirmation route served by this application, if any
    pub const fn webhook_path(&self) -> Option<&'static str> {
        match self {
            Self::Epayco => Some("/api/webhooks/epayco"),
            Self::Stripe => Some("/api/webhooks/stripe"),
            _ => None,
        }
    }

    /// Provider display name used in logs and user messages
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Stripe => "Stripe",
            Self::Paypal => "PayPal",
            Self::Bold => "Bold",
            Self::Epayco => "ePayco",
            Self::Binance => "Binance Pay",
            Self::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buyer details collected by the checkout form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Request to start a premium checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Gateway to use
    pub method: PaymentMethod,

    /// Subscription duration
    pub months: u32,

    /// Total charged, in USD
    pub total_amount: Decimal,

    /// Always "USD"
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Signed-in user, if any
    #[serde(default)]
    pub user_id: Option<String>,

    pub customer_info: CustomerInfo,

    /// Asset to charge in (Binance Pay only)
    #[serde(default)]
    pub crypto_currency: Option<String>,
}

fn default_currency() -> String {
    PLAN_CURRENCY.to_string()
}

impl PaymentRequest {
    /// User id, or "guest" when absent or blank
    pub fn user_id_or_guest(&self) -> &str {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(GUEST_USER)
    }

    /// Upper-cased crypto asset, if a non-blank one was sent
    pub fn crypto_asset(&self) -> Option<String> {
        self.crypto_currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    }

    /// Spanish line-item description, pluralized on the month count
    pub fn description(&self) -> String {
        plan_description(self.months)
    }
}

/// "Suscripción Premium - 1 mes" / "Suscripción Premium - 3 meses"
pub fn plan_description(months: u32) -> String {
    let unit = if months == 1 { "mes" } else { "meses" };
    format!("Suscripción Premium - {months} {unit}")
}

/// Normalized result of a checkout attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentResponse {
    pub fn ok(checkout_url: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            checkout_url: Some(checkout_url.into()),
            order_id: Some(order_id.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, order_id: Option<String>) -> Self {
        Self {
            success: false,
            checkout_url: None,
            order_id,
            error: Some(error.into()),
        }
    }
}

/// Return and callback URLs for one checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackUrls {
    pub success_url: String,
    pub cancel_url: String,
    /// Only set when the public base URL is HTTPS and this application
    /// serves a confirmation route for the method
    pub webhook_url: Option<String>,
}

impl CallbackUrls {
    /// Build URLs back into this application for `order_id`
    pub fn build(base_url: &str, method: PaymentMethod, order_id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let webhook_url = method
            .webhook_path()
            .filter(|_| base.starts_with("https://"))
            .map(|path| format!("{base}{path}"));

        Self {
            success_url: format!(
                "{base}/premium/success?orderId={order_id}&method={}",
                method.as_str()
            ),
            cancel_url: format!("{base}/premium?canceled=1&orderId={order_id}"),
            webhook_url,
        }
    }
}

/// Everything an adapter needs for one checkout
#[derive(Clone, Debug)]
pub struct CheckoutContext {
    pub order_id: String,
    pub request: PaymentRequest,
    pub urls: CallbackUrls,
}

/// What a provider returned for a created checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewaySession {
    /// Hosted payment page
    pub checkout_url: String,
    /// Provider correlation id (session, order, link or prepay id)
    pub provider_ref: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_decimal_macros::dec;

    use super::*;

    pub fn request(method: PaymentMethod) -> PaymentRequest {
        PaymentRequest {
            method,
            months: 3,
            total_amount: dec!(12.99),
            currency: PLAN_CURRENCY.into(),
            user_id: Some("user-123".into()),
            customer_info: CustomerInfo {
                name: "María Pérez".into(),
                email: "maria@example.com".into(),
                phone: Some("+584121234567".into()),
                ..Default::default()
            },
            crypto_currency: (method == PaymentMethod::Binance).then(|| "USDT".into()),
        }
    }

    pub fn context(method: PaymentMethod, base_url: &str) -> CheckoutContext {
        CheckoutContext {
            order_id: "VT-1700000000000".into(),
            request: request(method),
            urls: CallbackUrls::build(base_url, method, "VT-1700000000000"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_method_deserializes_to_unsupported() {
        let method: PaymentMethod = serde_json::from_str("\"zelle\"").unwrap();
        assert_eq!(method, PaymentMethod::Unsupported);

        let method: PaymentMethod = serde_json::from_str("\"epayco\"").unwrap();
        assert_eq!(method, PaymentMethod::Epayco);
    }

    #[test]
    fn test_description_pluralization() {
        assert_eq!(plan_description(1), "Suscripción Premium - 1 mes");
        assert_eq!(plan_description(6), "Suscripción Premium - 6 meses");
    }

    #[test]
    fn test_guest_fallback() {
        let mut request = fixtures::request(PaymentMethod::Stripe);
        request.user_id = None;
        assert_eq!(request.user_id_or_guest(), GUEST_USER);
        request.user_id = Some("  ".into());
        assert_eq!(request.user_id_or_guest(), GUEST_USER);
    }

    #[test]
    fn test_webhook_url_only_on_https() {
        let urls = CallbackUrls::build("https://vt.example.com/", PaymentMethod::Epayco, "VT-1");
        assert_eq!(
            urls.webhook_url.as_deref(),
            Some("https://vt.example.com/api/webhooks/epayco")
        );
        assert!(urls.success_url.starts_with("https://vt.example.com/premium/success"));

        let local = CallbackUrls::build("http://localhost:3000", PaymentMethod::Epayco, "VT-1");
        assert!(local.webhook_url.is_none());
    }

    #[test]
    fn test_no_webhook_url_without_receiver() {
        let urls = CallbackUrls::build("https://vt.example.com", PaymentMethod::Bold, "VT-1");
        assert!(urls.webhook_url.is_none());
    }

    #[test]
    fn test_request_json_shape() {
        let json = serde_json::json!({
            "method": "binance",
            "months": 1,
            "totalAmount": 4.99,
            "customerInfo": { "name": "Ana", "email": "ana@example.com" },
            "cryptoCurrency": "USDT"
        });
        let request: PaymentRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.currency, "USD");
        assert_eq!(request.crypto_currency.as_deref(), Some("USDT"));
        assert_eq!(request.user_id_or_guest(), GUEST_USER);
    }

    #[test]
    fn test_failure_response_omits_url() {
        let response = PaymentResponse::failure("boom", None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("checkoutUrl").is_none());
        assert_eq!(json["error"], "boom");
    }
}
