//! Bold Payment Links (Colombia)
//!
//! Discovers the merchant's enabled payment methods, then creates a
//! `CLOSE` amount payment link. Discovery never fails the checkout: any
//! problem falls back to [`FALLBACK_PAYMENT_METHODS`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GatewayAdapter, amount_number, ensure_success, parse_body};
use crate::checkout::{CheckoutContext, GatewaySession, PaymentMethod};
use crate::config::{Lookup, var};
use crate::error::{PaymentError, Result};
use crate::transport::{HttpRequest, HttpTransport};

const PROVIDER: &str = "Bold";
const API_URL: &str = "https://integrations.api.bold.co/online/link/v1";

/// Used when the discovery endpoint is unavailable
pub const FALLBACK_PAYMENT_METHODS: [&str; 4] = ["CREDIT_CARD", "PSE", "BOTON_BANCOLOMBIA", "NEQUI"];

/// Bold credentials
#[derive(Clone, Debug)]
pub struct BoldConfig {
    pub api_key: String,
}

impl BoldConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        var(lookup, "BOLD_API_KEY").map(|api_key| Self { api_key })
    }

    fn auth_header(&self) -> String {
        format!("x-api-key {}", self.api_key)
    }
}

#[derive(Deserialize)]
struct MethodsResponse {
    #[serde(default)]
    payload: MethodsPayload,
}

#[derive(Deserialize, Default)]
struct MethodsPayload {
    #[serde(default)]
    payment_methods: Vec<MethodEntry>,
}

/// Discovery returns either bare names or `{name}` objects
#[derive(Deserialize)]
#[serde(untagged)]
enum MethodEntry {
    Name(String),
    Object { name: String },
}

impl MethodEntry {
    fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Object { name } => name,
        }
    }
}

#[derive(Deserialize)]
struct LinkResponse {
    #[serde(default)]
    payload: Option<LinkPayload>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct LinkPayload {
    payment_link: String,
    url: String,
}

/// Bold adapter
pub struct BoldAdapter {
    config: Option<BoldConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl BoldAdapter {
    pub fn new(config: Option<BoldConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Enabled payment methods, or the fallback list
    async fn payment_methods(&self, config: &BoldConfig) -> Vec<String> {
        let fallback = || -> Vec<String> {
            FALLBACK_PAYMENT_METHODS.iter().map(ToString::to_string).collect()
        };

        let request = HttpRequest::get(format!("{API_URL}/payment_methods"))
            .header("Authorization", config.auth_header());

        let response = match self.transport.send(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                tracing::warn!(status = response.status, "Bold method discovery failed, using fallback");
                return fallback();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Bold method discovery failed, using fallback");
                return fallback();
            }
        };

        match response.json::<MethodsResponse>() {
            Ok(parsed) if !parsed.payload.payment_methods.is_empty() => parsed
                .payload
                .payment_methods
                .into_iter()
                .map(MethodEntry::into_name)
                .collect(),
            _ => {
                tracing::warn!("Bold method discovery returned nothing usable, using fallback");
                fallback()
            }
        }
    }

    fn link_body(ctx: &CheckoutContext, methods: &[String]) -> serde_json::Value {
        let request = &ctx.request;
        let mut body = json!({
            "amount_type": "CLOSE",
            "amount": {
                "currency": request.currency,
                "total_amount": amount_number(request.total_amount),
                "tip_amount": 0,
                "taxes": [],
            },
            "reference": ctx.order_id,
            "description": request.description(),
            "payment_methods": methods,
            "payer_email": request.customer_info.email,
        });

        if let Some(callback) = &ctx.urls.webhook_url {
            body["callback_url"] = json!(callback);
        }
        body
    }
}

#[async_trait]
impl GatewayAdapter for BoldAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Bold
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn create_checkout(&self, ctx: &CheckoutContext) -> Result<GatewaySession> {
        let config = self
            .config
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PROVIDER))?;

        let methods = self.payment_methods(config).await;

        let request = HttpRequest::post(API_URL)
            .header("Authorization", config.auth_header())
            .json(Self::link_body(ctx, &methods));

        let response = self.transport.send(request).await?;
        ensure_success(PROVIDER, &response)?;
        let link: LinkResponse = parse_body(PROVIDER, &response)?;

        if !link.errors.is_empty() {
            tracing::error!(errors = ?link.errors, "Bold rejected the payment link");
            return Err(PaymentError::provider(PROVIDER, "payment link rejected"));
        }

        let payload = link
            .payload
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No payment link returned"))?;
        let checkout_url = Some(payload.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No checkout URL returned"))?;

        tracing::info!(order_id = %ctx.order_id, link_id = %payload.payment_link, "Bold link created");

        Ok(GatewaySession {
            checkout_url,
            provider_ref: payload.payment_link,
        })
    }
}
