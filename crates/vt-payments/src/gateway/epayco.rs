//! ePayco Collection Links
//!
//! Logs in with the public/private key pair, then creates a hosted payment
//! link. ePayco has no metadata map, so `months` and `userId` travel in the
//! opaque `extra1`/`extra2` fields and come back on the confirmation webhook.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GatewayAdapter, amount_2dp, ensure_success, parse_body};
use crate::checkout::{CheckoutContext, GatewaySession, PaymentMethod};
use crate::config::{Lookup, flag, var};
use crate::error::{PaymentError, Result};
use crate::transport::{HttpRequest, HttpTransport};

const PROVIDER: &str = "ePayco";
const API_URL: &str = "https://apify.epayco.co";

/// ePayco credentials
#[derive(Clone, Debug)]
pub struct EpaycoConfig {
    pub public_key: String,
    pub private_key: String,
    /// Create links in test mode
    pub test_mode: bool,
}

impl EpaycoConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        Some(Self {
            public_key: var(lookup, "EPAYCO_PUBLIC_KEY")?,
            private_key: var(lookup, "EPAYCO_PRIVATE_KEY")?,
            test_mode: flag(lookup, "EPAYCO_TEST_MODE"),
        })
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

#[derive(Deserialize)]
struct LinkResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<LinkData>,
    #[serde(default, alias = "textResponse")]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkData {
    #[serde(alias = "link")]
    route_link: Option<String>,
    #[serde(default)]
    id: serde_json::Value,
}

/// ePayco adapter
pub struct EpaycoAdapter {
    config: Option<EpaycoConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl EpaycoAdapter {
    pub fn new(config: Option<EpaycoConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    async fn login(&self, config: &EpaycoConfig) -> Result<String> {
        let request = HttpRequest::post(format!("{API_URL}/login"))
            .basic(&config.public_key, &config.private_key);

        let response = self.transport.send(request).await?;
        ensure_success(PROVIDER, &response)?;
        let login: LoginResponse = parse_body(PROVIDER, &response)?;

        login
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PaymentError::provider(PROVIDER, "login returned no token"))
    }

    fn link_body(ctx: &CheckoutContext, test_mode: bool) -> serde_json::Value {
        let request = &ctx.request;
        let description = request.description();
        let mut body = json!({
            "quantity": 1,
            "onePayment": true,
            "amount": amount_2dp(request.total_amount),
            "currency": request.currency,
            "id": 0,
            "base": "0",
            "tax": "0",
            "title": description,
            "description": description,
            "typeSell": "2",
            "reference": ctx.order_id,
            "email": request.customer_info.email,
            "test": test_mode,
            "extra1": request.months.to_string(),
            "extra2": request.user_id_or_guest(),
            "extra3": ctx.order_id,
            "urlResponse": ctx.urls.success_url,
        });

        if let Some(confirmation) = &ctx.urls.webhook_url {
            body["urlConfirmation"] = json!(confirmation);
        }
        body
    }
}

#[async_trait]
impl GatewayAdapter for EpaycoAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Epayco
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn create_checkout(&self, ctx: &CheckoutContext) -> Result<GatewaySession> {
        let config = self
            .config
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PROVIDER))?;

        let token = self.login(config).await?;

        let request = HttpRequest::post(format!("{API_URL}/collection/link/create"))
            .bearer(token)
            .json(Self::link_body(ctx, config.test_mode));

        let response = self.transport.send(request).await?;
        ensure_success(PROVIDER, &response)?;
        let link: LinkResponse = parse_body(PROVIDER, &response)?;

        if !link.success {
            let message = link.message.unwrap_or_else(|| "link creation rejected".into());
            tracing::error!(order_id = %ctx.order_id, %message, "ePayco rejected the link");
            return Err(PaymentError::provider(PROVIDER, message));
        }

        let data = link
            .data
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No link data returned"))?;
        let checkout_url = data
            .route_link
            .filter(|l| !l.is_empty())
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No checkout URL returned"))?;

        let provider_ref = match data.id {
            serde_json::Value::String(id) => id,
            serde_json::Value::Null => ctx.order_id.clone(),
            other => other.to_string(),
        };

        tracing::info!(order_id = %ctx.order_id, link_id = %provider_ref, "ePayco link created");

        Ok(GatewaySession {
            checkout_url,
            provider_ref,
        })
    }
}
