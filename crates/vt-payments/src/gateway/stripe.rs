//! Stripe Checkout (Hosted)
//!
//! One-shot `payment` mode Checkout Session with a single synthesized line
//! item. The session id is the correlation id; metadata carries `orderId`,
//! `userId` and `months` for the webhook.

use async_trait::async_trait;
use ::stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, Metadata,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::GatewayAdapter;
use crate::checkout::{CheckoutContext, GatewaySession, PaymentMethod};
use crate::config::{Lookup, var};
use crate::error::{PaymentError, Result};

const PROVIDER: &str = "Stripe";

/// Stripe credentials
#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    /// API host override, e.g. a local stripe-mock
    pub api_base: Option<String>,
}

impl StripeConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        let secret_key = var(lookup, "STRIPE_SECRET_KEY")?;
        let api_base = var(lookup, "STRIPE_API_BASE").filter(|base| {
            let valid = reqwest::Url::parse(base).is_ok();
            if !valid {
                tracing::warn!(api_base = %base, "Ignoring unparseable STRIPE_API_BASE");
            }
            valid
        });

        Some(Self { secret_key, api_base })
    }

    fn client(&self) -> Client {
        match &self.api_base {
            Some(base) => Client::from_url(base.as_str(), self.secret_key.as_str()),
            None => Client::new(self.secret_key.as_str()),
        }
    }
}

/// Stripe adapter
pub struct StripeAdapter {
    client: Option<Client>,
}

impl StripeAdapter {
    pub fn new(config: Option<StripeConfig>) -> Self {
        Self {
            client: config.as_ref().map(StripeConfig::client),
        }
    }

    /// `round(total × 100)`, half away from zero
    pub fn unit_amount_cents(total: Decimal) -> Result<i64> {
        (total * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| PaymentError::InvalidRequest("amount out of range".into()))
    }

    fn metadata(ctx: &CheckoutContext) -> Metadata {
        let request = &ctx.request;
        Metadata::from([
            ("orderId".to_string(), ctx.order_id.clone()),
            ("userId".to_string(), request.user_id_or_guest().to_string()),
            ("months".to_string(), request.months.to_string()),
        ])
    }

    fn line_item(ctx: &CheckoutContext) -> Result<CreateCheckoutSessionLineItems> {
        let request = &ctx.request;

        Ok(CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(Self::unit_amount_cents(request.total_amount)?),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.description(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

#[async_trait]
impl GatewayAdapter for StripeAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Stripe
    }

    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn create_checkout(&self, ctx: &CheckoutContext) -> Result<GatewaySession> {
        let client = self
            .client
            .as_ref()
            .ok_or(PaymentError::NotConfigured(PROVIDER))?;

        let email = ctx.request.customer_info.email.trim();

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(ctx.urls.success_url.as_str());
        params.cancel_url = Some(ctx.urls.cancel_url.as_str());
        params.client_reference_id = Some(ctx.order_id.as_str());
        params.customer_email = Some(email).filter(|e| !e.is_empty());
        params.line_items = Some(vec![Self::line_item(ctx)?]);
        params.metadata = Some(Self::metadata(ctx));

        let session = CheckoutSession::create(client, params)
            .await
            .map_err(|e| PaymentError::provider(PROVIDER, e.to_string()))?;

        let checkout_url = session
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PaymentError::provider(PROVIDER, "No checkout URL returned"))?;

        tracing::info!(order_id = %ctx.order_id, session_id = %session.id, "Stripe session created");

        Ok(GatewaySession {
            checkout_url,
            provider_ref: session.id.to_string(),
        })
    }
}
