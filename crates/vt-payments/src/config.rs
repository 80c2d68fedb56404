//! Payments Configuration
//!
//! Credentials and policies read once at startup and passed into adapters
//! and webhook receivers at construction.

use crate::entitlement::ExtensionPolicy;
use crate::error::Result;
use crate::gateway::{BinanceConfig, BoldConfig, EpaycoConfig, PayPalConfig, StripeConfig};
use crate::pricing::PlanCatalog;
use crate::webhook::EpaycoWebhookConfig;

/// Environment variable lookup
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Default public base URL for local development
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Non-empty, trimmed variable
pub(crate) fn var(lookup: Lookup<'_>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `true`/`1`/`yes` (case-insensitive)
pub(crate) fn flag(lookup: Lookup<'_>, name: &str) -> bool {
    var(lookup, name).is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Everything the payments layer needs
#[derive(Clone, Debug)]
pub struct PaymentsConfig {
    /// Public URL of this application, used for return and webhook URLs
    pub base_url: String,

    pub stripe: Option<StripeConfig>,
    pub paypal: Option<PayPalConfig>,
    pub bold: Option<BoldConfig>,
    pub epayco: Option<EpaycoConfig>,
    pub binance: Option<BinanceConfig>,

    pub epayco_webhook: EpaycoWebhookConfig,

    /// Signing secret for Stripe webhook events
    pub stripe_webhook_secret: Option<String>,

    pub plans: PlanCatalog,
    pub extension_policy: ExtensionPolicy,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            stripe: None,
            paypal: None,
            bold: None,
            epayco: None,
            binance: None,
            epayco_webhook: EpaycoWebhookConfig::default(),
            stripe_webhook_secret: None,
            plans: PlanCatalog::default(),
            extension_policy: ExtensionPolicy::default(),
        }
    }
}

impl PaymentsConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// Create from an arbitrary variable source
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let base_url = var(lookup, "PUBLIC_BASE_URL")
            .or_else(|| var(lookup, "NEXT_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let plans = match var(lookup, "PLAN_PRICES") {
            Some(prices) => PlanCatalog::parse(&prices)?,
            None => PlanCatalog::default(),
        };

        let extension_policy = match var(lookup, "PREMIUM_EXTENSION_POLICY") {
            Some(policy) => policy.parse()?,
            None => ExtensionPolicy::default(),
        };

        Ok(Self {
            base_url,
            stripe: StripeConfig::from_lookup(lookup),
            paypal: PayPalConfig::from_lookup(lookup),
            bold: BoldConfig::from_lookup(lookup),
            epayco: EpaycoConfig::from_lookup(lookup),
            binance: BinanceConfig::from_lookup(lookup),
            epayco_webhook: EpaycoWebhookConfig::from_lookup(lookup),
            stripe_webhook_secret: var(lookup, "STRIPE_WEBHOOK_SECRET"),
            plans,
            extension_policy,
        })
    }
}
