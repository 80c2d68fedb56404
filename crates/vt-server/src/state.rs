//! Application State

use std::sync::Arc;

use vt_market::MarketSource;
use vt_payments::{
    CheckoutDispatcher, EntitlementStore, EpaycoWebhook, HttpTransport, OrderStore,
    PaymentsConfig, Settlement, StripeWebhook,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Validates requests and routes them to the gateway adapters
    pub dispatcher: Arc<CheckoutDispatcher>,

    pub epayco: Arc<EpaycoWebhook>,

    /// Stripe receiver (answers 503 without a signing secret)
    pub stripe: Arc<StripeWebhook>,

    /// Market data upstream
    pub market: Arc<dyn MarketSource>,
}

impl AppState {
    /// Wire dispatcher and webhook receivers over shared stores
    pub fn new(
        config: &PaymentsConfig,
        transport: Arc<dyn HttpTransport>,
        orders: Arc<dyn OrderStore>,
        entitlements: Arc<dyn EntitlementStore>,
        market: Arc<dyn MarketSource>,
    ) -> Self {
        let settlement = Arc::new(Settlement::new(
            orders.clone(),
            entitlements,
            config.extension_policy,
        ));

        Self {
            dispatcher: Arc::new(CheckoutDispatcher::new(config, transport, orders)),
            epayco: Arc::new(EpaycoWebhook::new(
                config.epayco_webhook.clone(),
                settlement.clone(),
            )),
            stripe: Arc::new(StripeWebhook::new(
                config.stripe_webhook_secret.clone(),
                settlement,
            )),
            market,
        }
    }
}
