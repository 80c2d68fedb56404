//! Checkout Dispatcher
//!
//! Single entry point for starting a premium checkout. Validates the
//! request, checks the price against the plan catalog, records a pending
//! order and hands off to the selected gateway adapter.
//!
//! Never returns an error: every failure becomes a
//! `PaymentResponse { success: false, error }` with a Spanish message.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures::FutureExt;
use rust_decimal::Decimal;

use crate::checkout::{
    CallbackUrls, CheckoutContext, PLAN_CURRENCY, PaymentMethod, PaymentRequest, PaymentResponse,
};
use crate::config::PaymentsConfig;
use crate::error::{PaymentError, Result};
use crate::gateway::{
    BinancePayAdapter, BoldAdapter, EpaycoAdapter, GatewayAdapter, PayPalAdapter, StripeAdapter,
};
use crate::pricing::PlanCatalog;
use crate::store::{Order, OrderStore};
use crate::transport::HttpTransport;

/// Generic message when an adapter panics
const UNEXPECTED_FAILURE: &str = "Error al procesar el pago";

/// `VT-{unix_millis}` order ids, strictly increasing within the process
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    last: AtomicU64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);

        format!("VT-{}", now.max(previous + 1))
    }
}

/// Routes checkout requests to gateway adapters
pub struct CheckoutDispatcher {
    base_url: String,
    plans: PlanCatalog,
    adapters: Vec<Box<dyn GatewayAdapter>>,
    orders: Arc<dyn OrderStore>,
    ids: OrderIdGenerator,
}

impl CheckoutDispatcher {
    /// Build the five adapters from configuration
    pub fn new(
        config: &PaymentsConfig,
        transport: Arc<dyn HttpTransport>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        let adapters: Vec<Box<dyn GatewayAdapter>> = vec![
            Box::new(StripeAdapter::new(config.stripe.clone())),
            Box::new(PayPalAdapter::new(config.paypal.clone(), transport.clone())),
            Box::new(BoldAdapter::new(config.bold.clone(), transport.clone())),
            Box::new(EpaycoAdapter::new(config.epayco.clone(), transport.clone())),
            Box::new(BinancePayAdapter::new(config.binance.clone(), transport)),
        ];

        Self::with_adapters(&config.base_url, config.plans.clone(), adapters, orders)
    }

    /// Build from explicit adapters
    pub fn with_adapters(
        base_url: &str,
        plans: PlanCatalog,
        adapters: Vec<Box<dyn GatewayAdapter>>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            plans,
            adapters,
            orders,
            ids: OrderIdGenerator::new(),
        }
    }

    /// Methods whose credentials are present
    pub fn configured_methods(&self) -> Vec<PaymentMethod> {
        self.adapters
            .iter()
            .filter(|a| a.is_configured())
            .map(|a| a.method())
            .collect()
    }

    fn adapter(&self, method: PaymentMethod) -> Option<&dyn GatewayAdapter> {
        self.adapters
            .iter()
            .find(|a| a.method() == method)
            .map(|a| &**a)
    }

    /// Start a checkout with the requested gateway
    pub async fn create_payment_checkout(&self, mut request: PaymentRequest) -> PaymentResponse {
        let method = request.method;

        let Some(adapter) = self.adapter(method) else {
            tracing::warn!(%method, "Unsupported payment method requested");
            return PaymentResponse::failure(PaymentError::UnsupportedMethod.user_message(), None);
        };

        if let Err(e) = self.validate(&request) {
            tracing::warn!(%method, months = request.months, error = %e, "Checkout request rejected");
            return PaymentResponse::failure(e.user_message(), None);
        }

        if !adapter.is_configured() {
            let err = PaymentError::NotConfigured(method.display_name());
            tracing::warn!(%method, "Checkout requested for unconfigured gateway");
            return PaymentResponse::failure(err.user_message(), None);
        }

        // Adapters forward the code as-is; providers want the upper-case ISO form
        request.currency = PLAN_CURRENCY.to_string();

        let order_id = self.ids.next_id();
        let ctx = CheckoutContext {
            urls: CallbackUrls::build(&self.base_url, method, &order_id),
            order_id: order_id.clone(),
            request,
        };

        self.record_pending(&ctx).await;

        let result = AssertUnwindSafe(adapter.create_checkout(&ctx))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(session)) => {
                if let Err(e) = self
                    .orders
                    .attach_provider_ref(&order_id, &session.provider_ref)
                    .await
                {
                    tracing::error!(%order_id, error = %e, "Failed to attach provider reference");
                }

                tracing::info!(%order_id, %method, provider_ref = %session.provider_ref, "Checkout created");
                PaymentResponse::ok(session.checkout_url, order_id)
            }
            Ok(Err(e)) => {
                tracing::error!(%order_id, %method, error = %e, "Checkout failed");
                PaymentResponse::failure(e.user_message(), Some(order_id))
            }
            Err(_) => {
                tracing::error!(%order_id, %method, "Gateway adapter panicked");
                PaymentResponse::failure(UNEXPECTED_FAILURE, Some(order_id))
            }
        }
    }

    fn validate(&self, request: &PaymentRequest) -> Result<()> {
        if request.months == 0 {
            return Err(PaymentError::InvalidRequest("la duración debe ser mayor a 0".into()));
        }
        if request.total_amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest("el monto debe ser mayor a 0".into()));
        }
        if !request.currency.eq_ignore_ascii_case(PLAN_CURRENCY) {
            return Err(PaymentError::InvalidRequest(format!(
                "moneda no soportada: {}",
                request.currency
            )));
        }
        if request.customer_info.email.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("el correo es obligatorio".into()));
        }
        if request.method == PaymentMethod::Binance && request.crypto_asset().is_none() {
            return Err(PaymentError::InvalidRequest("selecciona una criptomoneda".into()));
        }

        self.plans.verify(request.months, request.total_amount)
    }

    async fn record_pending(&self, ctx: &CheckoutContext) {
        let request = &ctx.request;
        let order = Order::pending(
            &ctx.order_id,
            request.user_id_or_guest(),
            request.months,
            request.total_amount,
            PLAN_CURRENCY,
            request.method,
        );

        if let Err(e) = self.orders.create_order(&order).await {
            tracing::error!(order_id = %ctx.order_id, error = %e, "Failed to record pending order");
        }
    }
}
