//! # vt-payments
//!
//! Premium subscription checkout across five payment gateways, plus the
//! webhook bookkeeping that turns confirmed payments into premium time.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   ┌────────────────────┐   ┌─────────────────┐
//! │  Checkout   │──▶│ CheckoutDispatcher │──▶│ Provider hosted │
//! │    form     │   │  (pending order)   │   │   payment page  │
//! └─────────────┘   └────────────────────┘   └────────┬────────┘
//!                                                     │ webhook
//!                                                     ▼
//!                   ┌────────────────────┐   ┌─────────────────┐
//!                   │     Settlement     │◀──│ Webhook receiver│
//!                   │ order/tx/premium   │   │ (ePayco/Stripe) │
//!                   └────────────────────┘   └─────────────────┘
//! ```
//!
//! Gateways: Stripe Checkout, PayPal Orders, Bold payment links, ePayco
//! collection links and Binance Pay. All provider HTTP goes through the
//! [`HttpTransport`] seam.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vt_payments::{CheckoutDispatcher, MemoryStore, PaymentsConfig, ReqwestTransport};
//!
//! let config = PaymentsConfig::from_env()?;
//! let store = Arc::new(MemoryStore::new());
//! let dispatcher = CheckoutDispatcher::new(&config, Arc::new(ReqwestTransport::new()), store);
//!
//! let response = dispatcher.create_payment_checkout(request).await;
//! // Redirect the buyer to: response.checkout_url
//! ```

mod checkout;
mod config;
mod dispatcher;
mod entitlement;
mod error;
pub mod gateway;
mod pricing;
mod store;
pub mod transport;
pub mod webhook;

pub use checkout::{
    CallbackUrls, CheckoutContext, CustomerInfo, GUEST_USER, GatewaySession, PLAN_CURRENCY,
    PaymentMethod, PaymentRequest, PaymentResponse, plan_description,
};
pub use config::{DEFAULT_BASE_URL, Lookup, PaymentsConfig};
pub use dispatcher::{CheckoutDispatcher, OrderIdGenerator};
pub use entitlement::{ExtensionPolicy, PremiumEntitlement};
pub use error::{PaymentError, Result};
pub use gateway::GatewayAdapter;
pub use pricing::PlanCatalog;
pub use store::{EntitlementStore, MemoryStore, Order, OrderStatus, OrderStore, Transaction};
pub use transport::{HttpTransport, MockTransport, ReqwestTransport};
pub use webhook::{
    EpaycoWebhook, EpaycoWebhookConfig, PaymentOutcome, PaymentState, Settlement,
    SettlementReport, StripeWebhook, WebhookReply,
};
