//! Payment Webhooks
//!
//! Providers report the final state of a payment asynchronously. Each
//! receiver authenticates and parses its provider's payload into a
//! [`PaymentOutcome`], and [`Settlement`] applies it to the stores.
//!
//! ```text
//!   provider ──▶ EpaycoWebhook / StripeWebhook ──▶ PaymentOutcome
//!                                                      │
//!                                                      ▼
//!                                                  Settlement
//!                                      ┌───────────────┼───────────────┐
//!                                      ▼               ▼               ▼
//!                                 entitlement     order status     transaction
//! ```
//!
//! The three writes are independent. A failure in one does not stop the
//! others, and nothing is rolled back.

mod epayco;
mod stripe;

pub use self::epayco::{EpaycoSignatureKey, EpaycoWebhook, EpaycoWebhookConfig, epayco_signature};
pub use self::stripe::StripeWebhook;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use crate::checkout::{GUEST_USER, PaymentMethod};
use crate::entitlement::ExtensionPolicy;
use crate::store::{EntitlementStore, OrderStatus, OrderStore, Transaction};

/// Body error flag set when a bookkeeping write failed
pub const INTERNAL_PROCESSING_ERROR: &str = "Internal processing error";

/// Normalized provider-reported payment state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentState {
    Accepted,
    Failed,
    Pending,
    /// Anything the receiver does not act on
    Unknown,
}

/// A parsed, authenticated payment notification
#[derive(Clone, Debug)]
pub struct PaymentOutcome {
    pub gateway: PaymentMethod,
    pub order_id: String,
    pub state: PaymentState,
    /// `None` or `"guest"` means no entitlement change
    pub user_id: Option<String>,
    /// Falls back to the stored order's months, then 1
    pub months: Option<u32>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub raw_payload: serde_json::Value,
}

impl PaymentOutcome {
    fn entitled_user(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != GUEST_USER)
    }
}

/// Which settlement writes failed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettlementReport {
    pub entitlement_failed: bool,
    pub order_failed: bool,
    pub transaction_failed: bool,
    /// Id of the appended transaction record
    pub transaction_record_id: Option<String>,
}

impl SettlementReport {
    /// Order or transaction bookkeeping failed (entitlement failures are log-only)
    pub const fn has_write_failure(&self) -> bool {
        self.order_failed || self.transaction_failed
    }
}

/// HTTP status and JSON body for a webhook call
#[derive(Clone, Debug, PartialEq)]
pub struct WebhookReply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl WebhookReply {
    /// 200 `{received, orderId, state, transactionId}`
    pub fn received(order_id: &str, state: &str, transaction_id: Option<&str>) -> Self {
        Self {
            status: 200,
            body: json!({
                "received": true,
                "orderId": order_id,
                "state": state,
                "transactionId": transaction_id,
            }),
        }
    }

    /// 200 `{received: true}` for notifications that need no settlement
    pub fn acknowledged() -> Self {
        Self {
            status: 200,
            body: json!({ "received": true }),
        }
    }

    /// Flag a bookkeeping failure on an otherwise acknowledged call
    #[must_use]
    pub fn with_processing_error(mut self) -> Self {
        self.body["error"] = json!(INTERNAL_PROCESSING_ERROR);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(400, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(403, message)
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "received": false, "error": message.into() }),
        }
    }
}

/// Applies payment outcomes to the order, transaction and entitlement stores
pub struct Settlement {
    orders: Arc<dyn OrderStore>,
    entitlements: Arc<dyn EntitlementStore>,
    policy: ExtensionPolicy,
}

impl Settlement {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        entitlements: Arc<dyn EntitlementStore>,
        policy: ExtensionPolicy,
    ) -> Self {
        Self {
            orders,
            entitlements,
            policy,
        }
    }

    /// Apply an outcome; never fails, returns what went wrong
    pub async fn apply(&self, outcome: &PaymentOutcome) -> SettlementReport {
        let mut report = SettlementReport::default();

        match outcome.state {
            PaymentState::Accepted => {
                if let Some(user_id) = outcome.entitled_user() {
                    let months = self.resolve_months(outcome).await;
                    report.entitlement_failed = !self.extend_premium(user_id, months).await;
                }
                report.order_failed = !self.set_status(outcome, OrderStatus::Completed).await;
                self.record_transaction(outcome, OrderStatus::Completed, &mut report).await;
            }
            PaymentState::Failed => {
                report.order_failed = !self.set_status(outcome, OrderStatus::Failed).await;
                self.record_transaction(outcome, OrderStatus::Failed, &mut report).await;
            }
            PaymentState::Pending => {
                report.order_failed = !self.set_status(outcome, OrderStatus::Pending).await;
            }
            PaymentState::Unknown => {
                tracing::info!(order_id = %outcome.order_id, "Unhandled payment state, nothing to settle");
            }
        }

        report
    }

    async fn resolve_months(&self, outcome: &PaymentOutcome) -> u32 {
        if let Some(months) = outcome.months.filter(|m| *m > 0) {
            return months;
        }

        match self.orders.get_order(&outcome.order_id).await {
            Ok(Some(order)) if order.months > 0 => order.months,
            Ok(_) => 1,
            Err(e) => {
                tracing::warn!(order_id = %outcome.order_id, error = %e, "Order lookup failed, defaulting to 1 month");
                1
            }
        }
    }

    async fn extend_premium(&self, user_id: &str, months: u32) -> bool {
        let current = match self.entitlements.get_entitlement(user_id).await {
            Ok(current) => current,
            Err(e) => {
                tracing::error!(%user_id, error = %e, "Failed to read premium entitlement");
                return false;
            }
        };

        let next = self.policy.extend(current.as_ref(), months, Utc::now());
        match self.entitlements.set_entitlement(user_id, &next).await {
            Ok(()) => {
                tracing::info!(
                    %user_id,
                    months,
                    premium_until = %next.premium_until,
                    policy = self.policy.as_str(),
                    "Premium extended"
                );
                true
            }
            Err(e) => {
                tracing::error!(%user_id, error = %e, "Failed to write premium entitlement");
                false
            }
        }
    }

    async fn set_status(&self, outcome: &PaymentOutcome, status: OrderStatus) -> bool {
        let result = self
            .orders
            .update_order_status(
                &outcome.order_id,
                status,
                outcome.provider_transaction_id.as_deref(),
            )
            .await;

        match result {
            Ok(()) => {
                tracing::info!(order_id = %outcome.order_id, status = status.as_str(), "Order updated");
                true
            }
            Err(e) => {
                tracing::error!(order_id = %outcome.order_id, error = %e, "Failed to update order");
                false
            }
        }
    }

    async fn record_transaction(
        &self,
        outcome: &PaymentOutcome,
        status: OrderStatus,
        report: &mut SettlementReport,
    ) {
        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: outcome.order_id.clone(),
            user_id: outcome.user_id.clone().unwrap_or_else(|| GUEST_USER.into()),
            gateway: outcome.gateway,
            status,
            amount: outcome.amount,
            currency: outcome.currency.clone(),
            provider_transaction_id: outcome.provider_transaction_id.clone(),
            raw_payload: outcome.raw_payload.clone(),
            created_at: Utc::now(),
        };

        match self.orders.append_transaction(&transaction).await {
            Ok(id) => report.transaction_record_id = Some(id),
            Err(e) => {
                tracing::error!(order_id = %outcome.order_id, error = %e, "Failed to record transaction");
                report.transaction_failed = true;
            }
        }
    }
}
