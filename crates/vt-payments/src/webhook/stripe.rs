//! Stripe Webhook Handling
//!
//! Checkout Session events, verified with the endpoint signing secret. The
//! session metadata written at checkout (`orderId`, `userId`, `months`)
//! drives settlement.

use std::sync::Arc;

use ::stripe::{CheckoutSession, CheckoutSessionPaymentStatus, Event, EventObject, EventType, Webhook};
use rust_decimal::Decimal;
use serde_json::json;

use super::{PaymentOutcome, PaymentState, Settlement, WebhookReply};
use crate::checkout::PaymentMethod;
use crate::error::{PaymentError, Result};

/// Settlement state for a Checkout Session event, `None` if not handled
fn state_for(event_type: &EventType, paid: bool) -> Option<PaymentState> {
    match event_type {
        EventType::CheckoutSessionCompleted if paid => Some(PaymentState::Accepted),
        EventType::CheckoutSessionCompleted => Some(PaymentState::Pending),
        EventType::CheckoutSessionAsyncPaymentSucceeded => Some(PaymentState::Accepted),
        EventType::CheckoutSessionAsyncPaymentFailed | EventType::CheckoutSessionExpired => {
            Some(PaymentState::Failed)
        }
        _ => None,
    }
}

fn state_label(state: PaymentState) -> &'static str {
    match state {
        PaymentState::Accepted => "accepted",
        PaymentState::Failed => "failed",
        PaymentState::Pending => "pending",
        PaymentState::Unknown => "unknown",
    }
}

/// Stripe webhook receiver
pub struct StripeWebhook {
    secret: Option<String>,
    settlement: Arc<Settlement>,
}

impl StripeWebhook {
    pub fn new(secret: Option<String>, settlement: Arc<Settlement>) -> Self {
        Self { secret, settlement }
    }

    pub const fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str) -> Result<Event> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(PaymentError::NotConfigured("Stripe webhook"))?;

        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Verify, parse and settle one delivery
    pub async fn handle(&self, payload: &str, signature: Option<&str>) -> WebhookReply {
        if !self.is_enabled() {
            return WebhookReply::error(503, "Stripe webhook not configured");
        }

        let Some(signature) = signature else {
            tracing::warn!("Stripe webhook without signature header");
            return WebhookReply::bad_request("Missing stripe-signature header");
        };

        let event = match self.parse_event(payload, signature) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected Stripe webhook");
                return WebhookReply::bad_request("Invalid signature");
            }
        };

        tracing::info!(event_id = %event.id, event_type = %event.type_, "Processing Stripe webhook");

        let EventObject::CheckoutSession(session) = &event.data.object else {
            tracing::debug!(event_type = %event.type_, "Unhandled webhook event");
            return WebhookReply::acknowledged();
        };

        let paid = matches!(session.payment_status, CheckoutSessionPaymentStatus::Paid);
        let Some(state) = state_for(&event.type_, paid) else {
            tracing::debug!(event_type = %event.type_, "Unhandled webhook event");
            return WebhookReply::acknowledged();
        };

        let Some(outcome) = outcome_from_session(session, state, &event) else {
            tracing::warn!(session_id = %session.id, "Checkout session carries no order id");
            return WebhookReply::acknowledged();
        };

        let report = self.settlement.apply(&outcome).await;
        let reply = WebhookReply::received(
            &outcome.order_id,
            state_label(state),
            outcome.provider_transaction_id.as_deref(),
        );

        if report.has_write_failure() {
            reply.with_processing_error()
        } else {
            reply
        }
    }
}

fn outcome_from_session(
    session: &CheckoutSession,
    state: PaymentState,
    event: &Event,
) -> Option<PaymentOutcome> {
    let metadata = |key: &str| {
        session
            .metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .filter(|v| !v.is_empty())
            .cloned()
    };

    let order_id = metadata("orderId").or_else(|| session.client_reference_id.clone())?;

    Some(PaymentOutcome {
        gateway: PaymentMethod::Stripe,
        order_id,
        state,
        user_id: metadata("userId"),
        months: metadata("months").and_then(|m| m.parse().ok()),
        amount: session.amount_total.map(|cents| Decimal::new(cents, 2)),
        currency: session.currency.as_ref().map(|c| c.to_string().to_uppercase()),
        provider_transaction_id: session
            .payment_intent
            .as_ref()
            .map(|pi| pi.id().to_string())
            .or_else(|| Some(session.id.to_string())),
        raw_payload: json!({
            "eventId": event.id.to_string(),
            "eventType": event.type_.to_string(),
            "sessionId": session.id.to_string(),
        }),
    })
}
