//! ePayco Confirmation Webhook
//!
//! ePayco posts the transaction result as form fields (or JSON). `x_extra1`
//! and `x_extra2` carry back the months and user id set on the payment link.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use super::{PaymentOutcome, PaymentState, Settlement, WebhookReply};
use crate::checkout::PaymentMethod;
use crate::config::{Lookup, flag, var};

/// Merchant credentials used to sign confirmations
#[derive(Clone, Debug)]
pub struct EpaycoSignatureKey {
    pub customer_id: String,
    pub p_key: String,
}

/// Confirmation verification settings
#[derive(Clone, Debug, Default)]
pub struct EpaycoWebhookConfig {
    /// `None` disables signature verification
    pub signature_key: Option<EpaycoSignatureKey>,
    /// Test mode accepts unsigned confirmations
    pub test_mode: bool,
}

impl EpaycoWebhookConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let signature_key = var(lookup, "EPAYCO_CUSTOMER_ID")
            .zip(var(lookup, "EPAYCO_P_KEY"))
            .map(|(customer_id, p_key)| EpaycoSignatureKey { customer_id, p_key });

        Self {
            signature_key,
            test_mode: flag(lookup, "EPAYCO_TEST_MODE"),
        }
    }
}

/// Lowercase hex SHA-256 over
/// `"{customer_id}^{p_key}^{ref_payco}^{transaction_id}^{amount}^{currency}"`
pub fn epayco_signature(
    key: &EpaycoSignatureKey,
    ref_payco: &str,
    transaction_id: &str,
    amount: &str,
    currency: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}^{}^{ref_payco}^{transaction_id}^{amount}^{currency}",
        key.customer_id, key.p_key
    ));
    hex::encode(hasher.finalize())
}

fn constant_time_eq(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }

    expected
        .as_bytes()
        .iter()
        .zip(provided.as_bytes())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn state_of(raw: &str) -> PaymentState {
    match raw {
        "Aceptada" => PaymentState::Accepted,
        "Rechazada" | "Fallida" => PaymentState::Failed,
        "Pendiente" => PaymentState::Pending,
        _ => PaymentState::Unknown,
    }
}

/// ePayco confirmation receiver
pub struct EpaycoWebhook {
    config: EpaycoWebhookConfig,
    settlement: Arc<Settlement>,
}

impl EpaycoWebhook {
    pub fn new(config: EpaycoWebhookConfig, settlement: Arc<Settlement>) -> Self {
        Self { config, settlement }
    }

    /// Verify and settle a POSTed confirmation
    pub async fn handle_confirmation(&self, fields: &HashMap<String, String>) -> WebhookReply {
        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let (Some(order_id), Some(raw_state)) = (field("x_id_invoice"), field("x_transaction_state"))
        else {
            tracing::warn!("ePayco confirmation missing x_id_invoice or x_transaction_state");
            return WebhookReply::bad_request("Missing required fields");
        };

        let transaction_id = field("x_transaction_id");

        let verify_with = self
            .config
            .signature_key
            .as_ref()
            .filter(|_| !self.config.test_mode)
            .zip(field("x_signature"));

        if let Some((key, provided)) = verify_with {
            let expected = epayco_signature(
                key,
                field("x_ref_payco").unwrap_or(order_id),
                transaction_id.unwrap_or_default(),
                field("x_amount").unwrap_or_default(),
                field("x_currency_code").unwrap_or_default(),
            );

            if !constant_time_eq(&expected, &provided.to_lowercase()) {
                tracing::warn!(%order_id, "ePayco signature mismatch");
                return WebhookReply::forbidden("Invalid signature");
            }
        }

        let state = state_of(raw_state);
        tracing::info!(%order_id, state = %raw_state, transaction_id = ?transaction_id, "ePayco confirmation");

        let reply = WebhookReply::received(order_id, raw_state, transaction_id);
        if state == PaymentState::Unknown {
            tracing::warn!(%order_id, state = %raw_state, "Unrecognized ePayco state, acknowledged without changes");
            return reply;
        }

        let outcome = PaymentOutcome {
            gateway: PaymentMethod::Epayco,
            order_id: order_id.to_string(),
            state,
            user_id: field("x_extra2").map(ToString::to_string),
            months: field("x_extra1").and_then(|m| m.parse().ok()),
            amount: field("x_amount").and_then(|a| a.parse::<Decimal>().ok()),
            currency: field("x_currency_code").map(ToString::to_string),
            provider_transaction_id: transaction_id.map(ToString::to_string),
            raw_payload: serde_json::to_value(fields).unwrap_or_default(),
        };

        let report = self.settlement.apply(&outcome).await;
        if report.has_write_failure() {
            reply.with_processing_error()
        } else {
            reply
        }
    }

    /// Acknowledge a GET notification; nothing is written
    pub fn acknowledge_query(&self, fields: &HashMap<String, String>) -> WebhookReply {
        let order_id = fields.get("x_id_invoice").map_or("", String::as_str);
        let state = fields.get("x_transaction_state").map_or("", String::as_str);
        tracing::info!(%order_id, %state, "ePayco GET notification acknowledged");

        WebhookReply::received(
            order_id,
            state,
            fields.get("x_transaction_id").map(String::as_str),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Months, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::entitlement::ExtensionPolicy;
    use crate::store::{EntitlementStore, FailingStore, MemoryStore, Order, OrderStatus, OrderStore};
    use crate::webhook::INTERNAL_PROCESSING_ERROR;

    fn key() -> EpaycoSignatureKey {
        EpaycoSignatureKey {
            customer_id: "12345".into(),
            p_key: "pkey-abc".into(),
        }
    }

    fn signed_config() -> EpaycoWebhookConfig {
        EpaycoWebhookConfig {
            signature_key: Some(key()),
            test_mode: false,
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn accepted_fields() -> HashMap<String, String> {
        fields(&[
            ("x_id_invoice", "VT-1700000000000"),
            ("x_ref_payco", "ref-777"),
            ("x_transaction_id", "tx-555"),
            ("x_transaction_state", "Aceptada"),
            ("x_amount", "12.99"),
            ("x_currency_code", "USD"),
            ("x_extra1", "3"),
            ("x_extra2", "user-123"),
        ])
    }

    async fn receiver(config: EpaycoWebhookConfig) -> (EpaycoWebhook, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let order = Order::pending(
            "VT-1700000000000",
            "user-123",
            3,
            dec!(12.99),
            "USD",
            PaymentMethod::Epayco,
        );
        store.create_order(&order).await.unwrap();

        let settlement = Settlement::new(store.clone(), store.clone(), ExtensionPolicy::default());
        (EpaycoWebhook::new(config, Arc::new(settlement)), store)
    }

    #[test]
    fn test_signature_vector() {
        assert_eq!(
            epayco_signature(&key(), "ref-777", "tx-555", "12.99", "USD"),
            "49b71270fd1ab4f75ea22d4e9f3161a5122ef6cb214fef7df5c5ecbae2056468"
        );
    }

    #[test]
    fn test_config_requires_both_key_parts() {
        let lookup = |name: &str| (name == "EPAYCO_P_KEY").then(|| "pkey".to_string());
        let config = EpaycoWebhookConfig::from_lookup(&lookup);
        assert!(config.signature_key.is_none());
        assert!(!config.test_mode);
    }

    #[tokio::test]
    async fn test_accepted_extends_premium_and_completes_order() {
        let (webhook, store) = receiver(signed_config()).await;
        let mut payload = accepted_fields();
        payload.insert(
            "x_signature".into(),
            "49b71270fd1ab4f75ea22d4e9f3161a5122ef6cb214fef7df5c5ecbae2056468".into(),
        );
        let before = Utc::now();

        let reply = webhook.handle_confirmation(&payload).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["received"], true);
        assert_eq!(reply.body["orderId"], "VT-1700000000000");
        assert_eq!(reply.body["transactionId"], "tx-555");
        assert!(reply.body.get("error").is_none());

        let entitlement = store.get_entitlement("user-123").await.unwrap().unwrap();
        let expected = before.checked_add_months(Months::new(3)).unwrap();
        assert!(entitlement.premium_active);
        assert!(entitlement.premium_until >= expected);
        assert!(entitlement.premium_until - expected < chrono::Duration::minutes(1));

        let order = store.get_order("VT-1700000000000").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.transaction_id.as_deref(), Some("tx-555"));

        let transactions = store.transactions_for_order("VT-1700000000000").await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, OrderStatus::Completed);
        assert_eq!(transactions[0].amount, Some(dec!(12.99)));
    }

    #[tokio::test]
    async fn test_wrong_signature_is_forbidden() {
        let (webhook, store) = receiver(signed_config()).await;
        let mut payload = accepted_fields();
        payload.insert("x_signature".into(), "0".repeat(64));

        let reply = webhook.handle_confirmation(&payload).await;
        assert_eq!(reply.status, 403);
        assert_eq!(store.transaction_count(), 0);
        assert!(store.get_entitlement("user-123").await.unwrap().is_none());
        let order = store.get_order("VT-1700000000000").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_test_mode_skips_signature() {
        let config = EpaycoWebhookConfig {
            test_mode: true,
            ..signed_config()
        };
        let (webhook, store) = receiver(config).await;
        let mut payload = accepted_fields();
        payload.insert("x_signature".into(), "bogus".into());

        let reply = webhook.handle_confirmation(&payload).await;
        assert_eq!(reply.status, 200);
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_invoice_is_bad_request() {
        let (webhook, store) = receiver(EpaycoWebhookConfig::default()).await;
        let mut payload = accepted_fields();
        payload.remove("x_id_invoice");

        let reply = webhook.handle_confirmation(&payload).await;
        assert_eq!(reply.status, 400);
        assert_eq!(store.transaction_count(), 0);
        assert!(store.get_entitlement("user-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_marks_order_failed() {
        let (webhook, store) = receiver(EpaycoWebhookConfig::default()).await;
        let mut payload = accepted_fields();
        payload.insert("x_transaction_state".into(), "Rechazada".into());

        webhook.handle_confirmation(&payload).await;

        let order = store.get_order("VT-1700000000000").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        let transactions = store.transactions_for_order("VT-1700000000000").await.unwrap();
        assert_eq!(transactions[0].status, OrderStatus::Failed);
        assert!(store.get_entitlement("user-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_is_acknowledged_without_writes() {
        let (webhook, store) = receiver(EpaycoWebhookConfig::default()).await;
        let mut payload = accepted_fields();
        payload.insert("x_transaction_state".into(), "Reversada".into());

        let reply = webhook.handle_confirmation(&payload).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["state"], "Reversada");
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_still_acknowledges() {
        let settlement = Settlement::new(
            Arc::new(FailingStore),
            Arc::new(FailingStore),
            ExtensionPolicy::default(),
        );
        let webhook = EpaycoWebhook::new(EpaycoWebhookConfig::default(), Arc::new(settlement));

        let reply = webhook.handle_confirmation(&accepted_fields()).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["received"], true);
        assert_eq!(reply.body["error"], INTERNAL_PROCESSING_ERROR);
    }

    #[tokio::test]
    async fn test_get_acknowledges_without_writes() {
        let (webhook, store) = receiver(EpaycoWebhookConfig::default()).await;

        let reply = webhook.acknowledge_query(&accepted_fields());
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["orderId"], "VT-1700000000000");
        assert_eq!(store.transaction_count(), 0);
        let order = store.get_order("VT-1700000000000").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
