//! Order, Transaction and Entitlement Storage
//!
//! Bookkeeping records written by the dispatcher and the webhook receivers.
//! Layout mirrors the document store: `orders/{orderId}`,
//! `transactions/{autoId}` and the premium fields of `users/{userId}`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::PaymentMethod;
use crate::entitlement::PremiumEntitlement;
use crate::error::{PaymentError, Result};

/// Order lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// An order record (`orders/{id}`)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub months: u32,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: PaymentMethod,
    pub status: OrderStatus,
    /// Provider correlation id (session, order, link or prepay id)
    pub provider_ref: Option<String>,
    /// Last provider transaction id reported by a webhook
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn pending(
        id: impl Into<String>,
        user_id: impl Into<String>,
        months: u32,
        amount: Decimal,
        currency: impl Into<String>,
        gateway: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            months,
            amount,
            currency: currency.into(),
            gateway,
            status: OrderStatus::Pending,
            provider_ref: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only webhook outcome (`transactions/{id}`)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub gateway: PaymentMethod,
    pub status: OrderStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Order and transaction storage
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write a new order
    async fn create_order(&self, order: &Order) -> Result<()>;

    /// Get order by id
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>>;

    /// Record the provider correlation id on an existing order
    async fn attach_provider_ref(&self, order_id: &str, provider_ref: &str) -> Result<()>;

    /// Move an existing order to `status`
    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        transaction_id: Option<&str>,
    ) -> Result<()>;

    /// Append a transaction, returning its generated id
    async fn append_transaction(&self, transaction: &Transaction) -> Result<String>;

    /// Transactions recorded for an order, oldest first
    async fn transactions_for_order(&self, order_id: &str) -> Result<Vec<Transaction>>;
}

/// Premium fields on user records
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn get_entitlement(&self, user_id: &str) -> Result<Option<PremiumEntitlement>>;

    async fn set_entitlement(&self, user_id: &str, entitlement: &PremiumEntitlement) -> Result<()>;
}

/// In-memory store (for development and tests)
pub struct MemoryStore {
    orders: RwLock<HashMap<String, Order>>,
    transactions: RwLock<Vec<Transaction>>,
    users: RwLock<HashMap<String, PremiumEntitlement>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            transactions: RwLock::new(Vec::new()),
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored orders
    pub fn order_count(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or_default()
    }

    /// Number of stored transactions
    pub fn transaction_count(&self) -> usize {
        self.transactions.read().map(|t| t.len()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Storage("lock poisoned".into())
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(order_id).cloned())
    }

    async fn attach_provider_ref(&self, order_id: &str, provider_ref: &str) -> Result<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;
        order.provider_ref = Some(provider_ref.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        transaction_id: Option<&str>,
    ) -> Result<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;
        order.status = status;
        if let Some(id) = transaction_id {
            order.transaction_id = Some(id.to_string());
        }
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn append_transaction(&self, transaction: &Transaction) -> Result<String> {
        let mut transactions = self.transactions.write().map_err(poisoned)?;
        transactions.push(transaction.clone());
        Ok(transaction.id.clone())
    }

    async fn transactions_for_order(&self, order_id: &str) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().map_err(poisoned)?;
        Ok(transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EntitlementStore for MemoryStore {
    async fn get_entitlement(&self, user_id: &str) -> Result<Option<PremiumEntitlement>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(user_id).cloned())
    }

    async fn set_entitlement(&self, user_id: &str, entitlement: &PremiumEntitlement) -> Result<()> {
        let mut users = self.users.write().map_err(poisoned)?;
        users.insert(user_id.to_string(), entitlement.clone());
        Ok(())
    }
}

/// Store whose every call fails (for exercising error paths)
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
#[async_trait]
impl OrderStore for FailingStore {
    async fn create_order(&self, _: &Order) -> Result<()> {
        Err(PaymentError::Storage("unavailable".into()))
    }

    async fn get_order(&self, _: &str) -> Result<Option<Order>> {
        Err(PaymentError::Storage("unavailable".into()))
    }

    async fn attach_provider_ref(&self, _: &str, _: &str) -> Result<()> {
        Err(PaymentError::Storage("unavailable".into()))
    }

    async fn update_order_status(&self, _: &str, _: OrderStatus, _: Option<&str>) -> Result<()> {
        Err(PaymentError::Storage("unavailable".into()))
    }

    async fn append_transaction(&self, _: &Transaction) -> Result<String> {
        Err(PaymentError::Storage("unavailable".into()))
    }

    async fn transactions_for_order(&self, _: &str) -> Result<Vec<Transaction>> {
        Err(PaymentError::Storage("unavailable".into()))
    }
}

#[cfg(test)]
#[async_trait]
impl EntitlementStore for FailingStore {
    async fn get_entitlement(&self, _: &str) -> Result<Option<PremiumEntitlement>> {
        Err(PaymentError::Storage("unavailable".into()))
    }

    async fn set_entitlement(&self, _: &str, _: &PremiumEntitlement) -> Result<()> {
        Err(PaymentError::Storage("unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn order() -> Order {
        Order::pending("VT-1", "user-1", 3, dec!(12.99), "USD", PaymentMethod::Bold)
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let store = MemoryStore::new();
        store.create_order(&order()).await.unwrap();
        store.attach_provider_ref("VT-1", "LNK_123").await.unwrap();
        store
            .update_order_status("VT-1", OrderStatus::Completed, Some("tx-9"))
            .await
            .unwrap();

        let saved = store.get_order("VT-1").await.unwrap().unwrap();
        assert_eq!(saved.status, OrderStatus::Completed);
        assert_eq!(saved.provider_ref.as_deref(), Some("LNK_123"));
        assert_eq!(saved.transaction_id.as_deref(), Some("tx-9"));
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = MemoryStore::new();
        let err = store
            .update_order_status("VT-404", OrderStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_transactions_are_appended() {
        let store = MemoryStore::new();
        let tx = Transaction {
            id: "t1".into(),
            order_id: "VT-1".into(),
            user_id: "user-1".into(),
            gateway: PaymentMethod::Epayco,
            status: OrderStatus::Completed,
            amount: Some(dec!(12.99)),
            currency: Some("USD".into()),
            provider_transaction_id: Some("123".into()),
            raw_payload: serde_json::json!({}),
            created_at: Utc::now(),
        };
        store.append_transaction(&tx).await.unwrap();
        store.append_transaction(&Transaction { id: "t2".into(), ..tx }).await.unwrap();

        assert_eq!(store.transactions_for_order("VT-1").await.unwrap().len(), 2);
        assert_eq!(store.transaction_count(), 2);
    }
}
