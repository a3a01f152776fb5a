//! In-memory settlement store.
//! Backs integration tests and local development without Postgres. All
//! collections live behind one async mutex so claim and finalize keep the
//! same atomicity the SQL adapter gets from row-level updates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::{Order, OrderStatus, Transaction, Withdrawal, WithdrawalStatus};
use crate::store::{SettlementStore, StoreError, StoreResult, WithdrawalClaim};

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Order>,
    transactions: HashMap<String, Transaction>,
    withdrawals: HashMap<String, Withdrawal>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn record_transaction(&self, tx: &Transaction) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.transactions.contains_key(&tx.gateway_txn_id) {
            return Ok(false);
        }
        inner
            .transactions
            .insert(tx.gateway_txn_id.clone(), tx.clone());
        Ok(true)
    }

    async fn transaction_by_gateway_id(
        &self,
        gateway_txn_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        let inner = self.inner.lock().await;
        Ok(inner.transactions.get(gateway_txn_id).cloned())
    }

    async fn create_order(&self, order: &Order) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.order_id) {
            return Err(StoreError::Duplicate(order.order_id.clone()));
        }
        inner.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn order(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(order_id).cloned())
    }

    async fn transition_order(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(order_id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }

    async fn create_withdrawal(&self, withdrawal: &Withdrawal) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.withdrawals.contains_key(&withdrawal.order_id) {
            return Err(StoreError::Duplicate(withdrawal.order_id.clone()));
        }
        inner
            .withdrawals
            .insert(withdrawal.order_id.clone(), withdrawal.clone());
        Ok(())
    }

    async fn withdrawal(&self, order_id: &str) -> StoreResult<Option<Withdrawal>> {
        let inner = self.inner.lock().await;
        Ok(inner.withdrawals.get(order_id).cloned())
    }

    async fn claim_withdrawal(&self, order_id: &str) -> StoreResult<WithdrawalClaim> {
        let mut inner = self.inner.lock().await;
        match inner.withdrawals.get_mut(order_id) {
            Some(w) if w.status == WithdrawalStatus::Pending => {
                w.status = WithdrawalStatus::Processing;
                w.updated_at = Utc::now();
                Ok(WithdrawalClaim::Claimed(w.clone()))
            }
            Some(w) => Ok(WithdrawalClaim::AlreadyProcessed(w.status)),
            None => Ok(WithdrawalClaim::NotFound),
        }
    }

    async fn finalize_withdrawal(
        &self,
        order_id: &str,
        status: WithdrawalStatus,
        gateway_response: Option<Value>,
        refund_order_id: Option<String>,
    ) -> StoreResult<Withdrawal> {
        let mut inner = self.inner.lock().await;
        match inner.withdrawals.get_mut(order_id) {
            Some(w) if w.status == WithdrawalStatus::Processing => {
                w.status = status;
                if gateway_response.is_some() {
                    w.gateway_response = gateway_response;
                }
                if refund_order_id.is_some() {
                    w.refund_order_id = refund_order_id;
                }
                w.updated_at = Utc::now();
                Ok(w.clone())
            }
            Some(w) => Err(StoreError::IllegalTransition {
                id: order_id.to_string(),
                from: w.status.to_string(),
                to: status.to_string(),
            }),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }
}
