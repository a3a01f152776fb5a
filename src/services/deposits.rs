//! Deposit reconciliation service.
//!
//! Ingests gateway callbacks into the settlement ledger and keeps ledger
//! credits exactly-once: plain callbacks dedup on the gateway's own
//! transaction id, encrypted settlement advice dedups on the order's
//! status transition. A persisted notification whose credit fails is
//! never retried automatically; it is flagged for manual reconciliation.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::crypto::EnvelopeCipher;
use crate::domain::{order_ref, Order, OrderStatus, Transaction};
use crate::error::AppError;
use crate::gateway::PayoutClient;
use crate::services::LedgerAdjuster;
use crate::store::SettlementStore;

/// Parsed fields of a deposit callback's transaction object.
#[derive(Debug)]
pub struct NotificationInput {
    pub gateway_txn_id: String,
    pub status: String,
    pub amount: BigDecimal,
    pub merchant_txn_id: Option<String>,
    pub merchant_user_id: Option<String>,
    pub txn_type: Option<String>,
    pub ref_id: Option<String>,
    pub gateway: Option<i32>,
    pub merchant: Option<i32>,
    pub wallet: Option<i32>,
    pub currency: Option<String>,
    pub added_on: Option<DateTime<Utc>>,
}

/// What happened to an ingested callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Recorded and the ledger credit went through.
    Settled,
    /// Recorded; the gateway did not report the payment completed.
    Unsettled,
    /// Recorded; the credit was attempted and failed.
    LedgerFailed,
    /// This gateway transaction id was already recorded.
    Duplicate,
}

/// What happened to a piece of settlement advice for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceOutcome {
    Credited,
    LedgerFailed,
    Failed,
    Replayed,
}

/// Acknowledgement for an envelope-based deposit order.
#[derive(Debug)]
pub struct SealedOrderAck {
    pub raw: Value,
    pub decrypted: Option<Value>,
}

#[derive(Clone)]
pub struct DepositService {
    store: Arc<dyn SettlementStore>,
    adjuster: LedgerAdjuster,
    cipher: EnvelopeCipher,
    sealed_gateway: PayoutClient,
    agent_code: String,
}

impl DepositService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        adjuster: LedgerAdjuster,
        cipher: EnvelopeCipher,
        sealed_gateway: PayoutClient,
        agent_code: String,
    ) -> Self {
        Self {
            store,
            adjuster,
            cipher,
            sealed_gateway,
            agent_code,
        }
    }

    /// Records a gateway notification and credits the payer's ledger
    /// account when the payment is complete. Replays are detected by the
    /// atomic insert, so at most one delivery of a notification ever
    /// reaches the ledger.
    pub async fn record_callback(
        &self,
        input: NotificationInput,
    ) -> Result<CallbackOutcome, AppError> {
        let tx = Transaction {
            id: Uuid::new_v4(),
            gateway_txn_id: input.gateway_txn_id,
            status: input.status,
            amount: input.amount,
            merchant_txn_id: input.merchant_txn_id,
            merchant_user_id: input.merchant_user_id,
            txn_type: input.txn_type,
            ref_id: input.ref_id,
            gateway: input.gateway,
            merchant: input.merchant,
            wallet: input.wallet,
            currency: input.currency.unwrap_or_else(|| "INR".to_string()),
            added_on: input.added_on,
            created_at: Utc::now(),
        };

        let inserted = self.store.record_transaction(&tx).await?;
        if !inserted {
            info!(gateway_txn_id = %tx.gateway_txn_id, "duplicate gateway notification ignored");
            return Ok(CallbackOutcome::Duplicate);
        }

        if !tx.is_completed() {
            info!(
                gateway_txn_id = %tx.gateway_txn_id,
                status = %tx.status,
                "notification recorded, payment not completed"
            );
            return Ok(CallbackOutcome::Unsettled);
        }

        let account_number = match tx.merchant_user_id.as_deref() {
            Some(account) => account,
            None => {
                warn!(
                    gateway_txn_id = %tx.gateway_txn_id,
                    "completed notification carries no merchant user id, cannot credit"
                );
                return Ok(CallbackOutcome::LedgerFailed);
            }
        };

        let order_id = order_ref("ORD");
        match self.adjuster.credit(account_number, &tx.amount, &order_id).await {
            Ok(_) => {
                info!(
                    gateway_txn_id = %tx.gateway_txn_id,
                    order_id = %order_id,
                    amount = %tx.amount,
                    "deposit settled"
                );
                Ok(CallbackOutcome::Settled)
            }
            Err(e) => {
                error!(
                    gateway_txn_id = %tx.gateway_txn_id,
                    order_id = %order_id,
                    error = %e,
                    "ledger credit failed, transaction kept for manual reconciliation"
                );
                Ok(CallbackOutcome::LedgerFailed)
            }
        }
    }

    /// Settles an order from decrypted gateway advice. The pending to
    /// success transition is the dedup gate: only the caller that wins it
    /// issues the credit, under the order's own id.
    pub async fn complete_order(
        &self,
        order_id: &str,
        advised_amount: Option<&BigDecimal>,
    ) -> Result<AdviceOutcome, AppError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;

        let won = self
            .store
            .transition_order(order_id, OrderStatus::Pending, OrderStatus::Success)
            .await?;
        if !won {
            info!(order_id, status = %order.status, "settlement advice replayed, ignoring");
            return Ok(AdviceOutcome::Replayed);
        }

        let amount = advised_amount.unwrap_or(&order.amount);
        match self
            .adjuster
            .credit(&order.account_number, amount, order_id)
            .await
        {
            Ok(_) => {
                info!(order_id, amount = %amount, "order settled");
                Ok(AdviceOutcome::Credited)
            }
            Err(e) => {
                error!(
                    order_id,
                    error = %e,
                    "ledger credit failed after settling order, manual reconciliation required"
                );
                Ok(AdviceOutcome::LedgerFailed)
            }
        }
    }

    /// Marks an order failed from non-success gateway advice. No ledger
    /// movement; replays lose the transition and are ignored.
    pub async fn fail_order(&self, order_id: &str) -> Result<AdviceOutcome, AppError> {
        if self.store.order(order_id).await?.is_none() {
            return Err(AppError::NotFound(format!("order {}", order_id)));
        }

        let won = self
            .store
            .transition_order(order_id, OrderStatus::Pending, OrderStatus::Failed)
            .await?;
        if !won {
            return Ok(AdviceOutcome::Replayed);
        }

        info!(order_id, "order marked failed from gateway advice");
        Ok(AdviceOutcome::Failed)
    }

    /// Opens a deposit order on the sealed gateway: persists it pending,
    /// seals the request and forwards the gateway's acknowledgement,
    /// opening the nested envelope when one is present.
    pub async fn open_sealed_order(
        &self,
        order_id: String,
        account_number: String,
        amount: BigDecimal,
    ) -> Result<SealedOrderAck, AppError> {
        let order = Order::new(order_id, account_number, amount);
        self.store.create_order(&order).await?;

        let sealed = self.cipher.seal(&serde_json::json!({
            "orderid": order.order_id,
            "amount": order.amount,
        }))?;

        let receipt = self
            .sealed_gateway
            .create_order(&sealed, &self.agent_code)
            .await?;

        let decrypted = receipt.sealed_data().and_then(|data| {
            match self.cipher.open::<Value>(data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(order_id = %order.order_id, error = %e, "gateway ack envelope unreadable");
                    None
                }
            }
        });

        info!(order_id = %order.order_id, "sealed deposit order opened");
        Ok(SealedOrderAck {
            raw: receipt.raw,
            decrypted,
        })
    }
}
