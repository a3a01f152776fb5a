//! Settlement ledger store.
//!
//! Persistence boundary for orders, gateway transactions and withdrawals.
//! Services depend on the [`SettlementStore`] trait; the Postgres adapter
//! backs production and the in-memory adapter backs tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::domain::{Order, OrderStatus, Transaction, Withdrawal, WithdrawalStatus};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    Duplicate(String),

    #[error("illegal status transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("corrupt record {id}: unknown status {status}")]
    Corrupt { id: String, status: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of attempting to claim a withdrawal for processing.
#[derive(Debug)]
pub enum WithdrawalClaim {
    /// Caller won the claim; the returned record is already `Processing`.
    Claimed(Withdrawal),
    /// Someone else finished (or is finishing) this withdrawal first.
    AlreadyProcessed(WithdrawalStatus),
    /// No withdrawal under that order id.
    NotFound,
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Reachability probe for health reporting.
    async fn ping(&self) -> bool;

    /// Records a gateway transaction if its `gateway_txn_id` has never been
    /// seen. Returns `true` when the record was inserted, `false` when a
    /// record with the same gateway id already exists. The check and the
    /// insert are a single atomic step, so concurrent replays of one
    /// notification admit exactly one writer.
    async fn record_transaction(&self, tx: &Transaction) -> StoreResult<bool>;

    async fn transaction_by_gateway_id(
        &self,
        gateway_txn_id: &str,
    ) -> StoreResult<Option<Transaction>>;

    async fn create_order(&self, order: &Order) -> StoreResult<()>;

    async fn order(&self, order_id: &str) -> StoreResult<Option<Order>>;

    /// Moves an order from `from` to `to` only if it is still in `from`.
    /// Returns whether this caller performed the transition.
    async fn transition_order(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool>;

    async fn create_withdrawal(&self, withdrawal: &Withdrawal) -> StoreResult<()>;

    async fn withdrawal(&self, order_id: &str) -> StoreResult<Option<Withdrawal>>;

    /// Atomically claims a pending withdrawal for processing. At most one
    /// caller ever receives `Claimed` for a given order id.
    async fn claim_withdrawal(&self, order_id: &str) -> StoreResult<WithdrawalClaim>;

    /// Finalizes a claimed withdrawal into a terminal status, attaching the
    /// gateway response and, when a compensating credit was issued, the
    /// refund order id. Only a `Processing` row may be finalized.
    async fn finalize_withdrawal(
        &self,
        order_id: &str,
        status: WithdrawalStatus,
        gateway_response: Option<Value>,
        refund_order_id: Option<String>,
    ) -> StoreResult<Withdrawal>;
}
