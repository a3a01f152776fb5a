//! Postgres implementation of the settlement store.
//!
//! Replay protection and claim handoff both ride on single-statement
//! guarantees: `ON CONFLICT DO NOTHING` for transaction dedup and
//! status-guarded `UPDATE ... RETURNING` for withdrawal claims, so no
//! advisory locks or transactions are needed around them.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, Transaction, Withdrawal, WithdrawalStatus};
use crate::store::{SettlementStore, StoreError, StoreResult, WithdrawalClaim};

/// Postgres-backed settlement store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn withdrawal_status(&self, order_id: &str) -> StoreResult<Option<WithdrawalStatus>> {
        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM withdrawals WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        match status {
            Some((s,)) => {
                let parsed = WithdrawalStatus::from_str(&s).ok_or_else(|| StoreError::Corrupt {
                    id: order_id.to_string(),
                    status: s,
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}

fn map_insert_err(err: sqlx::Error, id: &str) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(id.to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl SettlementStore for PostgresStore {
    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn record_transaction(&self, tx: &Transaction) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, gateway_txn_id, status, amount, merchant_txn_id, merchant_user_id,
                txn_type, ref_id, gateway, merchant, wallet, currency, added_on, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (gateway_txn_id) DO NOTHING
            "#,
        )
        .bind(tx.id)
        .bind(&tx.gateway_txn_id)
        .bind(&tx.status)
        .bind(&tx.amount)
        .bind(&tx.merchant_txn_id)
        .bind(&tx.merchant_user_id)
        .bind(&tx.txn_type)
        .bind(&tx.ref_id)
        .bind(tx.gateway)
        .bind(tx.merchant)
        .bind(tx.wallet)
        .bind(&tx.currency)
        .bind(tx.added_on)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn transaction_by_gateway_id(
        &self,
        gateway_txn_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE gateway_txn_id = $1",
        )
        .bind(gateway_txn_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    async fn create_order(&self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, account_number, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.account_number)
        .bind(&order.amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &order.order_id))?;

        Ok(())
    }

    async fn order(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_domain()).transpose()
    }

    async fn transition_order(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE order_id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Lost the race or the order never existed; tell those apart.
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1)")
                .bind(order_id)
                .fetch_one(&self.pool)
                .await?;
        if exists.0 {
            Ok(false)
        } else {
            Err(StoreError::NotFound(order_id.to_string()))
        }
    }

    async fn create_withdrawal(&self, withdrawal: &Withdrawal) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdrawals (
                order_id, account_number, bank_account, ifsc, holder_name, contact,
                amount, converted_amount, fx_rate, note, status, gateway_response,
                refund_order_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&withdrawal.order_id)
        .bind(&withdrawal.account_number)
        .bind(&withdrawal.bank_account)
        .bind(&withdrawal.ifsc)
        .bind(&withdrawal.holder_name)
        .bind(&withdrawal.contact)
        .bind(&withdrawal.amount)
        .bind(&withdrawal.converted_amount)
        .bind(&withdrawal.fx_rate)
        .bind(&withdrawal.note)
        .bind(withdrawal.status.as_str())
        .bind(&withdrawal.gateway_response)
        .bind(&withdrawal.refund_order_id)
        .bind(withdrawal.created_at)
        .bind(withdrawal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &withdrawal.order_id))?;

        Ok(())
    }

    async fn withdrawal(&self, order_id: &str) -> StoreResult<Option<Withdrawal>> {
        let row =
            sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_domain()).transpose()
    }

    async fn claim_withdrawal(&self, order_id: &str) -> StoreResult<WithdrawalClaim> {
        let row = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            UPDATE withdrawals
            SET status = 'processing', updated_at = NOW()
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(WithdrawalClaim::Claimed(row.into_domain()?));
        }

        match self.withdrawal_status(order_id).await? {
            Some(status) => Ok(WithdrawalClaim::AlreadyProcessed(status)),
            None => Ok(WithdrawalClaim::NotFound),
        }
    }

    async fn finalize_withdrawal(
        &self,
        order_id: &str,
        status: WithdrawalStatus,
        gateway_response: Option<serde_json::Value>,
        refund_order_id: Option<String>,
    ) -> StoreResult<Withdrawal> {
        let row = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            UPDATE withdrawals
            SET status = $2,
                gateway_response = COALESCE($3, gateway_response),
                refund_order_id = COALESCE($4, refund_order_id),
                updated_at = NOW()
            WHERE order_id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(&gateway_response)
        .bind(&refund_order_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into_domain()?);
        }

        match self.withdrawal_status(order_id).await? {
            Some(current) => Err(StoreError::IllegalTransition {
                id: order_id.to_string(),
                from: current.to_string(),
                to: status.to_string(),
            }),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    gateway_txn_id: String,
    status: String,
    amount: bigdecimal::BigDecimal,
    merchant_txn_id: Option<String>,
    merchant_user_id: Option<String>,
    txn_type: Option<String>,
    ref_id: Option<String>,
    gateway: Option<i32>,
    merchant: Option<i32>,
    wallet: Option<i32>,
    currency: String,
    added_on: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Transaction {
        Transaction {
            id: self.id,
            gateway_txn_id: self.gateway_txn_id,
            status: self.status,
            amount: self.amount,
            merchant_txn_id: self.merchant_txn_id,
            merchant_user_id: self.merchant_user_id,
            txn_type: self.txn_type,
            ref_id: self.ref_id,
            gateway: self.gateway,
            merchant: self.merchant,
            wallet: self.wallet,
            currency: self.currency,
            added_on: self.added_on,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    account_number: String,
    amount: bigdecimal::BigDecimal,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRow {
    fn into_domain(self) -> StoreResult<Order> {
        let status = OrderStatus::from_str(&self.status).ok_or_else(|| StoreError::Corrupt {
            id: self.order_id.clone(),
            status: self.status.clone(),
        })?;
        Ok(Order {
            order_id: self.order_id,
            account_number: self.account_number,
            amount: self.amount,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRow {
    order_id: String,
    account_number: String,
    bank_account: String,
    ifsc: String,
    holder_name: String,
    contact: String,
    amount: bigdecimal::BigDecimal,
    converted_amount: bigdecimal::BigDecimal,
    fx_rate: bigdecimal::BigDecimal,
    note: Option<String>,
    status: String,
    gateway_response: Option<serde_json::Value>,
    refund_order_id: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl WithdrawalRow {
    fn into_domain(self) -> StoreResult<Withdrawal> {
        let status =
            WithdrawalStatus::from_str(&self.status).ok_or_else(|| StoreError::Corrupt {
                id: self.order_id.clone(),
                status: self.status.clone(),
            })?;
        Ok(Withdrawal {
            order_id: self.order_id,
            account_number: self.account_number,
            bank_account: self.bank_account,
            ifsc: self.ifsc,
            holder_name: self.holder_name,
            contact: self.contact,
            amount: self.amount,
            converted_amount: self.converted_amount,
            fx_rate: self.fx_rate,
            note: self.note,
            status,
            gateway_response: self.gateway_response,
            refund_order_id: self.refund_order_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_ref;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use sqlx::migrate::Migrator;
    use std::path::Path;

    // These tests run only when DATABASE_URL points at a reachable
    // Postgres; otherwise they return early.
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        let migrator = Migrator::new(Path::new("./migrations")).await.ok()?;
        migrator.run(&pool).await.ok()?;
        Some(pool)
    }

    fn tx(gateway_txn_id: &str) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            gateway_txn_id: gateway_txn_id.to_string(),
            status: "completed".to_string(),
            amount: BigDecimal::from(250),
            merchant_txn_id: Some("TRXN1700000000000".to_string()),
            merchant_user_id: Some("100234".to_string()),
            txn_type: Some("payin".to_string()),
            ref_id: None,
            gateway: Some(23),
            merchant: None,
            wallet: None,
            currency: "INR".to_string(),
            added_on: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_gateway_txn_id() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let store = PostgresStore::new(pool);

        let gateway_txn_id = format!("GTX-{}", Uuid::new_v4().simple());
        assert!(store.record_transaction(&tx(&gateway_txn_id)).await.unwrap());
        assert!(!store.record_transaction(&tx(&gateway_txn_id)).await.unwrap());

        let fetched = store
            .transaction_by_gateway_id(&gateway_txn_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.gateway_txn_id, gateway_txn_id);
    }

    #[tokio::test]
    async fn withdrawal_claim_and_finalize() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let store = PostgresStore::new(pool);

        let order_id = order_ref("WD");
        let w = Withdrawal::new(
            order_id.clone(),
            "100234".to_string(),
            "9876543210".to_string(),
            "HDFC0001234".to_string(),
            "A Payee".to_string(),
            "9999999999".to_string(),
            BigDecimal::from(1000),
            "12.00".parse().unwrap(),
            "0.012".parse().unwrap(),
            None,
        );
        store.create_withdrawal(&w).await.unwrap();

        let claim = store.claim_withdrawal(&order_id).await.unwrap();
        assert!(matches!(claim, WithdrawalClaim::Claimed(_)));

        let lost = store.claim_withdrawal(&order_id).await.unwrap();
        assert!(matches!(
            lost,
            WithdrawalClaim::AlreadyProcessed(WithdrawalStatus::Processing)
        ));

        let refund_id = order_ref("RF");
        let done = store
            .finalize_withdrawal(
                &order_id,
                WithdrawalStatus::Failed,
                Some(serde_json::json!({"error": "payout rejected"})),
                Some(refund_id.clone()),
            )
            .await
            .unwrap();
        assert_eq!(done.status, WithdrawalStatus::Failed);
        assert_eq!(done.refund_order_id, Some(refund_id));

        let err = store
            .finalize_withdrawal(&order_id, WithdrawalStatus::Completed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn order_transition_is_compare_and_set() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let store = PostgresStore::new(pool);

        let order_id = order_ref("ORD");
        let order = Order::new(order_id.clone(), "100234".to_string(), BigDecimal::from(500));
        store.create_order(&order).await.unwrap();

        let err = store.create_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        assert!(store
            .transition_order(&order_id, OrderStatus::Pending, OrderStatus::Success)
            .await
            .unwrap());
        assert!(!store
            .transition_order(&order_id, OrderStatus::Pending, OrderStatus::Success)
            .await
            .unwrap());

        let err = store
            .transition_order("ORD-missing", OrderStatus::Pending, OrderStatus::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
