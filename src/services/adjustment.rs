//! Ledger adjustment service.
//!
//! Narrow wrapper over [`LedgerClient`] that fixes the sign convention:
//! callers always pass positive magnitudes, credits post them as-is and
//! debits negate them. Idempotency rides on the order id, so every call
//! site must mint a fresh one per adjustment.

use bigdecimal::BigDecimal;
use serde_json::Value;
use tracing::info;

use crate::gateway::{LedgerClient, LedgerError};

#[derive(Clone)]
pub struct LedgerAdjuster {
    client: LedgerClient,
}

impl LedgerAdjuster {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    pub fn circuit_state(&self) -> String {
        self.client.circuit_state()
    }

    /// Credits `amount` to the account under `order_id`.
    pub async fn credit(
        &self,
        account_number: &str,
        amount: &BigDecimal,
        order_id: &str,
    ) -> Result<Value, LedgerError> {
        info!(account_number, order_id, amount = %amount, "crediting ledger");
        self.client
            .adjust_balance(account_number, amount.clone(), order_id)
            .await
    }

    /// Debits `amount` from the account under `order_id`.
    pub async fn debit(
        &self,
        account_number: &str,
        amount: &BigDecimal,
        order_id: &str,
    ) -> Result<Value, LedgerError> {
        info!(account_number, order_id, amount = %amount, "debiting ledger");
        self.client
            .adjust_balance(account_number, -amount, order_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn credit_posts_positive_amount() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/balance")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "accountno": "100234",
                "amount": "12.00",
                "orderid": "RF1234ABCD5678",
            })))
            .with_status(200)
            .with_body(r#"{"result":"ok"}"#)
            .create_async()
            .await;

        let adjuster = LedgerAdjuster::new(LedgerClient::new(format!("{}/balance", server.url())));
        adjuster
            .credit(
                "100234",
                &BigDecimal::from_str("12.00").unwrap(),
                "RF1234ABCD5678",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn debit_posts_negated_amount() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/balance")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "accountno": "100234",
                "amount": "-12.00",
                "orderid": "WD1234ABCD5678",
            })))
            .with_status(200)
            .with_body(r#"{"result":"ok"}"#)
            .create_async()
            .await;

        let adjuster = LedgerAdjuster::new(LedgerClient::new(format!("{}/balance", server.url())));
        adjuster
            .debit(
                "100234",
                &BigDecimal::from_str("12.00").unwrap(),
                "WD1234ABCD5678",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
