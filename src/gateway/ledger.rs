//! Client for the trading ledger's balance-adjustment API.
//!
//! Every credit and debit the engine issues goes through this client, so
//! it runs behind a circuit breaker: once the ledger starts failing
//! consecutively, further adjustments short-circuit instead of piling
//! onto a struggling upstream.

use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("ledger rejected adjustment: {0}")]
    Rejected(String),

    #[error("ledger circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// HTTP client for the trading ledger balance endpoint.
#[derive(Clone)]
pub struct LedgerClient {
    client: Client,
    endpoint: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl LedgerClient {
    pub fn new(endpoint: String) -> Self {
        Self::with_circuit_breaker(endpoint, 3, 60)
    }

    /// Creates a client with custom circuit breaker configuration.
    pub fn with_circuit_breaker(
        endpoint: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        LedgerClient {
            client,
            endpoint,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker.
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Applies a signed balance adjustment under a unique order id and
    /// returns the ledger's acknowledgement body.
    pub async fn adjust_balance(
        &self,
        account_number: &str,
        amount: BigDecimal,
        order_id: &str,
    ) -> Result<Value, LedgerError> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = serde_json::json!({
            "accountno": account_number,
            "amount": amount,
            "orderid": order_id,
        });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&endpoint).json(&body).send().await?;

                let status = response.status();
                let text = response.text().await?;
                if !status.is_success() {
                    return Err(LedgerError::Rejected(format!("{}: {}", status, text)));
                }

                Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            })
            .await;

        match result {
            Ok(ack) => Ok(ack),
            Err(FailsafeError::Rejected) => Err(LedgerError::CircuitBreakerOpen(
                "ledger circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn client_starts_with_closed_breaker() {
        let client = LedgerClient::new("https://ledger.example/balance".to_string());
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn adjustment_posts_signed_amount_and_order_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/balance")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "accountno": "100234",
                "amount": "-25.50",
                "orderid": "WD1234ABCD5678",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":"ok"}"#)
            .create_async()
            .await;

        let client = LedgerClient::new(format!("{}/balance", server.url()));
        let ack = client
            .adjust_balance(
                "100234",
                BigDecimal::from_str("-25.50").unwrap(),
                "WD1234ABCD5678",
            )
            .await
            .unwrap();

        assert_eq!(ack["result"], "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/balance")
            .with_status(500)
            .with_body("ledger down")
            .create_async()
            .await;

        let client = LedgerClient::new(format!("{}/balance", server.url()));
        let err = client
            .adjust_balance("100234", BigDecimal::from(10), "ORD1")
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[tokio::test]
    async fn breaker_opens_after_consecutive_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/balance")
            .with_status(500)
            .expect_at_least(3)
            .create_async()
            .await;

        let client = LedgerClient::with_circuit_breaker(format!("{}/balance", server.url()), 3, 60);

        for _ in 0..3 {
            let _ = client
                .adjust_balance("100234", BigDecimal::from(10), "ORD1")
                .await;
        }

        let result = client
            .adjust_balance("100234", BigDecimal::from(10), "ORD1")
            .await;
        assert!(matches!(result, Err(LedgerError::CircuitBreakerOpen(_))));
        assert_eq!(client.circuit_state(), "open");
    }
}
