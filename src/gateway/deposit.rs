//! Client for the hosted-checkout deposit gateway.
//!
//! The gateway authenticates with short-lived bearer tokens. The cached
//! token lives behind an async mutex that stays held across the login
//! round trip, so concurrent initiations coalesce into a single login
//! instead of stampeding the auth endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bigdecimal::BigDecimal;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::gateway::GatewayError;

/// Tokens are refreshed this many seconds before the gateway's own
/// deadline so an in-flight request never rides an expiring token.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct DepositInitiation {
    /// Hosted checkout page the payer is redirected to.
    pub payment_url: String,
    /// Gateway's own id for the created transaction.
    pub gateway_txn_id: String,
    /// Our reference submitted with the order.
    pub merchant_txn_id: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct DepositClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    gateway_id: i64,
    token: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    data: LoginData,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct PayinEnvelope {
    data: PayinData,
}

#[derive(Deserialize)]
struct PayinData {
    url: String,
    transaction_id: String,
}

impl DepositClient {
    pub fn new(base_url: String, username: String, password: String, gateway_id: i64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        DepositClient {
            client,
            base_url,
            username,
            password,
            gateway_id,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a valid bearer token, logging in if the cached one is
    /// missing or inside its expiry margin. Holding the lock for the
    /// whole refresh is what makes concurrent callers reuse one login.
    async fn bearer_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("deposit gateway token missing or expired, logging in");
        let response = self
            .client
            .post(format!("{}/login", self.base_url.trim_end_matches('/')))
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "login returned {}",
                response.status()
            )));
        }

        let login: LoginEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("login body: {}", e)))?;

        let lifetime = login.data.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        *cached = Some(CachedToken {
            value: login.data.token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });

        Ok(login.data.token)
    }

    /// Creates a payin order and returns the hosted checkout handle.
    pub async fn initiate_payment(
        &self,
        amount: &BigDecimal,
        merchant_user_id: &str,
    ) -> Result<DepositInitiation, GatewayError> {
        let token = self.bearer_token().await?;
        let merchant_txn_id = format!("TRXN{}", Utc::now().timestamp_millis());

        let response = self
            .client
            .post(format!(
                "{}/payin/generate",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "gateway_id": self.gateway_id,
                "amount": amount,
                "merchant_txn_id": merchant_txn_id,
                "merchant_user_id": merchant_user_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "payin returned {}: {}",
                status, body
            )));
        }

        let envelope: PayinEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("payin body: {}", e)))?;

        Ok(DepositInitiation {
            payment_url: envelope.data.url,
            gateway_txn_id: envelope.data.transaction_id,
            merchant_txn_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_BODY: &str = r#"{"data":{"token":"tok-1","expires_in":3600}}"#;
    const PAYIN_BODY: &str =
        r#"{"data":{"url":"https://pay.example/p/1","transaction_id":"GTX-1"}}"#;

    fn client(url: String) -> DepositClient {
        DepositClient::new(url, "merchant".to_string(), "secret".to_string(), 23)
    }

    #[tokio::test]
    async fn initiation_returns_checkout_handle() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LOGIN_BODY)
            .create_async()
            .await;
        server
            .mock("POST", "/payin/generate")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PAYIN_BODY)
            .create_async()
            .await;

        let initiation = client(server.url())
            .initiate_payment(&BigDecimal::from(500), "100234")
            .await
            .unwrap();

        assert_eq!(initiation.payment_url, "https://pay.example/p/1");
        assert_eq!(initiation.gateway_txn_id, "GTX-1");
        assert!(initiation.merchant_txn_id.starts_with("TRXN"));
    }

    #[tokio::test]
    async fn token_is_cached_across_calls() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LOGIN_BODY)
            .expect(1)
            .create_async()
            .await;
        let payin = server
            .mock("POST", "/payin/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PAYIN_BODY)
            .expect(2)
            .create_async()
            .await;

        let client = client(server.url());
        client
            .initiate_payment(&BigDecimal::from(500), "100234")
            .await
            .unwrap();
        client
            .initiate_payment(&BigDecimal::from(700), "100234")
            .await
            .unwrap();

        login.assert_async().await;
        payin.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_initiations_share_one_login() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LOGIN_BODY)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/payin/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PAYIN_BODY)
            .expect(2)
            .create_async()
            .await;

        let client = client(server.url());
        let amount_a = BigDecimal::from(100);
        let amount_b = BigDecimal::from(200);
        let (a, b) = tokio::join!(
            client.initiate_payment(&amount_a, "u-1"),
            client.initiate_payment(&amount_b, "u-2"),
        );
        a.unwrap();
        b.unwrap();

        login.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_triggers_relogin() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"token":"tok-short","expires_in":0}}"#)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("POST", "/payin/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PAYIN_BODY)
            .expect(2)
            .create_async()
            .await;

        let client = client(server.url());
        client
            .initiate_payment(&BigDecimal::from(100), "u-1")
            .await
            .unwrap();
        client
            .initiate_payment(&BigDecimal::from(200), "u-1")
            .await
            .unwrap();

        login.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_login_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(401)
            .create_async()
            .await;

        let err = client(server.url())
            .initiate_payment(&BigDecimal::from(100), "u-1")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
    }
}
