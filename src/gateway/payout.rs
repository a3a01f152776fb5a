//! Client for the sealed-envelope gateway.
//!
//! This upstream takes `{reqData, agentCode}` where `reqData` is an
//! AES-GCM envelope produced by [`crate::crypto::EnvelopeCipher`]. It
//! serves two operations: creating checkout orders for envelope-based
//! deposits and executing payouts for approved withdrawals.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::gateway::GatewayError;

/// Raw acknowledgement from the sealed gateway. The `data` field, when
/// present, is itself an envelope the caller may open.
#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub raw: Value,
}

impl PayoutReceipt {
    pub fn status(&self) -> Option<&str> {
        self.raw.get("status").and_then(Value::as_str)
    }

    pub fn sealed_data(&self) -> Option<&str> {
        self.raw.get("data").and_then(Value::as_str)
    }
}

#[derive(Clone)]
pub struct PayoutClient {
    client: Client,
    base_url: String,
}

impl PayoutClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        PayoutClient { client, base_url }
    }

    async fn post_sealed(
        &self,
        path: &str,
        req_data: &str,
        agent_code: &str,
    ) -> Result<PayoutReceipt, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .json(&serde_json::json!({
                "reqData": req_data,
                "agentCode": agent_code,
            }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!("{}: {}", status, text)));
        }

        let raw: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::InvalidResponse(format!("{}: {}", e, text)))?;
        Ok(PayoutReceipt { raw })
    }

    /// Creates a checkout order from a sealed request. The acknowledgement
    /// is returned as-is; interpreting its sealed `data` is up to the
    /// caller.
    pub async fn create_order(
        &self,
        req_data: &str,
        agent_code: &str,
    ) -> Result<PayoutReceipt, GatewayError> {
        self.post_sealed("/order/generate", req_data, agent_code)
            .await
    }

    /// Executes a payout from a sealed request. Returns `Ok` only when the
    /// gateway explicitly acknowledges success; any other well-formed
    /// answer is a rejection the caller must compensate for.
    pub async fn submit_payout(
        &self,
        req_data: &str,
        agent_code: &str,
    ) -> Result<PayoutReceipt, GatewayError> {
        let receipt = self.post_sealed("/payout", req_data, agent_code).await?;
        if receipt.status() != Some("SUCCESS") {
            return Err(GatewayError::Rejected(receipt.raw.to_string()));
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn payout_succeeds_on_explicit_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/payout")
            .match_body(Matcher::Json(serde_json::json!({
                "reqData": "c2VhbGVk",
                "agentCode": "AG123",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"SUCCESS","utr":"UTR-991"}"#)
            .create_async()
            .await;

        let client = PayoutClient::new(server.url());
        let receipt = client.submit_payout("c2VhbGVk", "AG123").await.unwrap();

        assert_eq!(receipt.status(), Some("SUCCESS"));
        assert_eq!(receipt.raw["utr"], "UTR-991");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn payout_rejects_well_formed_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/payout")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"FAILED","reason":"insufficient agent balance"}"#)
            .create_async()
            .await;

        let client = PayoutClient::new(server.url());
        let err = client.submit_payout("c2VhbGVk", "AG123").await.unwrap_err();

        match err {
            GatewayError::Rejected(body) => assert!(body.contains("insufficient agent balance")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn payout_rejects_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/payout")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = PayoutClient::new(server.url());
        let err = client.submit_payout("c2VhbGVk", "AG123").await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
    }

    #[tokio::test]
    async fn order_ack_is_passed_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/order/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"PENDING","data":"ZW52ZWxvcGU="}"#)
            .create_async()
            .await;

        let client = PayoutClient::new(server.url());
        let receipt = client.create_order("c2VhbGVk", "AG123").await.unwrap();

        assert_eq!(receipt.status(), Some("PENDING"));
        assert_eq!(receipt.sealed_data(), Some("ZW52ZWxvcGU="));
    }
}
