//! Client for the FX rate feed.
//!
//! Withdrawal debits convert gateway currency into ledger currency at the
//! live rate. The feed is advisory: when it is down or answers nonsense,
//! the configured fallback rate keeps withdrawals flowing and the miss is
//! logged for operators.

use bigdecimal::BigDecimal;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::gateway::GatewayError;

#[derive(Clone)]
pub struct RateClient {
    client: Client,
    endpoint: String,
    fallback: BigDecimal,
}

#[derive(Deserialize)]
struct RateResponse {
    rate: BigDecimal,
}

impl RateClient {
    pub fn new(endpoint: String, fallback: BigDecimal) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        RateClient {
            client,
            endpoint,
            fallback,
        }
    }

    /// Current conversion rate from `from` to `to`, or the configured
    /// fallback when the feed cannot produce a usable one.
    pub async fn conversion_rate(&self, from: &str, to: &str) -> BigDecimal {
        match self.fetch_rate(from, to).await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(from, to, error = %e, fallback = %self.fallback, "rate feed unavailable, using fallback");
                self.fallback.clone()
            }
        }
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<BigDecimal, GatewayError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("from", from), ("to", to)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "rate feed returned {}",
                response.status()
            )));
        }

        let parsed: RateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("rate body: {}", e)))?;

        if parsed.rate <= BigDecimal::from(0) {
            return Err(GatewayError::InvalidResponse(format!(
                "non-positive rate {}",
                parsed.rate
            )));
        }

        Ok(parsed.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn fallback() -> BigDecimal {
        BigDecimal::from_str("0.012").unwrap()
    }

    #[tokio::test]
    async fn returns_feed_rate_when_available() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rate")
            .match_query(mockito::Matcher::UrlEncoded("from".into(), "INR".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rate":"0.0118"}"#)
            .create_async()
            .await;

        let client = RateClient::new(format!("{}/rate", server.url()), fallback());
        let rate = client.conversion_rate("INR", "USD").await;
        assert_eq!(rate, BigDecimal::from_str("0.0118").unwrap());
    }

    #[tokio::test]
    async fn falls_back_when_feed_is_down() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rate")
            .with_status(503)
            .create_async()
            .await;

        let client = RateClient::new(format!("{}/rate", server.url()), fallback());
        let rate = client.conversion_rate("INR", "USD").await;
        assert_eq!(rate, fallback());
    }

    #[tokio::test]
    async fn falls_back_on_garbage_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rate")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = RateClient::new(format!("{}/rate", server.url()), fallback());
        let rate = client.conversion_rate("INR", "USD").await;
        assert_eq!(rate, fallback());
    }

    #[tokio::test]
    async fn falls_back_on_non_positive_rate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rate":"0"}"#)
            .create_async()
            .await;

        let client = RateClient::new(format!("{}/rate", server.url()), fallback());
        let rate = client.conversion_rate("INR", "USD").await;
        assert_eq!(rate, fallback());
    }
}
