//! Outbound HTTP clients for the payment rails.
//!
//! One client per upstream: the hosted-checkout deposit gateway, the
//! sealed-envelope payout gateway, the trading ledger and the FX rate
//! feed. All of them run on bounded-timeout reqwest clients; the ledger
//! client additionally sits behind a circuit breaker because every money
//! movement funnels through it.

pub mod deposit;
pub mod ledger;
pub mod payout;
pub mod rates;

pub use deposit::{DepositClient, DepositInitiation};
pub use ledger::{LedgerClient, LedgerError};
pub use payout::{PayoutClient, PayoutReceipt};
pub use rates::RateClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
}
