//! Gateway transaction entity.
//! Append-only record of a deposit notification received from the payment
//! gateway, keyed by the gateway's own transaction id for replay detection.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain entity representing a recorded gateway notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
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
    pub currency: String,
    pub added_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether the gateway reported this payment as completed. Only
    /// completed notifications trigger a ledger credit.
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}
