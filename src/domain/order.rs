//! Deposit order entity.
//! An order is opened when a hosted-checkout deposit is initiated and is
//! settled (or failed) by the encrypted gateway callback.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Success,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "success" => Some(OrderStatus::Success),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    /// Terminal orders never transition again; settlement advice for them
    /// is treated as a replay.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain entity representing a deposit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub account_number: String,
    pub amount: BigDecimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_id: String, account_number: String, amount: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            account_number,
            amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
