//! Withdrawal entity and its status machine.
//!
//! A withdrawal debits the trading ledger the moment it is submitted and
//! holds the funds until an operator approves or rejects it. `Processing`
//! marks the row as claimed by exactly one approval or rejection attempt,
//! so the payout gateway is never invoked twice for the same request.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed | WithdrawalStatus::Rejected
        )
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain entity representing a withdrawal request.
///
/// `amount` is the payout amount in gateway currency; `converted_amount`
/// is what was debited from the trading ledger at `fx_rate`. The refund
/// issued when a withdrawal fails or is rejected goes out under
/// `refund_order_id`, never under the original `order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub order_id: String,
    pub account_number: String,
    pub bank_account: String,
    pub ifsc: String,
    pub holder_name: String,
    pub contact: String,
    pub amount: BigDecimal,
    pub converted_amount: BigDecimal,
    pub fx_rate: BigDecimal,
    pub note: Option<String>,
    pub status: WithdrawalStatus,
    pub gateway_response: Option<serde_json::Value>,
    pub refund_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: String,
        account_number: String,
        bank_account: String,
        ifsc: String,
        holder_name: String,
        contact: String,
        amount: BigDecimal,
        converted_amount: BigDecimal,
        fx_rate: BigDecimal,
        note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            account_number,
            bank_account,
            ifsc,
            holder_name,
            contact,
            amount,
            converted_amount,
            fx_rate,
            note,
            status: WithdrawalStatus::Pending,
            gateway_response: None,
            refund_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Processing,
            WithdrawalStatus::Completed,
            WithdrawalStatus::Failed,
            WithdrawalStatus::Rejected,
        ] {
            assert_eq!(WithdrawalStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(WithdrawalStatus::from_str("unknown"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(!WithdrawalStatus::Processing.is_terminal());
        assert!(WithdrawalStatus::Completed.is_terminal());
        assert!(WithdrawalStatus::Failed.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
    }
}
