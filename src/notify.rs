//! Operator/payee notification hooks.
//!
//! Withdrawal lifecycle events fan out through this trait. Production
//! deployments plug in a mail or messaging sender; the default
//! implementation just writes structured log lines.

use async_trait::async_trait;
use tracing::info;

use crate::domain::Withdrawal;

#[async_trait]
pub trait PayeeNotifier: Send + Sync {
    async fn withdrawal_submitted(&self, withdrawal: &Withdrawal);
    async fn withdrawal_finalized(&self, withdrawal: &Withdrawal);
}

/// Notifier that records events in the service log only.
pub struct LogNotifier;

#[async_trait]
impl PayeeNotifier for LogNotifier {
    async fn withdrawal_submitted(&self, withdrawal: &Withdrawal) {
        info!(
            order_id = %withdrawal.order_id,
            account_number = %withdrawal.account_number,
            amount = %withdrawal.amount,
            "withdrawal submitted"
        );
    }

    async fn withdrawal_finalized(&self, withdrawal: &Withdrawal) {
        info!(
            order_id = %withdrawal.order_id,
            status = %withdrawal.status,
            refund_order_id = withdrawal.refund_order_id.as_deref().unwrap_or("-"),
            "withdrawal finalized"
        );
    }
}
