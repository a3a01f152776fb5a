//! Domain entities for the settlement ledger.
//! Framework-agnostic records shared by the stores, services and handlers.

pub mod order;
pub mod transaction;
pub mod withdrawal;

pub use order::{Order, OrderStatus};
pub use transaction::Transaction;
pub use withdrawal::{Withdrawal, WithdrawalStatus};

use uuid::Uuid;

/// Builds a ledger order reference: a short uppercase prefix followed by
/// twelve hex characters drawn from a fresh UUID. Stays within the 16
/// character limit the upstream ledger imposes on order ids.
pub fn order_ref(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &suffix[..12].to_uppercase())
}
