//! Settlement services.
//!
//! Orchestration between the store, the ledger and the gateways. The
//! handlers stay thin; everything that moves money lives here.

pub mod adjustment;
pub mod deposits;
pub mod withdrawals;

pub use adjustment::LedgerAdjuster;
pub use deposits::{
    AdviceOutcome, CallbackOutcome, DepositService, NotificationInput, SealedOrderAck,
};
pub use withdrawals::{WithdrawalRequest, WithdrawalService};
