//! Withdrawal lifecycle service.
//!
//! Funds are debited from the trading ledger at submission and held until
//! an operator decides. Approval and rejection both start by claiming the
//! pending row; the claim is the only gate in front of the payout
//! gateway, so a withdrawal can reach it at most once. Whenever the money
//! does not go out, the ledger is made whole by a compensating credit
//! under a fresh refund order id.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::crypto::EnvelopeCipher;
use crate::domain::{order_ref, Withdrawal, WithdrawalStatus};
use crate::error::AppError;
use crate::gateway::{GatewayError, PayoutClient, PayoutReceipt, RateClient};
use crate::notify::PayeeNotifier;
use crate::services::LedgerAdjuster;
use crate::store::{SettlementStore, WithdrawalClaim};

const GATEWAY_CURRENCY: &str = "INR";
const LEDGER_CURRENCY: &str = "USD";

/// Validated withdrawal submission.
#[derive(Debug)]
pub struct WithdrawalRequest {
    pub account_number: String,
    pub bank_account: String,
    pub ifsc: String,
    pub holder_name: String,
    pub contact: String,
    pub amount: BigDecimal,
    pub note: Option<String>,
}

/// Wire shape of a payout order inside the sealed envelope.
#[derive(Serialize)]
struct PayoutOrder<'a> {
    orderid: &'a str,
    account: &'a str,
    ifsc: &'a str,
    name: &'a str,
    mobile: &'a str,
    amount: &'a BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

impl<'a> PayoutOrder<'a> {
    fn from_withdrawal(w: &'a Withdrawal) -> Self {
        PayoutOrder {
            orderid: &w.order_id,
            account: &w.bank_account,
            ifsc: &w.ifsc,
            name: &w.holder_name,
            mobile: &w.contact,
            amount: &w.amount,
            note: w.note.as_deref(),
        }
    }
}

#[derive(Clone)]
pub struct WithdrawalService {
    store: Arc<dyn SettlementStore>,
    adjuster: LedgerAdjuster,
    payout: PayoutClient,
    rates: RateClient,
    cipher: EnvelopeCipher,
    notifier: Arc<dyn PayeeNotifier>,
    agent_code: String,
}

impl WithdrawalService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        adjuster: LedgerAdjuster,
        payout: PayoutClient,
        rates: RateClient,
        cipher: EnvelopeCipher,
        notifier: Arc<dyn PayeeNotifier>,
        agent_code: String,
    ) -> Self {
        Self {
            store,
            adjuster,
            payout,
            rates,
            cipher,
            notifier,
            agent_code,
        }
    }

    pub fn ledger_circuit_state(&self) -> String {
        self.adjuster.circuit_state()
    }

    /// Submits a withdrawal: converts the requested amount into ledger
    /// currency, debits it up front and persists the pending request. A
    /// failed debit aborts the submission entirely.
    pub async fn submit(&self, request: WithdrawalRequest) -> Result<Withdrawal, AppError> {
        if request.amount <= BigDecimal::from(0) {
            return Err(AppError::Validation("amount must be positive".to_string()));
        }

        let order_id = order_ref("WD");
        let rate = self
            .rates
            .conversion_rate(GATEWAY_CURRENCY, LEDGER_CURRENCY)
            .await;
        let converted = (&request.amount * &rate).round(2);

        self.adjuster
            .debit(&request.account_number, &converted, &order_id)
            .await?;

        let withdrawal = Withdrawal::new(
            order_id,
            request.account_number,
            request.bank_account,
            request.ifsc,
            request.holder_name,
            request.contact,
            request.amount,
            converted,
            rate,
            request.note,
        );

        if let Err(store_err) = self.store.create_withdrawal(&withdrawal).await {
            // The ledger was already debited; undo it before failing.
            let refund_id = order_ref("RF");
            if let Err(ledger_err) = self
                .adjuster
                .credit(
                    &withdrawal.account_number,
                    &withdrawal.converted_amount,
                    &refund_id,
                )
                .await
            {
                error!(
                    order_id = %withdrawal.order_id,
                    refund_order_id = %refund_id,
                    error = %ledger_err,
                    "compensating credit failed after store error, manual reconciliation required"
                );
            }
            return Err(store_err.into());
        }

        info!(
            order_id = %withdrawal.order_id,
            amount = %withdrawal.amount,
            converted_amount = %withdrawal.converted_amount,
            fx_rate = %withdrawal.fx_rate,
            "withdrawal submitted and funds held"
        );
        self.notifier.withdrawal_submitted(&withdrawal).await;
        Ok(withdrawal)
    }

    /// Approves a pending withdrawal: claims it, seals the payout order
    /// and submits it to the gateway. On any gateway failure the held
    /// funds flow back under a fresh refund order id and the withdrawal
    /// finalizes as failed.
    pub async fn approve(&self, order_id: &str) -> Result<Withdrawal, AppError> {
        let claimed = self.claim(order_id).await?;

        let sealed_result = match self.cipher.seal(&PayoutOrder::from_withdrawal(&claimed)) {
            Ok(sealed) => self.payout.submit_payout(&sealed, &self.agent_code).await,
            Err(e) => Err(GatewayError::InvalidResponse(format!(
                "sealing payout order: {}",
                e
            ))),
        };

        match sealed_result {
            Ok(receipt) => {
                let audit = self.audit_payload(&receipt);
                let done = self
                    .store
                    .finalize_withdrawal(order_id, WithdrawalStatus::Completed, Some(audit), None)
                    .await?;
                info!(order_id, "withdrawal paid out");
                self.notifier.withdrawal_finalized(&done).await;
                Ok(done)
            }
            Err(gateway_err) => {
                warn!(order_id, error = %gateway_err, "payout failed, refunding held funds");
                let done = self
                    .refund_and_finalize(
                        &claimed,
                        WithdrawalStatus::Failed,
                        json!({"error": gateway_err.to_string()}),
                    )
                    .await?;
                self.notifier.withdrawal_finalized(&done).await;
                Ok(done)
            }
        }
    }

    /// Rejects a pending withdrawal: claims it, returns the held funds
    /// under a fresh refund order id and finalizes as rejected. The
    /// payout gateway is never contacted.
    pub async fn reject(&self, order_id: &str) -> Result<Withdrawal, AppError> {
        let claimed = self.claim(order_id).await?;

        let done = self
            .refund_and_finalize(&claimed, WithdrawalStatus::Rejected, json!({"rejected": true}))
            .await?;
        info!(order_id, "withdrawal rejected");
        self.notifier.withdrawal_finalized(&done).await;
        Ok(done)
    }

    pub async fn get(&self, order_id: &str) -> Result<Withdrawal, AppError> {
        self.store
            .withdrawal(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", order_id)))
    }

    async fn claim(&self, order_id: &str) -> Result<Withdrawal, AppError> {
        match self.store.claim_withdrawal(order_id).await? {
            WithdrawalClaim::Claimed(w) => Ok(w),
            WithdrawalClaim::AlreadyProcessed(status) => Err(AppError::AlreadyProcessed(format!(
                "withdrawal {} is {}",
                order_id, status
            ))),
            WithdrawalClaim::NotFound => {
                Err(AppError::NotFound(format!("withdrawal {}", order_id)))
            }
        }
    }

    /// Issues the compensating credit and finalizes the claimed row. A
    /// failed credit still finalizes the withdrawal; the ledger gap is
    /// logged for operators.
    async fn refund_and_finalize(
        &self,
        claimed: &Withdrawal,
        status: WithdrawalStatus,
        mut audit: Value,
    ) -> Result<Withdrawal, AppError> {
        let refund_id = order_ref("RF");
        let refunded = self
            .adjuster
            .credit(&claimed.account_number, &claimed.converted_amount, &refund_id)
            .await;

        if let Err(ref ledger_err) = refunded {
            error!(
                order_id = %claimed.order_id,
                refund_order_id = %refund_id,
                error = %ledger_err,
                "compensating credit failed, manual reconciliation required"
            );
        }
        audit["refund_issued"] = Value::Bool(refunded.is_ok());

        self.store
            .finalize_withdrawal(
                &claimed.order_id,
                status,
                Some(audit),
                Some(refund_id),
            )
            .await
            .map_err(Into::into)
    }

    fn audit_payload(&self, receipt: &PayoutReceipt) -> Value {
        if let Some(sealed) = receipt.sealed_data() {
            match self.cipher.open::<Value>(sealed) {
                Ok(details) => return json!({"ack": receipt.raw, "details": details}),
                Err(e) => warn!(error = %e, "payout ack envelope unreadable, keeping raw body"),
            }
        }
        receipt.raw.clone()
    }
}
