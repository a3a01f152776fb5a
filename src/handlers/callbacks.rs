//! Inbound gateway callbacks.
//!
//! `/callback` takes the deposit gateway's plain JSON notification;
//! `/callback/encrypted` takes sealed settlement advice from the envelope
//! gateway. Both paths always answer 200 once the notification is safely
//! recorded, even when the ledger credit behind it failed; the body says
//! which outcome applies so the gateway stops retrying.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::{AdviceOutcome, CallbackOutcome, NotificationInput};
use crate::AppState;

/// Wire shape of the plain gateway callback.
#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    pub transaction: Option<TransactionPayload>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionPayload {
    pub id: Option<Value>,
    pub status: Option<String>,
    pub amount: Option<BigDecimal>,
    pub merchant_txn_id: Option<String>,
    pub merchant_user_id: Option<String>,
    #[serde(rename = "type")]
    pub txn_type: Option<String>,
    pub ref_id: Option<String>,
    pub gateway: Option<i32>,
    pub merchant: Option<i32>,
    pub wallet: Option<i32>,
    pub currency: Option<String>,
    pub added_on: Option<String>,
}

/// Wire shape of the encrypted callback.
#[derive(Debug, Deserialize)]
pub struct EncryptedCallback {
    pub data: Option<String>,
    #[serde(rename = "agentCode")]
    pub agent_code: Option<String>,
}

/// Decrypted settlement advice carried inside the envelope.
#[derive(Debug, Deserialize)]
struct SealedAdvice {
    status: Option<String>,
    merchantid: Option<String>,
    #[serde(rename = "realAmount")]
    real_amount: Option<BigDecimal>,
}

pub async fn payment_callback(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload: CallbackPayload =
        serde_json::from_value(body).map_err(|e| AppError::MalformedCallback(e.to_string()))?;

    let txn = payload.transaction.ok_or_else(|| {
        AppError::MalformedCallback("transaction object missing".to_string())
    })?;

    let gateway_txn_id = match txn.id {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(AppError::MalformedCallback(
                "transaction id missing".to_string(),
            ))
        }
    };
    let amount = txn.amount.ok_or_else(|| {
        AppError::MalformedCallback("transaction amount missing".to_string())
    })?;

    let input = NotificationInput {
        gateway_txn_id,
        status: txn.status.unwrap_or_else(|| "unknown".to_string()),
        amount,
        merchant_txn_id: txn.merchant_txn_id,
        merchant_user_id: txn.merchant_user_id,
        txn_type: txn.txn_type,
        ref_id: txn.ref_id,
        gateway: txn.gateway,
        merchant: txn.merchant,
        wallet: txn.wallet,
        currency: txn.currency,
        added_on: parse_added_on(txn.added_on.as_deref()),
    };

    let outcome = state.deposits.record_callback(input).await?;
    let (success, message) = match outcome {
        CallbackOutcome::Settled => (true, "Transaction saved and balance updated"),
        CallbackOutcome::Duplicate => (true, "Duplicate callback ignored"),
        CallbackOutcome::Unsettled => (true, "Transaction saved but payment not completed"),
        CallbackOutcome::LedgerFailed => (false, "Transaction saved but balance update failed"),
    };

    Ok(Json(json!({"success": success, "message": message})))
}

pub async fn encrypted_callback(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload: EncryptedCallback =
        serde_json::from_value(body).map_err(|e| AppError::MalformedCallback(e.to_string()))?;

    let data = payload
        .data
        .ok_or_else(|| AppError::MalformedCallback("data field missing".to_string()))?;
    let agent_code = payload
        .agent_code
        .ok_or_else(|| AppError::MalformedCallback("agentCode field missing".to_string()))?;

    if agent_code != state.agent_code {
        warn!(agent_code = %agent_code, "encrypted callback carries unexpected agent code");
    }

    let advice: SealedAdvice = state.cipher.open(&data)?;
    let order_id = advice
        .merchantid
        .ok_or_else(|| AppError::MalformedCallback("merchantid missing".to_string()))?;

    let status = advice.status.unwrap_or_default();
    let outcome = match status.as_str() {
        "SUCCESS" => {
            state
                .deposits
                .complete_order(&order_id, advice.real_amount.as_ref())
                .await?
        }
        "FAILED" | "FAILURE" => state.deposits.fail_order(&order_id).await?,
        other => {
            info!(order_id = %order_id, status = other, "settlement advice with unhandled status acknowledged");
            return Ok(Json(
                json!({"success": true, "message": "Callback acknowledged"}),
            ));
        }
    };

    let (success, message) = match outcome {
        AdviceOutcome::Credited => (true, "Transaction saved and balance updated"),
        AdviceOutcome::Replayed => (true, "Duplicate callback ignored"),
        AdviceOutcome::Failed => (true, "Transaction saved but payment not completed"),
        AdviceOutcome::LedgerFailed => (false, "Transaction saved but balance update failed"),
    };

    Ok(Json(json!({"success": success, "message": message})))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .store
        .transaction_by_gateway_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {}", id)))?;

    Ok(Json(tx))
}

/// Gateways send timestamps in either RFC 3339 or `YYYY-MM-DD HH:MM:SS`;
/// anything else is dropped rather than rejected.
fn parse_added_on(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
