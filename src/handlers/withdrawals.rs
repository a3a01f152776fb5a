//! Withdrawal lifecycle endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::handlers::deposits::{positive_amount, required};
use crate::services::WithdrawalRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitWithdrawalBody {
    #[serde(rename = "accountNo")]
    pub account_no: Option<String>,
    pub account: Option<String>,
    pub ifsc: Option<String>,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub amount: Option<BigDecimal>,
    pub note: Option<String>,
}

/// Accepts a payout request, debits the payer and stores the pending
/// withdrawal for later approval.
pub async fn submit_withdrawal(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let body: SubmitWithdrawalBody =
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))?;

    let request = WithdrawalRequest {
        account_number: required(body.account_no, "accountNo")?,
        bank_account: required(body.account, "account")?,
        ifsc: required(body.ifsc, "ifsc")?,
        holder_name: required(body.name, "name")?,
        contact: required(body.mobile, "mobile")?,
        amount: positive_amount(body.amount)?,
        note: body.note.filter(|n| !n.trim().is_empty()),
    };

    let withdrawal = state.withdrawals.submit(request).await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// Releases a pending withdrawal to the payout gateway.
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state.withdrawals.approve(&order_id).await?;
    Ok(Json(withdrawal))
}

/// Rejects a pending withdrawal and refunds the debited amount.
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state.withdrawals.reject(&order_id).await?;
    Ok(Json(withdrawal))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state.withdrawals.get(&order_id).await?;
    Ok(Json(withdrawal))
}
