//! Deposit initiation endpoints.

use axum::{extract::State, response::IntoResponse, Json};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiateDepositRequest {
    pub amount: Option<BigDecimal>,
    pub merchant_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SealedDepositRequest {
    pub orderid: Option<String>,
    #[serde(rename = "accountNo")]
    pub account_no: Option<String>,
    pub amount: Option<BigDecimal>,
}

/// Starts a hosted-checkout deposit and hands the payer the checkout URL.
pub async fn initiate_deposit(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let request: InitiateDepositRequest =
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))?;

    let amount = positive_amount(request.amount)?;
    let merchant_user_id = required(request.merchant_user_id, "merchant_user_id")?;

    let initiation = state
        .deposit_gateway
        .initiate_payment(&amount, &merchant_user_id)
        .await?;

    Ok(Json(json!({
        "payment_url": initiation.payment_url,
        "gateway_txn_id": initiation.gateway_txn_id,
        "merchant_txn_id": initiation.merchant_txn_id,
    })))
}

/// Opens a deposit order on the sealed gateway and relays its
/// acknowledgement, decrypted where possible.
pub async fn initiate_sealed_deposit(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let request: SealedDepositRequest =
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))?;

    let order_id = required(request.orderid, "orderid")?;
    if order_id.len() > 16 {
        return Err(AppError::Validation(
            "orderid must be at most 16 characters".to_string(),
        ));
    }
    let account_number = required(request.account_no, "accountNo")?;
    let amount = positive_amount(request.amount)?;

    let ack = state
        .deposits
        .open_sealed_order(order_id, account_number, amount)
        .await?;

    Ok(Json(json!({
        "raw": ack.raw,
        "decrypted": ack.decrypted,
    })))
}

pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

pub(crate) fn positive_amount(value: Option<BigDecimal>) -> Result<BigDecimal, AppError> {
    let amount =
        value.ok_or_else(|| AppError::Validation("amount is required".to_string()))?;
    if amount <= BigDecimal::from(0) {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn required_rejects_blank_values() {
        assert!(required(None, "orderid").is_err());
        assert!(required(Some("  ".to_string()), "orderid").is_err());
        assert_eq!(
            required(Some("ORD1".to_string()), "orderid").unwrap(),
            "ORD1"
        );
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(positive_amount(None).is_err());
        assert!(positive_amount(Some(BigDecimal::from(0))).is_err());
        assert!(positive_amount(Some(BigDecimal::from_str("-5").unwrap())).is_err());
        assert!(positive_amount(Some(BigDecimal::from_str("0.01").unwrap())).is_ok());
    }
}
