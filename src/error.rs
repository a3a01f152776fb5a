use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::crypto::EnvelopeError;
use crate::gateway::{GatewayError, LedgerError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid callback data: {0}")]
    MalformedCallback(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Envelope rejected: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Gateway rejected: {0}")]
    GatewayRejected(String),

    #[error("Ledger adjustment failed: {0}")]
    LedgerAdjustmentFailed(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedCallback(_) | AppError::Validation(_) | AppError::Envelope(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) | AppError::Store(StoreError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::AlreadyProcessed(_) | AppError::Store(StoreError::Duplicate(_)) => {
                StatusCode::CONFLICT
            }
            AppError::GatewayUnavailable(_) | AppError::GatewayRejected(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::LedgerAdjustmentFailed(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(_) | GatewayError::InvalidResponse(_) => {
                AppError::GatewayUnavailable(err.to_string())
            }
            GatewayError::Rejected(_) => AppError::GatewayRejected(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::LedgerAdjustmentFailed(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
