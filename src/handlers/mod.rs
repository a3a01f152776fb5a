pub mod callbacks;
pub mod deposits;
pub mod withdrawals;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store = if state.store.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store,
        "ledger_circuit": state.withdrawals.ledger_circuit_state(),
    }))
}
