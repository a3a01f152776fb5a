pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod notify;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::crypto::EnvelopeCipher;
use crate::gateway::DepositClient;
use crate::services::{DepositService, WithdrawalService};
use crate::store::SettlementStore;

#[derive(Clone)]
pub struct AppState {
    pub deposits: DepositService,
    pub withdrawals: WithdrawalService,
    pub deposit_gateway: DepositClient,
    pub store: Arc<dyn SettlementStore>,
    pub cipher: EnvelopeCipher,
    pub agent_code: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/callback", post(handlers::callbacks::payment_callback))
        .route(
            "/callback/encrypted",
            post(handlers::callbacks::encrypted_callback),
        )
        .route("/transactions/:id", get(handlers::callbacks::get_transaction))
        .route("/deposits", post(handlers::deposits::initiate_deposit))
        .route(
            "/deposits/encrypted",
            post(handlers::deposits::initiate_sealed_deposit),
        )
        .route("/withdrawals", post(handlers::withdrawals::submit_withdrawal))
        .route(
            "/withdrawals/approve/:id",
            post(handlers::withdrawals::approve_withdrawal),
        )
        .route(
            "/withdrawals/reject/:id",
            post(handlers::withdrawals::reject_withdrawal),
        )
        .route(
            "/withdrawals/:id",
            get(handlers::withdrawals::get_withdrawal),
        )
        .with_state(state)
}
