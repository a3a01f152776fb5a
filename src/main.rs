use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paybridge_core::config::Config;
use paybridge_core::crypto::EnvelopeCipher;
use paybridge_core::gateway::{DepositClient, LedgerClient, PayoutClient, RateClient};
use paybridge_core::notify::LogNotifier;
use paybridge_core::services::{DepositService, LedgerAdjuster, WithdrawalService};
use paybridge_core::store::{self, postgres::PostgresStore, SettlementStore};
use paybridge_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = store::create_pool(&config.database_url).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let store: Arc<dyn SettlementStore> = Arc::new(PostgresStore::new(pool));

    let cipher = EnvelopeCipher::new(&config.envelope_key_bytes());
    let adjuster = LedgerAdjuster::new(LedgerClient::new(config.ledger_url.clone()));
    let payout = PayoutClient::new(config.payout_gateway_url.clone());
    let rates = RateClient::new(config.fx_rate_url.clone(), config.fx_fallback_rate.clone());
    let deposit_gateway = DepositClient::new(
        config.deposit_gateway_url.clone(),
        config.deposit_gateway_username.clone(),
        config.deposit_gateway_password.clone(),
        config.deposit_gateway_id,
    );
    tracing::info!(
        "Gateway clients initialized: deposit={} payout={} ledger={}",
        config.deposit_gateway_url,
        config.payout_gateway_url,
        config.ledger_url
    );

    let deposits = DepositService::new(
        store.clone(),
        adjuster.clone(),
        cipher.clone(),
        payout.clone(),
        config.payout_agent_code.clone(),
    );
    let withdrawals = WithdrawalService::new(
        store.clone(),
        adjuster,
        payout,
        rates,
        cipher.clone(),
        Arc::new(LogNotifier),
        config.payout_agent_code.clone(),
    );

    let app_state = AppState {
        deposits,
        withdrawals,
        deposit_gateway,
        store,
        cipher,
        agent_code: config.payout_agent_code.clone(),
    };

    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
