use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub deposit_gateway_url: String,
    pub deposit_gateway_username: String,
    pub deposit_gateway_password: String,
    pub deposit_gateway_id: i64,
    pub payout_gateway_url: String,
    pub payout_agent_code: String,
    pub envelope_key: String,
    pub ledger_url: String,
    pub fx_rate_url: String,
    pub fx_fallback_rate: BigDecimal,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let envelope_key = parse_envelope_key(&env::var("ENVELOPE_KEY")?)?;

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            deposit_gateway_url: env::var("DEPOSIT_GATEWAY_URL")?,
            deposit_gateway_username: env::var("DEPOSIT_GATEWAY_USERNAME")?,
            deposit_gateway_password: env::var("DEPOSIT_GATEWAY_PASSWORD")?,
            deposit_gateway_id: env::var("DEPOSIT_GATEWAY_ID")
                .unwrap_or_else(|_| "23".to_string())
                .parse()?,
            payout_gateway_url: env::var("PAYOUT_GATEWAY_URL")?,
            payout_agent_code: env::var("PAYOUT_AGENT_CODE")?,
            envelope_key,
            ledger_url: env::var("LEDGER_URL")?,
            fx_rate_url: env::var("FX_RATE_URL")?,
            fx_fallback_rate: BigDecimal::from_str(
                &env::var("FX_FALLBACK_RATE").unwrap_or_else(|_| "0.012".to_string()),
            )?,
        };

        for url in [
            &config.deposit_gateway_url,
            &config.payout_gateway_url,
            &config.ledger_url,
            &config.fx_rate_url,
        ] {
            Url::parse(url)?;
        }

        Ok(config)
    }

    /// Raw key material for the envelope cipher. `from_env` guarantees the
    /// key is exactly 32 bytes.
    pub fn envelope_key_bytes(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(self.envelope_key.as_bytes());
        key
    }
}

fn parse_envelope_key(raw: &str) -> anyhow::Result<String> {
    if raw.as_bytes().len() != 32 {
        anyhow::bail!("ENVELOPE_KEY must be exactly 32 bytes");
    }
    Ok(raw.to_string())
}
