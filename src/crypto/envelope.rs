//! AES-256-GCM envelope codec.
//!
//! The payout gateway exchanges JSON payloads sealed under a shared
//! 256-bit key. An envelope is `base64(nonce || ciphertext || tag)` with a
//! 96-bit nonce freshly drawn per message and the 128-bit GCM tag kept
//! adjacent to the ciphertext, so any bit flip in transit fails the
//! integrity check on open.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope format: {0}")]
    Format(String),

    #[error("envelope failed integrity check")]
    Integrity,

    #[error("envelope payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Seals and opens gateway envelopes under a fixed shared key.
#[derive(Clone)]
pub struct EnvelopeCipher {
    key: Key<Aes256Gcm>,
}

impl EnvelopeCipher {
    pub fn new(master_key: &[u8; 32]) -> Self {
        Self {
            key: *Key::<Aes256Gcm>::from_slice(master_key),
        }
    }

    /// Serializes `payload` as JSON and seals it into a transport envelope.
    pub fn seal<T: Serialize>(&self, payload: &T) -> Result<String, EnvelopeError> {
        let plaintext = serde_json::to_vec(payload)?;

        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| EnvelopeError::Integrity)?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(nonce.as_slice());
        framed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(framed))
    }

    /// Opens a transport envelope and deserializes the JSON payload.
    ///
    /// Structural problems (bad base64, short frames) report as `Format`;
    /// a frame that parses but does not authenticate reports as
    /// `Integrity` and must never be retried against the ledger.
    pub fn open<T: DeserializeOwned>(&self, envelope: &str) -> Result<T, EnvelopeError> {
        let raw = BASE64
            .decode(envelope.trim())
            .map_err(|e| EnvelopeError::Format(format!("invalid base64: {}", e)))?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(EnvelopeError::Format(format!(
                "envelope too short: {} bytes",
                raw.len()
            )));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| EnvelopeError::Integrity)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}
