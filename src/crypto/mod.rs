//! Envelope sealing for gateway payloads.

pub mod envelope;

pub use envelope::{EnvelopeCipher, EnvelopeError};
