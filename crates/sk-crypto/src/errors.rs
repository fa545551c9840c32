//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Public key bytes do not form a valid curve point.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Base64 or length failure while decoding a key or signature.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A hash argument was not 64 lowercase hex chars.
    #[error("Invalid hash hex: expected 64 hex chars, got {actual} chars")]
    InvalidHashHex {
        /// Length of the rejected input.
        actual: usize,
    },

    /// Signature did not verify against the public key.
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Webhook timestamp outside the tolerance window.
    #[error("Webhook timestamp skew {skew_seconds}s exceeds tolerance {tolerance_seconds}s")]
    TimestampOutOfTolerance {
        /// Observed absolute skew.
        skew_seconds: u64,
        /// Configured tolerance.
        tolerance_seconds: u64,
    },

    /// Webhook signature mismatch.
    #[error("Webhook signature mismatch")]
    WebhookSignatureMismatch,
}
