//! Envelope error types.

use sk_01_canonical::CanonicalError;
use thiserror::Error;

/// Failures while sealing or opening a signed envelope.
#[derive(Debug, Clone, Error)]
pub enum EnvelopeError {
    /// Cores must be JSON objects.
    #[error("Envelope core must be an object")]
    CoreNotAnObject,

    /// The core already carried the hash field or a signature.
    #[error("Core must not contain reserved field \"{field}\"")]
    ReservedField {
        /// The offending field name.
        field: String,
    },

    /// The core failed canonical normalization.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// Recomputed core hash differs from the embedded hash field.
    #[error("Payload hash mismatch: embedded {embedded}, recomputed {recomputed}")]
    PayloadHashMismatch {
        /// Hash stored in the envelope.
        embedded: String,
        /// Hash recomputed from the stripped core.
        recomputed: String,
    },

    /// The envelope carries no signature block where one is required.
    #[error("Envelope is missing its signature block")]
    MissingSignature,

    /// Signature block malformed or algorithm unsupported.
    #[error("Unsupported signature algorithm \"{algorithm}\"")]
    UnsupportedAlgorithm {
        /// Algorithm named by the envelope.
        algorithm: String,
    },

    /// Signer key id not present in the registry.
    #[error("Unknown signer key \"{key_id}\"")]
    SignerKeyUnknown {
        /// The unresolvable key id.
        key_id: String,
    },

    /// Ed25519 verification failed.
    #[error("Signature invalid")]
    SignatureInvalid,

    /// Signing failed (malformed hash input).
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl EnvelopeError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeError::CoreNotAnObject | EnvelopeError::ReservedField { .. } => "SCHEMA_INVALID",
            EnvelopeError::Canonical(e) => e.code(),
            EnvelopeError::PayloadHashMismatch { .. } => "SIGNATURE_PAYLOAD_HASH_MISMATCH",
            EnvelopeError::MissingSignature
            | EnvelopeError::UnsupportedAlgorithm { .. }
            | EnvelopeError::SignatureInvalid => "SIGNATURE_INVALID",
            EnvelopeError::SignerKeyUnknown { .. } => "SIGNER_KEY_UNKNOWN",
            EnvelopeError::Signing(_) => "INTERNAL_ERROR",
        }
    }
}
