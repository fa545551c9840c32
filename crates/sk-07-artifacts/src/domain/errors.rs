//! Artifact error types.

use sk_01_canonical::CanonicalError;
use sk_02_envelope::EnvelopeError;
use thiserror::Error;

/// Errors from artifact building, conformance and federation.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The adapter subprocess exceeded its deadline and was killed.
    #[error("Adapter timed out after {timeout_ms}ms")]
    AdapterTimeout {
        /// Configured deadline.
        timeout_ms: u64,
    },

    /// The adapter exited non-zero or could not be spawned.
    #[error("Adapter execution failed: {detail}")]
    AdapterExecFailed {
        /// Exit status or spawn error.
        detail: String,
    },

    /// Adapter output exceeded the configured byte cap.
    #[error("Adapter output exceeded {max_bytes} bytes")]
    AdapterOutputTooLarge {
        /// Configured cap.
        max_bytes: usize,
    },

    /// Report/cert cross-validation failed; every broken pairing listed.
    #[error("Cert pairing invalid: {diagnostics:?}")]
    CertPairingInvalid {
        /// Enumerated failures.
        diagnostics: Vec<String>,
    },

    /// Coordinator key is not a known trust anchor.
    #[error("Untrusted federation coordinator: {key_id}")]
    UntrustedCoordinator {
        /// The unknown key.
        key_id: String,
    },

    /// The trust anchor is revoked.
    #[error("Federation trust anchor revoked: {key_id}")]
    TrustAnchorRevoked {
        /// The revoked key.
        key_id: String,
    },

    /// The anchor was rotated before the envelope was signed.
    #[error("Federation trust anchor rotated before signedAt")]
    TrustAnchorRotated,

    /// Envelope's `trust.anchorVersion` does not match the registry.
    #[error("Federation anchor version mismatch: envelope {envelope}, registry {registry}")]
    AnchorVersionMismatch {
        /// Version in the envelope.
        envelope: u64,
        /// Version in the registry.
        registry: u64,
    },

    /// Envelope structure missing required federation fields.
    #[error("Federation envelope invalid: {reason}")]
    FederationEnvelopeInvalid {
        /// What failed.
        reason: String,
    },

    /// Envelope-layer failure.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Canonicalization failure.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

impl ArtifactError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            ArtifactError::AdapterTimeout { .. } => "ADAPTER_TIMEOUT",
            ArtifactError::AdapterExecFailed { .. } => "ADAPTER_EXEC_FAILED",
            ArtifactError::AdapterOutputTooLarge { .. } => "ADAPTER_OUTPUT_TOO_LARGE",
            ArtifactError::CertPairingInvalid { .. } => "CONFORMANCE_CERT_PAIRING_INVALID",
            ArtifactError::UntrustedCoordinator { .. } => "FEDERATION_UNTRUSTED_COORDINATOR",
            ArtifactError::TrustAnchorRevoked { .. } => "FEDERATION_TRUST_ANCHOR_REVOKED",
            ArtifactError::TrustAnchorRotated => "FEDERATION_TRUST_ANCHOR_ROTATED",
            ArtifactError::AnchorVersionMismatch { .. } => "FEDERATION_ANCHOR_VERSION_MISMATCH",
            ArtifactError::FederationEnvelopeInvalid { .. } => "SCHEMA_INVALID",
            ArtifactError::Envelope(e) => e.code(),
            ArtifactError::Canonical(e) => e.code(),
        }
    }

    /// HTTP-ish status for the gateway envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            ArtifactError::UntrustedCoordinator { .. }
            | ArtifactError::TrustAnchorRevoked { .. }
            | ArtifactError::TrustAnchorRotated
            | ArtifactError::AnchorVersionMismatch { .. } => 403,
            ArtifactError::FederationEnvelopeInvalid { .. } => 400,
            ArtifactError::CertPairingInvalid { .. } => 409,
            ArtifactError::Envelope(_) => 409,
            ArtifactError::Canonical(_) => 400,
            _ => 500,
        }
    }
}
