//! Reversal / dispute / arbitration error types.

use sk_01_canonical::CanonicalError;
use sk_02_envelope::EnvelopeError;
use sk_03_event_ledger::LedgerError;
use sk_05_settlement::SettlementError;
use sk_08_policy::PolicyError;
use thiserror::Error;

/// Errors from the reversal and arbitration subsystems.
#[derive(Debug, Error)]
pub enum ReversalError {
    /// Same `commandId`, different payload bytes.
    #[error("Reversal command {command_id} replayed with a different payload")]
    CommandPayloadHashMismatch {
        /// The pinned command.
        command_id: String,
    },

    /// Command expiry has passed.
    #[error("Reversal command expired at {exp}")]
    CommandExpired {
        /// Expiry from the command.
        exp: u64,
    },

    /// Command signature failed, or the key is unknown.
    #[error("Reversal command signature invalid: {reason}")]
    CommandSignatureInvalid {
        /// What failed.
        reason: String,
    },

    /// The signing key does not belong to the gate's payer.
    #[error("Signing key {key_id} does not belong to the payer")]
    CommandKeyNotPayer {
        /// The offending key.
        key_id: String,
    },

    /// `target.*` does not bind to the stored settlement.
    #[error("Reversal target mismatch: {reason}")]
    TargetMismatch {
        /// What failed.
        reason: String,
    },

    /// Refund paths require request-hash evidence and none was given.
    #[error("Reversal binding evidence required")]
    BindingEvidenceRequired,

    /// Request-hash evidence differs from the bound settlement hash.
    #[error("Reversal binding evidence mismatch")]
    BindingEvidenceMismatch,

    /// `resolve_refund` requires a payee-signed decision artifact.
    #[error("Provider decision artifact required")]
    ProviderDecisionRequired,

    /// The decision artifact failed verification or does not bind.
    #[error("Provider decision invalid: {reason}")]
    ProviderDecisionInvalid {
        /// What failed.
        reason: String,
    },

    /// Dispute not found.
    #[error("Dispute not found: {dispute_id}")]
    DisputeNotFound {
        /// The missing dispute.
        dispute_id: String,
    },

    /// The dispute is already closed.
    #[error("Dispute already closed: {dispute_id}")]
    DisputeClosed {
        /// The closed dispute.
        dispute_id: String,
    },

    /// Dispute close requires request-hash binding evidence.
    #[error("Dispute close binding evidence required")]
    DisputeCloseEvidenceRequired,

    /// Dispute close evidence differs from the settlement's request hash.
    #[error("Dispute close binding evidence mismatch")]
    DisputeCloseEvidenceMismatch,

    /// Case not found.
    #[error("Arbitration case not found: {case_id}")]
    CaseNotFound {
        /// The missing case.
        case_id: String,
    },

    /// The operation needs a verdict that has not been issued.
    #[error("Arbitration case {case_id} has no verdict")]
    VerdictRequired {
        /// The case without a verdict.
        case_id: String,
    },

    /// The case is not in a state that admits this operation.
    #[error("Arbitration operation {op} invalid for case {case_id}")]
    CaseStateInvalid {
        /// Attempted operation.
        op: String,
        /// The case.
        case_id: String,
    },

    /// The verdict signer is not the case's arbiter.
    #[error("Verdict signer is not the assigned arbiter")]
    ArbiterMismatch,

    /// The verdict core fails structural checks.
    #[error("Verdict invalid: {reason}")]
    VerdictInvalid {
        /// What failed.
        reason: String,
    },

    /// Appeal not allowed.
    #[error("Appeal not allowed: {reason}")]
    AppealNotAllowed {
        /// What failed.
        reason: String,
    },

    /// Wallet-policy rejection.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Settlement-layer failure.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Ledger-layer failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Envelope-layer failure.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Canonicalization failure.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

impl ReversalError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            ReversalError::CommandPayloadHashMismatch { .. } => {
                "X402_REVERSAL_COMMAND_PAYLOAD_HASH_MISMATCH"
            }
            ReversalError::CommandExpired { .. } => "X402_REVERSAL_COMMAND_EXPIRED",
            ReversalError::CommandSignatureInvalid { .. } => "SIGNATURE_INVALID",
            ReversalError::CommandKeyNotPayer { .. } => "X402_REVERSAL_AGENT_KEY_MISMATCH",
            ReversalError::TargetMismatch { .. } => "X402_REVERSAL_TARGET_MISMATCH",
            ReversalError::BindingEvidenceRequired => "X402_REVERSAL_BINDING_EVIDENCE_REQUIRED",
            ReversalError::BindingEvidenceMismatch => "X402_REVERSAL_BINDING_EVIDENCE_MISMATCH",
            ReversalError::ProviderDecisionRequired => "X402_REVERSAL_PROVIDER_DECISION_REQUIRED",
            ReversalError::ProviderDecisionInvalid { .. } => {
                "X402_REVERSAL_PROVIDER_DECISION_INVALID"
            }
            ReversalError::DisputeNotFound { .. } => "DISPUTE_NOT_FOUND",
            ReversalError::DisputeClosed { .. } => "DISPUTE_ALREADY_CLOSED",
            ReversalError::DisputeCloseEvidenceRequired => {
                "X402_DISPUTE_CLOSE_BINDING_EVIDENCE_REQUIRED"
            }
            ReversalError::DisputeCloseEvidenceMismatch => {
                "X402_DISPUTE_CLOSE_BINDING_EVIDENCE_MISMATCH"
            }
            ReversalError::CaseNotFound { .. } => "ARBITRATION_CASE_NOT_FOUND",
            ReversalError::VerdictRequired { .. } => "ARBITRATION_VERDICT_REQUIRED",
            ReversalError::CaseStateInvalid { .. } => "ARBITRATION_CASE_STATE_INVALID",
            ReversalError::ArbiterMismatch => "ARBITRATION_ARBITER_MISMATCH",
            ReversalError::VerdictInvalid { .. } => "ARBITRATION_VERDICT_INVALID",
            ReversalError::AppealNotAllowed { .. } => "ARBITRATION_APPEAL_NOT_ALLOWED",
            ReversalError::Policy(e) => e.code(),
            ReversalError::Settlement(e) => e.code(),
            ReversalError::Ledger(e) => e.code(),
            ReversalError::Envelope(e) => e.code(),
            ReversalError::Canonical(e) => e.code(),
        }
    }

    /// HTTP-ish status for the gateway envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            ReversalError::DisputeNotFound { .. } | ReversalError::CaseNotFound { .. } => 404,
            ReversalError::VerdictInvalid { .. } => 400,
            ReversalError::Policy(e) => e.http_status(),
            ReversalError::Settlement(e) => e.http_status(),
            ReversalError::Ledger(e) => e.http_status(),
            ReversalError::Canonical(_) => 400,
            _ => 409,
        }
    }
}
