//! Settlement error types.

use sk_01_canonical::CanonicalError;
use sk_02_envelope::EnvelopeError;
use sk_03_event_ledger::LedgerError;
use sk_04_wallet::WalletError;
use sk_types::GateStatus;
use thiserror::Error;

/// Errors from the settlement state machine.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Gate not registered.
    #[error("Gate not found: {gate_id}")]
    GateNotFound {
        /// The missing gate.
        gate_id: String,
    },

    /// Gate id already used.
    #[error("Gate already exists: {gate_id}")]
    GateExists {
        /// The duplicate gate.
        gate_id: String,
    },

    /// The requested operation is not legal from the gate's status.
    #[error("Operation {op} is invalid from status {status:?}")]
    InvalidTransition {
        /// Attempted operation.
        op: String,
        /// Current gate status.
        status: GateStatus,
    },

    /// The agent passport failed structural validation.
    #[error("Agent passport invalid: {reason}")]
    PassportInvalid {
        /// What failed.
        reason: String,
    },

    /// Sponsor wallets require a signed issuer decision token.
    #[error("Sponsor wallet requires a signed issuer decision")]
    SponsorDecisionRequired,

    /// The sponsor decision token failed verification or denies the spend.
    #[error("Sponsor issuer decision rejected: {reason}")]
    SponsorDecisionRejected {
        /// What failed.
        reason: String,
    },

    /// Provider-signature binding failed.
    #[error("Provider signature invalid: {reason}")]
    ProviderSignatureInvalid {
        /// What failed.
        reason: String,
    },

    /// Quote binding failed.
    #[error("Quote binding mismatch: {reason}")]
    QuoteBindingMismatch {
        /// What failed.
        reason: String,
    },

    /// A quote id was presented twice.
    #[error("Quote already consumed: {quote_id}")]
    QuoteAlreadyUsed {
        /// The duplicate quote.
        quote_id: String,
    },

    /// Release rate outside `0..=100`.
    #[error("Release rate {pct} out of range")]
    ReleaseRateOutOfRange {
        /// The rejected percentage.
        pct: u32,
    },

    /// Receipt not found.
    #[error("Receipt not found: {receipt_id}")]
    ReceiptNotFound {
        /// The missing receipt.
        receipt_id: String,
    },

    /// Wallet-layer failure.
    #[error(transparent)]
    Wallet(#[from] WalletError),

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

impl SettlementError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::GateNotFound { .. } => "GATE_NOT_FOUND",
            SettlementError::GateExists { .. } => "GATE_EXISTS",
            SettlementError::InvalidTransition { .. } => "SETTLEMENT_INVALID_TRANSITION",
            SettlementError::PassportInvalid { .. } => "SCHEMA_INVALID",
            SettlementError::SponsorDecisionRequired => "X402_WALLET_ISSUER_DECISION_REQUIRED",
            SettlementError::SponsorDecisionRejected { .. } => {
                "X402_WALLET_ISSUER_DECISION_REJECTED"
            }
            SettlementError::ProviderSignatureInvalid { .. } => "PROVIDER_SIGNATURE_INVALID",
            SettlementError::QuoteBindingMismatch { .. } => "QUOTE_BINDING_MISMATCH",
            SettlementError::QuoteAlreadyUsed { .. } => "QUOTE_BINDING_MISMATCH",
            SettlementError::ReleaseRateOutOfRange { .. } => "SCHEMA_INVALID",
            SettlementError::ReceiptNotFound { .. } => "RECEIPT_NOT_FOUND",
            SettlementError::Wallet(e) => e.code(),
            SettlementError::Ledger(e) => e.code(),
            SettlementError::Envelope(e) => e.code(),
            SettlementError::Canonical(e) => e.code(),
        }
    }

    /// HTTP-ish status for the gateway envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            SettlementError::GateNotFound { .. } | SettlementError::ReceiptNotFound { .. } => 404,
            SettlementError::GateExists { .. } | SettlementError::InvalidTransition { .. } => 409,
            SettlementError::PassportInvalid { .. }
            | SettlementError::ReleaseRateOutOfRange { .. } => 400,
            SettlementError::SponsorDecisionRequired
            | SettlementError::SponsorDecisionRejected { .. }
            | SettlementError::ProviderSignatureInvalid { .. }
            | SettlementError::QuoteBindingMismatch { .. }
            | SettlementError::QuoteAlreadyUsed { .. } => 409,
            SettlementError::Wallet(e) => e.http_status(),
            SettlementError::Ledger(e) => e.http_status(),
            SettlementError::Envelope(_) => 409,
            SettlementError::Canonical(_) => 400,
        }
    }
}
