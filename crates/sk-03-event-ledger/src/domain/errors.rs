//! Ledger error types.

use sk_01_canonical::CanonicalError;
use thiserror::Error;

/// Errors from the event-ledger subsystem.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Subject has no chain yet and none was expected to exist.
    #[error("Subject not found: {subject}")]
    SubjectNotFound {
        /// The missing subject key.
        subject: String,
    },

    /// Run not registered.
    #[error("Run not found: {run_id}")]
    RunNotFound {
        /// The missing run.
        run_id: String,
    },

    /// Run id already registered.
    #[error("Run already exists: {run_id}")]
    RunExists {
        /// The duplicate run.
        run_id: String,
    },

    /// CAS precondition failed: the caller's `expectedPrevChainHash` is
    /// stale. The caller re-reads the tail and retries explicitly.
    #[error("Chain-hash CAS mismatch: expected {expected}, actual {actual}")]
    ChainHashCasMismatch {
        /// Tail hash the caller presented.
        expected: String,
        /// Current tail hash.
        actual: String,
    },

    /// Same idempotency key, different request bytes.
    #[error("Idempotency key reused with a different request body")]
    IdempotencyBodyMismatch,

    /// Event not present in the subject chain.
    #[error("Event not found: {event_id}")]
    EventNotFound {
        /// The missing event.
        event_id: String,
    },

    /// A stored event fails hash or linkage verification.
    #[error("Broken chain at event {event_id}")]
    BrokenChain {
        /// The event whose hash or link failed.
        event_id: String,
    },

    /// Payload failed canonical validation.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

impl LedgerError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::SubjectNotFound { .. } => "SUBJECT_NOT_FOUND",
            LedgerError::RunNotFound { .. } => "RUN_NOT_FOUND",
            LedgerError::RunExists { .. } => "RUN_EXISTS",
            LedgerError::ChainHashCasMismatch { .. } => "CHAIN_HASH_CAS_MISMATCH",
            LedgerError::IdempotencyBodyMismatch => "IDEMPOTENCY_BODY_MISMATCH",
            LedgerError::EventNotFound { .. } => "EVENT_NOT_FOUND",
            LedgerError::BrokenChain { .. } => "CHAIN_INTEGRITY_VIOLATION",
            LedgerError::Canonical(e) => e.code(),
        }
    }

    /// HTTP-ish status for the gateway envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::SubjectNotFound { .. }
            | LedgerError::RunNotFound { .. }
            | LedgerError::EventNotFound { .. } => 404,
            LedgerError::RunExists { .. }
            | LedgerError::ChainHashCasMismatch { .. }
            | LedgerError::IdempotencyBodyMismatch => 409,
            LedgerError::BrokenChain { .. } => 500,
            LedgerError::Canonical(_) => 400,
        }
    }
}
