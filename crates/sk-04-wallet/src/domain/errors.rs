//! Wallet error types.

use thiserror::Error;

/// Errors from the wallet ledger.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    /// No wallet registered for this agent.
    #[error("Wallet not found for agent {agent_id}")]
    WalletNotFound {
        /// The agent without a wallet.
        agent_id: String,
    },

    /// Wallet already registered.
    #[error("Wallet already exists for agent {agent_id}")]
    WalletExists {
        /// The duplicate agent.
        agent_id: String,
    },

    /// Currency code fails the shape check.
    #[error("Invalid currency code \"{currency}\"")]
    InvalidCurrency {
        /// The rejected code.
        currency: String,
    },

    /// Counterparty wallets settle in different currencies.
    #[error("Currency mismatch: {payer_currency} vs {payee_currency}")]
    CurrencyMismatch {
        /// Payer wallet currency.
        payer_currency: String,
        /// Payee wallet currency.
        payee_currency: String,
    },

    /// `available` would go negative.
    #[error("Insufficient funds: need {needed_cents}, available {available_cents}")]
    InsufficientFunds {
        /// Cents the operation needs.
        needed_cents: u64,
        /// Cents actually available.
        available_cents: u64,
    },

    /// `escrowLocked` would go negative.
    #[error("Escrow underflow: need {needed_cents}, locked {locked_cents}")]
    EscrowUnderflow {
        /// Cents the operation needs.
        needed_cents: u64,
        /// Cents actually locked.
        locked_cents: u64,
    },

    /// A transfer's legs do not sum to zero. The transaction is aborted;
    /// nothing is committed.
    #[error("Conservation violation: leg deltas sum to {sum}")]
    ConservationViolation {
        /// Non-zero sum of deltas.
        sum: i64,
    },

    /// Payer and payee must differ for transfers.
    #[error("Transfer endpoints must differ")]
    SelfTransfer,
}

impl WalletError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::WalletNotFound { .. } => "WALLET_NOT_FOUND",
            WalletError::WalletExists { .. } => "WALLET_EXISTS",
            WalletError::InvalidCurrency { .. } => "SCHEMA_INVALID",
            WalletError::CurrencyMismatch { .. } => "WALLET_CURRENCY_MISMATCH",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::EscrowUnderflow { .. } => "ESCROW_UNDERFLOW",
            WalletError::ConservationViolation { .. } => "INTERNAL_ERROR",
            WalletError::SelfTransfer => "SCHEMA_INVALID",
        }
    }

    /// HTTP-ish status for the gateway envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::WalletNotFound { .. } => 404,
            WalletError::WalletExists { .. } => 409,
            WalletError::InvalidCurrency { .. } | WalletError::SelfTransfer => 400,
            WalletError::CurrencyMismatch { .. }
            | WalletError::InsufficientFunds { .. }
            | WalletError::EscrowUnderflow { .. } => 409,
            WalletError::ConservationViolation { .. } => 500,
        }
    }
}
