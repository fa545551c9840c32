//! Policy error types.

use sk_types::ReversalAction;
use thiserror::Error;

/// Errors from policy and billing enforcement.
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// The reversal action is not in the wallet's allow-list.
    #[error("Reversal action {action:?} not allowed by wallet policy")]
    ReversalActionNotAllowed {
        /// The rejected action.
        action: ReversalAction,
    },

    /// Per-authorization amount cap exceeded.
    #[error("Amount {amount_cents} exceeds wallet policy cap {max_amount_cents}")]
    AmountExceedsLimit {
        /// Requested cents.
        amount_cents: u64,
        /// Policy cap.
        max_amount_cents: u64,
    },

    /// Daily authorization cap exceeded.
    #[error("Daily authorization total {daily_total_cents} would exceed cap {max_daily_cents}")]
    DailyLimitExceeded {
        /// Total including this authorization.
        daily_total_cents: u64,
        /// Policy cap.
        max_daily_cents: u64,
    },

    /// Provider not in the allow-list.
    #[error("Provider {provider_id} not allowed by wallet policy")]
    ProviderNotAllowed {
        /// The rejected provider.
        provider_id: String,
    },

    /// Tool not in the allow-list.
    #[error("Tool {tool_id} not allowed by wallet policy")]
    ToolNotAllowed {
        /// The rejected tool.
        tool_id: String,
    },

    /// Currency not in the allow-list.
    #[error("Currency {currency} not allowed by wallet policy")]
    CurrencyNotAllowed {
        /// The rejected currency.
        currency: String,
    },

    /// Delegation chain deeper than the policy permits.
    #[error("Delegation depth {depth} exceeds policy maximum {max_depth}")]
    DelegationTooDeep {
        /// Presented depth.
        depth: u32,
        /// Policy cap.
        max_depth: u32,
    },

    /// The wallet policy requires a provider quote and none was presented.
    #[error("Wallet policy requires a provider quote")]
    QuoteRequired,

    /// The wallet policy requires request-binding evidence at verify.
    #[error("Wallet policy requires strict request binding")]
    StrictBindingRequired,

    /// Billing hard limit reached for the current period.
    #[error("Billing plan limit exceeded for {counter}")]
    BillingLimitExceeded {
        /// Which counter breached (`verifiedRuns`, `settledVolumeCents`,
        /// `arbitrationCases`).
        counter: String,
    },
}

impl PolicyError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::ReversalActionNotAllowed { .. } => {
                "X402_WALLET_POLICY_REVERSAL_ACTION_NOT_ALLOWED"
            }
            PolicyError::AmountExceedsLimit { .. } => "X402_WALLET_POLICY_MAX_AMOUNT_EXCEEDED",
            PolicyError::DailyLimitExceeded { .. } => "X402_WALLET_POLICY_DAILY_LIMIT_EXCEEDED",
            PolicyError::ProviderNotAllowed { .. } => "X402_WALLET_POLICY_PROVIDER_NOT_ALLOWED",
            PolicyError::ToolNotAllowed { .. } => "X402_WALLET_POLICY_TOOL_NOT_ALLOWED",
            PolicyError::CurrencyNotAllowed { .. } => "X402_WALLET_POLICY_CURRENCY_NOT_ALLOWED",
            PolicyError::DelegationTooDeep { .. } => "X402_WALLET_POLICY_DELEGATION_TOO_DEEP",
            PolicyError::QuoteRequired => "X402_WALLET_POLICY_QUOTE_REQUIRED",
            PolicyError::StrictBindingRequired => "X402_WALLET_POLICY_STRICT_BINDING_REQUIRED",
            PolicyError::BillingLimitExceeded { .. } => "BILLING_PLAN_LIMIT_EXCEEDED",
        }
    }

    /// HTTP-ish status for the gateway envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            PolicyError::BillingLimitExceeded { .. } => 402,
            _ => 409,
        }
    }
}
