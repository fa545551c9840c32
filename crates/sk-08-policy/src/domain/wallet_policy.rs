//! `X402WalletPolicy.v1` records and pure checks.

use crate::domain::errors::PolicyError;
use serde::{Deserialize, Serialize};
use sk_types::{Cents, ReversalAction};

/// Schema tag carried by serialized policies.
pub const WALLET_POLICY_SCHEMA_VERSION: &str = "X402WalletPolicy.v1";

/// Per-(tenant, agent) spending policy.
///
/// `None` allow-lists mean "no restriction"; the default policy permits
/// everything except reversals, which must be opted into explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPolicy {
    /// Schema tag.
    pub schema_version: String,
    /// Reversal actions the payer may issue.
    pub allowed_reversal_actions: Vec<ReversalAction>,
    /// Verification must present a bound provider quote.
    pub require_quote: bool,
    /// Binding evidence must match exactly at verify and reversal.
    pub require_strict_request_binding: bool,
    /// Reversal commands must be signed by a key of the gate's payer agent.
    pub require_agent_key_match: bool,
    /// Per-authorization cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount_cents: Option<Cents>,
    /// Rolling per-UTC-day authorization cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_daily_authorization_cents: Option<Cents>,
    /// Permitted provider ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_provider_ids: Option<Vec<String>>,
    /// Permitted tool ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tool_ids: Option<Vec<String>>,
    /// Permitted currencies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_currencies: Option<Vec<String>>,
    /// Maximum delegation-chain depth accepted at spend time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delegation_depth: Option<u32>,
}

impl Default for WalletPolicy {
    fn default() -> Self {
        Self {
            schema_version: WALLET_POLICY_SCHEMA_VERSION.to_string(),
            allowed_reversal_actions: Vec::new(),
            require_quote: false,
            require_strict_request_binding: false,
            require_agent_key_match: true,
            max_amount_cents: None,
            max_daily_authorization_cents: None,
            allowed_provider_ids: None,
            allowed_tool_ids: None,
            allowed_currencies: None,
            max_delegation_depth: None,
        }
    }
}

impl WalletPolicy {
    /// A policy allowing every reversal action (test and sandbox default).
    pub fn permissive() -> Self {
        Self {
            allowed_reversal_actions: vec![
                ReversalAction::VoidAuthorization,
                ReversalAction::RequestRefund,
                ReversalAction::ResolveRefund,
            ],
            ..Self::default()
        }
    }

    /// Gate a reversal action.
    pub fn check_reversal_action(&self, action: ReversalAction) -> Result<(), PolicyError> {
        if !self.allowed_reversal_actions.contains(&action) {
            return Err(PolicyError::ReversalActionNotAllowed { action });
        }
        Ok(())
    }

    /// Gate an authorization (amount, allow-lists, delegation depth).
    /// `daily_total_cents` already includes the requested amount.
    pub fn check_authorization(
        &self,
        amount_cents: Cents,
        currency: &str,
        tool_id: &str,
        provider_id: Option<&str>,
        delegation_depth: Option<u32>,
        daily_total_cents: Cents,
    ) -> Result<(), PolicyError> {
        if let Some(max) = self.max_amount_cents {
            if amount_cents > max {
                return Err(PolicyError::AmountExceedsLimit {
                    amount_cents,
                    max_amount_cents: max,
                });
            }
        }
        if let Some(max_daily) = self.max_daily_authorization_cents {
            if daily_total_cents > max_daily {
                return Err(PolicyError::DailyLimitExceeded {
                    daily_total_cents,
                    max_daily_cents: max_daily,
                });
            }
        }
        if let Some(currencies) = &self.allowed_currencies {
            if !currencies.iter().any(|c| c == currency) {
                return Err(PolicyError::CurrencyNotAllowed {
                    currency: currency.to_string(),
                });
            }
        }
        if let Some(tools) = &self.allowed_tool_ids {
            if !tools.iter().any(|t| t == tool_id) {
                return Err(PolicyError::ToolNotAllowed {
                    tool_id: tool_id.to_string(),
                });
            }
        }
        if let (Some(providers), Some(provider_id)) = (&self.allowed_provider_ids, provider_id) {
            if !providers.iter().any(|p| p == provider_id) {
                return Err(PolicyError::ProviderNotAllowed {
                    provider_id: provider_id.to_string(),
                });
            }
        }
        if let (Some(max_depth), Some(depth)) = (self.max_delegation_depth, delegation_depth) {
            if depth > max_depth {
                return Err(PolicyError::DelegationTooDeep { depth, max_depth });
            }
        }
        Ok(())
    }
}
