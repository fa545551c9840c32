//! Wallet entities.

use serde::{Deserialize, Serialize};
use sk_types::entities::{AgentId, TenantId};
use sk_types::Cents;

/// Mutable balance record, one per (tenant, agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning agent.
    pub agent_id: AgentId,
    /// ISO-4217-like currency code (3+ uppercase letters).
    pub currency: String,
    /// Spendable cents.
    pub available_cents: Cents,
    /// Cents locked under settlement gates.
    pub escrow_locked_cents: Cents,
}

/// Read-only view returned by queries.
pub type WalletSnapshot = Wallet;

/// Minimal currency shape check (the kernel does not convert currencies).
pub fn currency_is_valid(code: &str) -> bool {
    code.len() >= 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
