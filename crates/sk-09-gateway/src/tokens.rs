//! Ops tokens and scope requirements.

use dashmap::DashMap;
use sk_types::OpsScope;
use std::collections::HashSet;

/// Which scope an operation demands; `None` means the operation is open to
/// any caller inside the tenant (agent-authenticated surfaces).
pub fn required_scope(op: &str) -> Option<OpsScope> {
    match op {
        "agent.register" | "wallet.credit" => Some(OpsScope::FinanceWrite),
        "gate.create" | "gate.authorize_payment" | "gate.verify" | "gate.reversal" => {
            Some(OpsScope::FinanceWrite)
        }
        "dispute.open" | "dispute.close" | "arbitration.open" | "arbitration.verdict"
        | "arbitration.close" | "arbitration.appeal" => Some(OpsScope::OpsRead),
        "receipts.list" | "receipts.export" => Some(OpsScope::FinanceRead),
        "workspace.case_view" | "run.get" => Some(OpsScope::OpsRead),
        "run.events" | "reversal.events" | "reversal.event" => Some(OpsScope::AuditRead),
        // Run mutation comes from agents themselves; federation envelopes
        // carry their own trust.
        "run.create" | "run.append_event" | "federation.invoke" | "federation.result" => None,
        _ => None,
    }
}

/// Per-tenant ops tokens and their scope sets.
#[derive(Default)]
pub struct OpsTokenRegistry {
    tokens: DashMap<(String, String), HashSet<OpsScope>>,
}

impl OpsTokenRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token with the given scopes.
    pub fn issue(&self, tenant_id: &str, token: &str, scopes: &[OpsScope]) {
        self.tokens.insert(
            (tenant_id.to_string(), token.to_string()),
            scopes.iter().copied().collect(),
        );
    }

    /// Whether `token` carries `scope` within the tenant.
    pub fn has_scope(&self, tenant_id: &str, token: &str, scope: OpsScope) -> bool {
        self.tokens
            .get(&(tenant_id.to_string(), token.to_string()))
            .map(|scopes| scopes.contains(&scope))
            .unwrap_or(false)
    }

    /// Whether `token` exists at all within the tenant.
    pub fn is_known(&self, tenant_id: &str, token: &str) -> bool {
        self.tokens
            .contains_key(&(tenant_id.to_string(), token.to_string()))
    }
}
