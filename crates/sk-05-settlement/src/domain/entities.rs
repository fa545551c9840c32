//! Gate entities and transition inputs.

use crate::domain::policy::ReleasePolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sk_types::entities::{
    AgentId, GateId, HashHex, QuoteId, ReceiptId, RunId, TenantId, ToolId,
};
use sk_types::{Cents, GateStatus, VerificationStatus};

/// Spend-authorization lineage presented by the payer at gate creation.
///
/// Delegation chains are created outside the kernel; the passport carries
/// the references and the depth, and wallet policy caps are checked lazily
/// when the passport is spent against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPassport {
    /// Leaf delegation reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_ref: Option<String>,
    /// Delegation actually in effect for this spend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_delegation_ref: Option<String>,
    /// Root of the delegation tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_delegation_ref: Option<String>,
    /// Depth of the leaf within the tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_depth: Option<u32>,
    /// Number of links in the presented chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_chain_length: Option<u32>,
    /// Budget cap carried by the leaf delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_cap_cents: Option<Cents>,
    /// Sponsor wallet paying on the agent's behalf; requires a signed
    /// issuer decision token at authorize-payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_wallet_ref: Option<String>,
}

impl AgentPassport {
    /// Structural validation at gate creation: a delegation leaf must point
    /// at a root, and the depth must be consistent with the chain length.
    pub fn validate(&self) -> Result<(), String> {
        if self.delegation_ref.is_some() && self.root_delegation_ref.is_none() {
            return Err("delegationRef requires rootDelegationRef".to_string());
        }
        if let (Some(depth), Some(len)) = (self.delegation_depth, self.delegation_chain_length) {
            if depth + 1 < len {
                return Err(format!(
                    "delegationDepth {depth} inconsistent with chain length {len}"
                ));
            }
        }
        Ok(())
    }
}

/// An in-flight payment commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementGate {
    /// Gate identifier.
    pub gate_id: GateId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Run this gate settles work for.
    pub run_id: RunId,
    /// Paying agent.
    pub payer_agent_id: AgentId,
    /// Paid agent (the provider).
    pub payee_agent_id: AgentId,
    /// Escrow amount.
    pub amount_cents: Cents,
    /// Settlement currency.
    pub currency: String,
    /// Tool the payment covers.
    pub tool_id: ToolId,
    /// Provider id for policy allow-lists, when distinct from the payee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Agreement this gate settles under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    /// Lifecycle status.
    pub status: GateStatus,
    /// Spend-authorization lineage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_passport: Option<AgentPassport>,
    /// Receipt emitted at the terminal transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<ReceiptId>,
    /// Request hash this settlement is bound to (from quote binding).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_sha256: Option<HashHex>,
    /// Quote consumed by this gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<QuoteId>,
    /// Cents released to the payee (terminal).
    pub released_cents: Cents,
    /// Cents refunded to the payer (terminal).
    pub refunded_cents: Cents,
    /// Human-auditable trail of decisions taken on this gate.
    pub decision_trace: Vec<String>,
    /// Creation time, unix milliseconds.
    pub created_at_ms: u64,
}

/// Inputs to `create_gate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGateInput {
    /// Gate identifier (caller-chosen, unique per tenant).
    pub gate_id: GateId,
    /// Run the gate belongs to.
    pub run_id: RunId,
    /// Paying agent.
    pub payer_agent_id: AgentId,
    /// Paid agent.
    pub payee_agent_id: AgentId,
    /// Escrow amount.
    pub amount_cents: Cents,
    /// Settlement currency.
    pub currency: String,
    /// Tool the payment covers.
    pub tool_id: ToolId,
    /// Optional provider id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Optional agreement reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    /// Optional spend-authorization lineage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_passport: Option<AgentPassport>,
}

/// A provider-side detached signature presented at verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSignature {
    /// Signer key id (must belong to the payee).
    pub key_id: String,
    /// Base64 Ed25519 signature over the bound hash.
    pub signature_base64: String,
}

/// Inputs to `verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyInput {
    /// Verifier's colour.
    pub verification_status: VerificationStatus,
    /// Release policy for this verification.
    pub policy: ReleasePolicy,
    /// How the work was verified (`"attestation"`, `"http_replay"`, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    /// Binding evidence (`http:request_sha256:<hex>`,
    /// `http:response_sha256:<hex>`).
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    /// Provider response body to re-hash for the signature binding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<Value>,
    /// Provider signature over the response hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_signature: Option<ProviderSignature>,
    /// Provider quote payload to bind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_quote_payload: Option<Value>,
    /// Expected canonical hash of the quote payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_sha256: Option<HashHex>,
    /// Provider signature over the quote hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_quote_signature: Option<ProviderSignature>,
    /// Operator decision completing a manual-mode hold: the release rate to
    /// apply, `0..=100`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_release_rate_pct: Option<u32>,
}
