//! `X402ReceiptRecord.v1` cores and the receipt index.

use crate::domain::policy::ReleasePolicy;
use serde::{Deserialize, Serialize};
use sk_types::entities::{
    AgentId, GateId, HashHex, KeyId, QuoteId, ReceiptId, RunId, TenantId, ToolId,
};
use sk_types::{Cents, MilliCents, VerificationStatus};

/// Schema tag for receipt envelopes.
pub const RECEIPT_SCHEMA_VERSION: &str = "X402ReceiptRecord.v1";

/// Terminal outcome recorded by a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Full release to the payee.
    Released,
    /// Partial release; remainder refunded.
    PartiallyReleased,
    /// Funds returned to the payer (verify at 0%, void, or accepted refund).
    Refunded,
}

/// Spend-authorization lineage bound into the receipt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendAuthorizationBinding {
    /// Leaf delegation reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_ref: Option<String>,
    /// Delegation in effect for this spend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_delegation_ref: Option<String>,
    /// Root of the delegation tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_delegation_ref: Option<String>,
    /// Depth of the leaf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_depth: Option<u32>,
    /// Presented chain length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_chain_length: Option<u32>,
}

/// Provider-signature binding as recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSigReceiptBinding {
    /// Whether the signature verified.
    pub verified: bool,
    /// Signer key id.
    pub key_id: KeyId,
    /// JWK thumbprint of the signer key.
    pub jwk_thumbprint: HashHex,
    /// Canonical hash of the provider response.
    pub response_sha256: HashHex,
}

/// Quote binding as recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteReceiptBinding {
    /// Whether the quote signature verified.
    pub verified: bool,
    /// Quote signing key id.
    pub key_id: KeyId,
    /// JWK thumbprint of the quote signing key.
    pub jwk_thumbprint: HashHex,
    /// Quote identifier.
    pub quote_id: QuoteId,
    /// Canonical hash of the quote payload.
    pub quote_sha256: HashHex,
    /// Request hash the quote binds to.
    pub request_binding_sha256: HashHex,
}

/// All bindings carried by a receipt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptBindings {
    /// Spend-authorization lineage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_authorization: Option<SpendAuthorizationBinding>,
    /// Provider response signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_sig: Option<ProviderSigReceiptBinding>,
    /// Provider quote signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_quote_sig: Option<QuoteReceiptBinding>,
}

/// How the settlement was verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationContext {
    /// Verifier colour.
    pub verification_status: VerificationStatus,
    /// Verification method label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    /// Binding evidence list.
    pub evidence_refs: Vec<String>,
    /// Release policy that was applied.
    pub policy: ReleasePolicy,
}

/// The decision taken and its arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    /// Applied release rate.
    pub release_rate_pct: u32,
    /// Cents released to the payee.
    pub released_cents: Cents,
    /// Cents refunded to the payer.
    pub refunded_cents: Cents,
    /// Exact milli-cent release before flooring.
    pub released_milli_cents: MilliCents,
    /// Ordered trail of decisions taken on the gate.
    pub decision_trace: Vec<String>,
}

/// Receipt core; sealed under `receiptHash` by the engine's server key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptCore {
    /// Schema tag.
    pub schema_version: String,
    /// Receipt identifier.
    pub receipt_id: ReceiptId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Gate this receipt settles.
    pub gate_id: GateId,
    /// Run the gate belongs to.
    pub run_id: RunId,
    /// Paying agent.
    pub payer_agent_id: AgentId,
    /// Paid agent.
    pub payee_agent_id: AgentId,
    /// Tool the payment covered.
    pub tool_id: ToolId,
    /// Agreement the gate settled under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    /// Escrowed amount.
    pub amount_cents: Cents,
    /// Settlement currency.
    pub currency: String,
    /// Terminal outcome.
    pub status: ReceiptStatus,
    /// Cryptographic bindings.
    pub bindings: ReceiptBindings,
    /// Verification context.
    pub verification_context: VerificationContext,
    /// Decision record.
    pub decision_record: DecisionRecord,
    /// RFC-3339 issue time.
    pub issued_at: String,
    /// Issue time, unix milliseconds (listing order key).
    pub issued_at_ms: u64,
}

/// Secondary-index entry, ordered by `(issued_at_ms, receipt_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptIndexEntry {
    /// Issue time, unix milliseconds.
    pub issued_at_ms: u64,
    /// Receipt identifier.
    pub receipt_id: ReceiptId,
    /// Gate identifier.
    pub gate_id: GateId,
    /// Run identifier.
    pub run_id: RunId,
    /// Tool identifier.
    pub tool_id: ToolId,
    /// Agreement identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
}
