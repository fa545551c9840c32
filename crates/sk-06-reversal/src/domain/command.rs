//! `X402ReversalCommand.v1` wire records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sk_01_canonical::{hash_canonical, normalize, CanonicalError};
use sk_types::entities::{CommandId, GateId, HashHex, IdempotencyKey, KeyId, QuoteId, ReceiptId};
use sk_types::ReversalAction;

/// Schema tag for reversal commands.
pub const REVERSAL_COMMAND_SCHEMA_VERSION: &str = "X402ReversalCommand.v1";

/// What the command binds to. Mismatches against the stored settlement are
/// rejected before any effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalTarget {
    /// Gate being reversed.
    pub gate_id: GateId,
    /// Receipt the caller observed.
    pub receipt_id: ReceiptId,
    /// Quote consumed by the settlement, when the caller pins it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<QuoteId>,
    /// Request hash the settlement was bound to, when the caller pins it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_sha256: Option<HashHex>,
}

/// A payer-signed reversal command.
///
/// The payload hash covers every field except `signatureBase64`; the
/// signature is Ed25519 by `agentKeyId` over that hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalCommand {
    /// Command identifier; replay anchor.
    pub command_id: CommandId,
    /// Sponsor wallet reference, `"self"` for self-funded spends.
    pub sponsor_ref: String,
    /// Signing key id; must belong to the gate's payer when the wallet
    /// policy requires an agent key match.
    pub agent_key_id: KeyId,
    /// Binding target.
    pub target: ReversalTarget,
    /// Requested action.
    pub action: ReversalAction,
    /// Client nonce.
    pub nonce: String,
    /// Exactly-once token for the surrounding request.
    pub idempotency_key: IdempotencyKey,
    /// Expiry, unix milliseconds.
    pub exp: u64,
    /// Ed25519 signature over the payload hash.
    pub signature_base64: String,
}

impl ReversalCommand {
    /// Canonical hash of the command without its signature.
    pub fn payload_hash(&self) -> Result<String, CanonicalError> {
        let mut value = serde_json::to_value(self).expect("command is plain data");
        if let Value::Object(map) = &mut value {
            map.remove("signatureBase64");
        }
        hash_canonical(&normalize(&value)?)
    }
}

/// A reversal request as it arrives at the kernel: the signed command plus
/// the caller's binding evidence and, for `resolve_refund`, the payee's
/// signed decision artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalRequest {
    /// The signed command.
    pub command: ReversalCommand,
    /// Binding evidence (`http:request_sha256:<hex>` entries).
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    /// Payee-signed decision envelope (sealed under `decisionHash`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_decision: Option<Value>,
}
