//! # Core Entities
//!
//! Identifier aliases and lifecycle enums shared by every subsystem.
//!
//! Identifiers are opaque strings, unique within a tenant unless noted.
//! Statuses serialize in `snake_case` to match the wire envelopes.

use serde::{Deserialize, Serialize};

/// Isolation boundary for every record in the kernel.
pub type TenantId = String;

/// Principal identifier (payer, payee, arbiter, operator).
pub type AgentId = String;

/// Work-envelope identifier; the subject of the primary event chain.
pub type RunId = String;

/// Settlement gate identifier.
pub type GateId = String;

/// Durable settlement receipt identifier.
pub type ReceiptId = String;

/// Tool identifier a gate settles against.
pub type ToolId = String;

/// Provider quote identifier (unique per tenant).
pub type QuoteId = String;

/// Dispute identifier.
pub type DisputeId = String;

/// Arbitration case identifier.
pub type CaseId = String;

/// Arbitration verdict identifier.
pub type VerdictId = String;

/// Reversal command identifier (idempotency anchor for reversals).
pub type CommandId = String;

/// Ledger event identifier.
pub type EventId = String;

/// Signing-key identifier (first 16 hex chars of the JWK thumbprint).
pub type KeyId = String;

/// 64-char lowercase hex SHA-256 digest.
pub type HashHex = String;

/// Caller-chosen exactly-once token, scoped to `(tenant, key)`.
pub type IdempotencyKey = String;

/// `prevChainHash` of the first event in any chain.
pub const GENESIS_CHAIN_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// A registered principal with its signing keys and capability set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Agent identifier, unique within the tenant.
    pub agent_id: AgentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name for operator surfaces.
    pub display_name: String,
    /// Owner principal (free-form, e.g. an org handle).
    pub owner: String,
    /// Capability strings (e.g. `"arbiter"`, `"provider"`).
    pub capabilities: Vec<String>,
    /// Key ids of the agent's registered public keys.
    pub key_ids: Vec<KeyId>,
}

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Registered, no work recorded yet.
    Created,
    /// Events are being appended.
    InProgress,
    /// Terminal: completed successfully.
    Completed,
    /// Terminal: failed.
    Failed,
    /// A dispute is open against this run.
    Disputed,
}

/// Settlement gate lifecycle.
///
/// `created → authorized → released | partially_released | refunded | voided`,
/// with `verifying` parking manual-mode verification and `refund_pending` /
/// `disputed` layered on by the reversal and dispute subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Gate exists, no funds allocated.
    Created,
    /// Escrow locked from the payer wallet.
    Authorized,
    /// Manual-mode verification awaiting an operator decision.
    Verifying,
    /// Full release to the payee.
    Released,
    /// Partial release; the remainder refunded.
    PartiallyReleased,
    /// A refund request is pending the payee's decision.
    RefundPending,
    /// Funds returned to the payer.
    Refunded,
    /// Authorization voided before execution.
    Voided,
    /// A dispute is open against the settlement.
    Disputed,
}

impl GateStatus {
    /// Terminal statuses admit no further settlement transitions
    /// (reversals and disputes are layered separately).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GateStatus::Released
                | GateStatus::PartiallyReleased
                | GateStatus::Refunded
                | GateStatus::Voided
        )
    }
}

/// Verification colour reported by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Verifier is satisfied.
    Green,
    /// Verifier is uncertain.
    Amber,
    /// Verifier rejects the work.
    Red,
}

/// Payer-initiated reversal actions, gated by wallet policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalAction {
    /// Unlock escrow of a not-yet-released gate.
    VoidAuthorization,
    /// Ask the payee to refund a released gate.
    RequestRefund,
    /// Apply the payee's refund decision.
    ResolveRefund,
}

/// Dispute lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Dispute is open.
    Open,
    /// Dispute closed with binding evidence.
    Closed,
}

/// Arbitration case lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Case opened, verdict outstanding.
    UnderReview,
    /// A signed verdict has been recorded.
    VerdictIssued,
    /// Case closed after a verdict.
    Closed,
}
