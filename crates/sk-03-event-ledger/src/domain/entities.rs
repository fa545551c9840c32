//! Ledger entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sk_types::entities::{EventId, HashHex, RunId, TenantId};
use sk_types::RunStatus;

/// A single chained event.
///
/// `chainHash = SHA256(canonical(event without chainHash))`; the hashed
/// form includes `prevChainHash`, so each event commits to its ancestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Event identifier (unique within the subject).
    pub event_id: EventId,
    /// Event type tag (e.g. `settlement_released`, `refund_requested`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload (already normalized).
    pub payload: Value,
    /// Chain hash of the predecessor, or the genesis hash.
    pub prev_chain_hash: HashHex,
    /// This event's chain hash.
    pub chain_hash: HashHex,
    /// Unix milliseconds at append time.
    pub ts: u64,
}

/// Result of a successful append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    /// The persisted event.
    pub event: LedgerEvent,
    /// The subject's new tail hash (equals `event.chain_hash`).
    pub last_chain_hash: HashHex,
}

/// A work envelope whose events form the primary chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Run identifier.
    pub run_id: RunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Tail hash of the run's event chain.
    pub last_chain_hash: HashHex,
}

/// Subject-key constructors. A subject names one exclusive event chain.
pub mod subject {
    /// The primary chain of a run.
    pub fn run(run_id: &str) -> String {
        format!("run/{run_id}")
    }

    /// The reversal stream of a gate (separate subject from the run chain).
    pub fn gate_reversals(gate_id: &str) -> String {
        format!("gate/{gate_id}/reversals")
    }

    /// The event stream of an arbitration case.
    pub fn arbitration_case(case_id: &str) -> String {
        format!("case/{case_id}")
    }
}
