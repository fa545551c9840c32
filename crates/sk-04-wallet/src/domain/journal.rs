//! Journal entries binding balance movements to ledger events.

use crate::domain::errors::WalletError;
use serde::{Deserialize, Serialize};
use sk_types::entities::{AgentId, HashHex, TenantId};
use sk_types::CentsDelta;

/// One wallet's share of a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalLeg {
    /// Affected agent.
    pub agent_id: AgentId,
    /// Signed change to `available`.
    pub available_delta: CentsDelta,
    /// Signed change to `escrowLocked`.
    pub escrow_delta: CentsDelta,
}

/// Durable record of one atomic wallet operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Journal entry id.
    pub entry_id: String,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Operation name (`credit`, `lock_escrow`, `release_escrow`, …).
    pub op: String,
    /// Per-wallet deltas.
    pub legs: Vec<JournalLeg>,
    /// Chain hash of the ledger event that triggered the movement.
    pub chain_hash: HashHex,
    /// Unix milliseconds.
    pub ts: u64,
}

/// Sum every leg's deltas; internal transfers must conserve to zero.
///
/// `credit` and `debit` exchange value with the outside world and are
/// exempt; everything else aborts on a non-zero sum.
pub fn check_conservation(legs: &[JournalLeg]) -> Result<(), WalletError> {
    let sum: i64 = legs
        .iter()
        .map(|leg| leg.available_delta + leg.escrow_delta)
        .sum();
    if sum != 0 {
        return Err(WalletError::ConservationViolation { sum });
    }
    Ok(())
}
