//! Chain-hash computation.

use crate::domain::entities::LedgerEvent;
use crate::domain::errors::LedgerError;
use serde_json::json;
use sk_01_canonical::{hash_canonical, normalize};

/// Compute the chain hash of an event from its pre-hash fields.
///
/// The digest input is the canonical form of the event *without*
/// `chainHash`; `prevChainHash` is included, which is what links the chain.
pub fn compute_chain_hash(
    event_id: &str,
    event_type: &str,
    payload: &serde_json::Value,
    prev_chain_hash: &str,
    ts: u64,
) -> Result<String, LedgerError> {
    let pre_hash = json!({
        "eventId": event_id,
        "type": event_type,
        "payload": payload,
        "prevChainHash": prev_chain_hash,
        "ts": ts,
    });
    let normalized = normalize(&pre_hash)?;
    Ok(hash_canonical(&normalized)?)
}

/// Recompute and check an event's own hash and its link to `expected_prev`.
pub fn verify_link(event: &LedgerEvent, expected_prev: &str) -> Result<(), LedgerError> {
    if event.prev_chain_hash != expected_prev {
        return Err(LedgerError::BrokenChain {
            event_id: event.event_id.clone(),
        });
    }
    let recomputed = compute_chain_hash(
        &event.event_id,
        &event.event_type,
        &event.payload,
        &event.prev_chain_hash,
        event.ts,
    )?;
    if recomputed != event.chain_hash {
        return Err(LedgerError::BrokenChain {
            event_id: event.event_id.clone(),
        });
    }
    Ok(())
}
