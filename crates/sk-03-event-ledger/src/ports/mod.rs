//! # Ports
//!
//! The outbound store interface the ledger service drives. Production
//! deployments mount a durable adapter behind the same trait; tests and the
//! reference wiring use the in-memory adapter.

use crate::domain::entities::LedgerEvent;
use crate::domain::errors::LedgerError;

/// Append-only, CAS-guarded event storage.
///
/// Implementations serialize appends per subject; readers see a consistent
/// snapshot at or after the last committed event.
pub trait EventStore: Send + Sync {
    /// Append `event` iff the subject tail equals `expected_prev`.
    ///
    /// ## Errors
    ///
    /// - `ChainHashCasMismatch`: tail moved under the caller
    fn append(
        &self,
        tenant_id: &str,
        subject: &str,
        expected_prev: &str,
        event: LedgerEvent,
    ) -> Result<(), LedgerError>;

    /// Current tail hash, or `None` for a subject with no events.
    fn last_chain_hash(&self, tenant_id: &str, subject: &str) -> Option<String>;

    /// All events of a subject in chain order.
    fn list(&self, tenant_id: &str, subject: &str) -> Vec<LedgerEvent>;

    /// Fetch one event by id.
    fn get(&self, tenant_id: &str, subject: &str, event_id: &str) -> Option<LedgerEvent>;

    /// The tail event of a subject (recovery reads only this).
    fn tail(&self, tenant_id: &str, subject: &str) -> Option<LedgerEvent>;
}
