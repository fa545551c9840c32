//! In-memory event store.

use crate::domain::entities::LedgerEvent;
use crate::domain::errors::LedgerError;
use crate::ports::EventStore;
use dashmap::DashMap;
use sk_types::GENESIS_CHAIN_HASH;

/// In-memory adapter. The per-entry shard lock of the map makes the
/// check-tail-then-push of `append` atomic per subject.
#[derive(Default)]
pub struct InMemoryEventStore {
    subjects: DashMap<(String, String), Vec<LedgerEvent>>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        tenant_id: &str,
        subject: &str,
        expected_prev: &str,
        event: LedgerEvent,
    ) -> Result<(), LedgerError> {
        let mut entry = self
            .subjects
            .entry((tenant_id.to_string(), subject.to_string()))
            .or_default();
        let actual = entry
            .last()
            .map(|e| e.chain_hash.clone())
            .unwrap_or_else(|| GENESIS_CHAIN_HASH.to_string());
        if actual != expected_prev {
            return Err(LedgerError::ChainHashCasMismatch {
                expected: expected_prev.to_string(),
                actual,
            });
        }
        entry.push(event);
        Ok(())
    }

    fn last_chain_hash(&self, tenant_id: &str, subject: &str) -> Option<String> {
        self.subjects
            .get(&(tenant_id.to_string(), subject.to_string()))
            .and_then(|events| events.last().map(|e| e.chain_hash.clone()))
    }

    fn list(&self, tenant_id: &str, subject: &str) -> Vec<LedgerEvent> {
        self.subjects
            .get(&(tenant_id.to_string(), subject.to_string()))
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn get(&self, tenant_id: &str, subject: &str, event_id: &str) -> Option<LedgerEvent> {
        self.subjects
            .get(&(tenant_id.to_string(), subject.to_string()))
            .and_then(|events| events.iter().find(|e| e.event_id == event_id).cloned())
    }

    fn tail(&self, tenant_id: &str, subject: &str) -> Option<LedgerEvent> {
        self.subjects
            .get(&(tenant_id.to_string(), subject.to_string()))
            .and_then(|events| events.last().cloned())
    }
}
