//! # Event Ledger Service
//!
//! Inbound API combining chain computation, the event store and the run
//! registry. Callers that hold a subject lock (the orchestrator) append
//! with `expected_prev = None`; external appends present the tail they
//! observed and get a CAS failure if it moved.

use crate::domain::chain::{compute_chain_hash, verify_link};
use crate::domain::entities::{AppendOutcome, LedgerEvent, Run};
use crate::domain::errors::LedgerError;
use crate::ports::EventStore;
use dashmap::DashMap;
use serde_json::Value;
use sk_01_canonical::normalize;
use sk_types::{RunStatus, GENESIS_CHAIN_HASH};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Per-subject chained event ledger.
pub struct EventLedger {
    store: Arc<dyn EventStore>,
    runs: DashMap<(String, String), Run>,
}

impl EventLedger {
    /// Create a ledger over a store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            runs: DashMap::new(),
        }
    }

    /// Register a run. The run's chain starts at the genesis hash.
    pub fn create_run(&self, tenant_id: &str, run_id: &str) -> Result<Run, LedgerError> {
        let key = (tenant_id.to_string(), run_id.to_string());
        if self.runs.contains_key(&key) {
            return Err(LedgerError::RunExists {
                run_id: run_id.to_string(),
            });
        }
        let run = Run {
            run_id: run_id.to_string(),
            tenant_id: tenant_id.to_string(),
            status: RunStatus::Created,
            last_chain_hash: GENESIS_CHAIN_HASH.to_string(),
        };
        self.runs.insert(key, run.clone());
        debug!(tenant_id, run_id, "run created");
        Ok(run)
    }

    /// Fetch a run.
    pub fn get_run(&self, tenant_id: &str, run_id: &str) -> Result<Run, LedgerError> {
        self.runs
            .get(&(tenant_id.to_string(), run_id.to_string()))
            .map(|r| r.clone())
            .ok_or_else(|| LedgerError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Update a run's lifecycle status.
    pub fn set_run_status(
        &self,
        tenant_id: &str,
        run_id: &str,
        status: RunStatus,
    ) -> Result<Run, LedgerError> {
        let mut entry = self
            .runs
            .get_mut(&(tenant_id.to_string(), run_id.to_string()))
            .ok_or_else(|| LedgerError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        entry.status = status;
        Ok(entry.clone())
    }

    /// Append an event to a subject chain.
    ///
    /// `expected_prev = Some(h)` is the external CAS form; `None` trusts the
    /// current tail (caller already holds the subject's exclusive lock).
    pub fn append_event(
        &self,
        tenant_id: &str,
        subject: &str,
        expected_prev: Option<&str>,
        event_type: &str,
        payload: Value,
        ts: u64,
    ) -> Result<AppendOutcome, LedgerError> {
        let payload = normalize(&payload)?;
        let prev = match expected_prev {
            Some(h) => h.to_string(),
            None => self
                .store
                .last_chain_hash(tenant_id, subject)
                .unwrap_or_else(|| GENESIS_CHAIN_HASH.to_string()),
        };

        let event_id = format!("evt_{}", Uuid::new_v4().simple());
        let chain_hash = compute_chain_hash(&event_id, event_type, &payload, &prev, ts)?;
        let event = LedgerEvent {
            event_id,
            event_type: event_type.to_string(),
            payload,
            prev_chain_hash: prev.clone(),
            chain_hash: chain_hash.clone(),
            ts,
        };

        self.store.append(tenant_id, subject, &prev, event.clone())?;

        if let Some(run_id) = subject.strip_prefix("run/") {
            if let Some(mut run) = self
                .runs
                .get_mut(&(tenant_id.to_string(), run_id.to_string()))
            {
                run.last_chain_hash = chain_hash.clone();
            }
        }

        debug!(tenant_id, subject, event_type, chain_hash = %chain_hash, "event appended");
        Ok(AppendOutcome {
            event,
            last_chain_hash: chain_hash,
        })
    }

    /// All events of a subject in chain order.
    pub fn list_events(&self, tenant_id: &str, subject: &str) -> Vec<LedgerEvent> {
        self.store.list(tenant_id, subject)
    }

    /// One event by id.
    pub fn get_event(
        &self,
        tenant_id: &str,
        subject: &str,
        event_id: &str,
    ) -> Result<LedgerEvent, LedgerError> {
        self.store
            .get(tenant_id, subject, event_id)
            .ok_or_else(|| LedgerError::EventNotFound {
                event_id: event_id.to_string(),
            })
    }

    /// Tail hash of a subject; the genesis hash for an empty chain.
    pub fn last_chain_hash(&self, tenant_id: &str, subject: &str) -> String {
        self.store
            .last_chain_hash(tenant_id, subject)
            .unwrap_or_else(|| GENESIS_CHAIN_HASH.to_string())
    }

    /// Recover the tail hash from the tail event alone (restart path).
    pub fn recover_last_chain_hash(&self, tenant_id: &str, subject: &str) -> String {
        self.store
            .tail(tenant_id, subject)
            .map(|e| e.chain_hash)
            .unwrap_or_else(|| GENESIS_CHAIN_HASH.to_string())
    }

    /// Walk a subject chain and verify every hash and link.
    pub fn verify_chain(&self, tenant_id: &str, subject: &str) -> Result<(), LedgerError> {
        let mut prev = GENESIS_CHAIN_HASH.to_string();
        for event in self.store.list(tenant_id, subject) {
            verify_link(&event, &prev)?;
            prev = event.chain_hash;
        }
        Ok(())
    }
}
