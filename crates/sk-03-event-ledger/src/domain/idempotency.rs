//! # Idempotency Store
//!
//! `(tenant, idempotencyKey)` is exactly-once. The first successful
//! response is stored with the hash of the normalized request body; a
//! replay with the same body returns the stored response verbatim, a
//! replay with a different body is a deterministic conflict.
//!
//! Keys are only consumed on success: a failed operation leaves the key
//! free so the caller can retry with a corrected body.

use dashmap::DashMap;
use serde_json::Value;
use sk_types::entities::HashHex;

/// Stored outcome for a consumed idempotency key.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    /// Canonical hash of the request body the key was consumed with.
    pub request_hash: HashHex,
    /// The response returned to the first caller, replayed bit-identically.
    pub response: Value,
    /// Unix milliseconds at store time.
    pub created_at_ms: u64,
}

/// Probe outcome.
#[derive(Debug, Clone)]
pub enum IdempotencyProbe {
    /// Key unused; proceed.
    Miss,
    /// Same key, same body: replay this response.
    Replay(Value),
    /// Same key, different body.
    Conflict,
}

/// In-memory exactly-once store.
#[derive(Default)]
pub struct IdempotencyStore {
    records: DashMap<(String, String), IdempotencyRecord>,
}

impl IdempotencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe a key against the hash of the incoming request body.
    pub fn probe(&self, tenant_id: &str, key: &str, request_hash: &str) -> IdempotencyProbe {
        match self
            .records
            .get(&(tenant_id.to_string(), key.to_string()))
        {
            None => IdempotencyProbe::Miss,
            Some(record) if record.request_hash == request_hash => {
                IdempotencyProbe::Replay(record.response.clone())
            }
            Some(_) => IdempotencyProbe::Conflict,
        }
    }

    /// Store the first successful response for a key.
    ///
    /// A concurrent duplicate keeps the earlier record; the stored response
    /// never changes once written.
    pub fn store(
        &self,
        tenant_id: &str,
        key: &str,
        request_hash: HashHex,
        response: Value,
        created_at_ms: u64,
    ) {
        self.records
            .entry((tenant_id.to_string(), key.to_string()))
            .or_insert(IdempotencyRecord {
                request_hash,
                response,
                created_at_ms,
            });
    }
}
