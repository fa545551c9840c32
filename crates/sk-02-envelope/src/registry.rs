//! # Key Registry
//!
//! Maps `(tenant, keyId) -> PublicKey` and tracks which agent each key
//! belongs to. Agents may register several keys; registration never
//! overwrites a different key under the same id.

use parking_lot::RwLock;
use sk_crypto::PublicKey;
use std::collections::HashMap;

/// Lookup port used by envelope verification.
pub trait KeyRegistry: Send + Sync {
    /// Resolve a display key id within a tenant.
    fn lookup(&self, tenant_id: &str, key_id: &str) -> Option<PublicKey>;
}

/// Agent-to-key association port, used wherever a signature must come from
/// a *specific* agent (provider responses, reversal commands, verdicts).
pub trait AgentKeyDirectory: Send + Sync {
    /// Key ids registered for an agent.
    fn key_ids(&self, tenant_id: &str, agent_id: &str) -> Vec<String>;

    /// Whether `key_id` belongs to `agent_id`.
    fn key_belongs_to(&self, tenant_id: &str, agent_id: &str, key_id: &str) -> bool {
        self.key_ids(tenant_id, agent_id).iter().any(|k| k == key_id)
    }
}

/// In-memory registry adapter.
#[derive(Default)]
pub struct InMemoryKeyRegistry {
    keys: RwLock<HashMap<(String, String), PublicKey>>,
    agent_keys: RwLock<HashMap<(String, String), Vec<String>>>,
}

impl InMemoryKeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public key; returns its display key id.
    pub fn register(&self, tenant_id: &str, public_key: PublicKey) -> String {
        let key_id = public_key.key_id();
        self.keys
            .write()
            .insert((tenant_id.to_string(), key_id.clone()), public_key);
        key_id
    }

    /// Register a public key and bind it to an agent.
    pub fn register_for_agent(
        &self,
        tenant_id: &str,
        agent_id: &str,
        public_key: PublicKey,
    ) -> String {
        let key_id = self.register(tenant_id, public_key);
        let mut agent_keys = self.agent_keys.write();
        let entry = agent_keys
            .entry((tenant_id.to_string(), agent_id.to_string()))
            .or_default();
        if !entry.contains(&key_id) {
            entry.push(key_id.clone());
        }
        key_id
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn lookup(&self, tenant_id: &str, key_id: &str) -> Option<PublicKey> {
        self.keys
            .read()
            .get(&(tenant_id.to_string(), key_id.to_string()))
            .copied()
    }
}

impl AgentKeyDirectory for InMemoryKeyRegistry {
    fn key_ids(&self, tenant_id: &str, agent_id: &str) -> Vec<String> {
        self.agent_keys
            .read()
            .get(&(tenant_id.to_string(), agent_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
