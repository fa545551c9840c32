//! Agent directory: registration and lookup.

use dashmap::DashMap;
use sk_02_envelope::InMemoryKeyRegistry;
use sk_crypto::PublicKey;
use sk_types::entities::Agent;
use std::sync::Arc;

/// Registered agents per tenant. Agents are never deleted.
pub struct AgentDirectory {
    agents: DashMap<(String, String), Agent>,
    registry: Arc<InMemoryKeyRegistry>,
}

impl AgentDirectory {
    /// Create a directory sharing the kernel's key registry.
    pub fn new(registry: Arc<InMemoryKeyRegistry>) -> Self {
        Self {
            agents: DashMap::new(),
            registry,
        }
    }

    /// Register an agent with an optional initial signing key; returns the
    /// agent record (including the new key id, when a key was given).
    pub fn register(
        &self,
        tenant_id: &str,
        agent_id: &str,
        display_name: &str,
        owner: &str,
        capabilities: Vec<String>,
        public_key: Option<PublicKey>,
    ) -> Agent {
        let mut key_ids = Vec::new();
        if let Some(pk) = public_key {
            key_ids.push(self.registry.register_for_agent(tenant_id, agent_id, pk));
        }
        let mut agent = Agent {
            agent_id: agent_id.to_string(),
            tenant_id: tenant_id.to_string(),
            display_name: display_name.to_string(),
            owner: owner.to_string(),
            capabilities,
            key_ids,
        };
        // Re-registration adds keys, never removes agents.
        if let Some(existing) = self.agents.get(&(tenant_id.to_string(), agent_id.to_string())) {
            let mut merged = existing.key_ids.clone();
            for key_id in &agent.key_ids {
                if !merged.contains(key_id) {
                    merged.push(key_id.clone());
                }
            }
            agent.key_ids = merged;
        }
        self.agents.insert(
            (tenant_id.to_string(), agent_id.to_string()),
            agent.clone(),
        );
        agent
    }

    /// Fetch an agent.
    pub fn get(&self, tenant_id: &str, agent_id: &str) -> Option<Agent> {
        self.agents
            .get(&(tenant_id.to_string(), agent_id.to_string()))
            .map(|a| a.clone())
    }
}
