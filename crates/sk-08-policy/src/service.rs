//! # Policy Gatekeeper Service
//!
//! Holds the per-agent wallet policies, the process-wide plan catalog
//! (single-writer refresh, copy-on-read snapshots) and the per-period
//! billing counters.

use crate::domain::billing::{
    apply_billable, overage_charge, BillableCounter, BillingPlan, BillingUsage, OverageCharge,
};
use crate::domain::errors::PolicyError;
use crate::domain::wallet_policy::WalletPolicy;
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use sk_types::Cents;
use std::collections::HashMap;
use tracing::debug;

/// Policy and billing enforcement point.
pub struct PolicyGatekeeper {
    policies: DashMap<(String, String), WalletPolicy>,
    plan_catalog: RwLock<HashMap<String, BillingPlan>>,
    tenant_plans: DashMap<String, String>,
    usage: DashMap<(String, String), BillingUsage>,
    daily_authorizations: DashMap<(String, String, String), Cents>,
}

impl Default for PolicyGatekeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyGatekeeper {
    /// Create a gatekeeper with an unmetered default plan.
    pub fn new() -> Self {
        let mut catalog = HashMap::new();
        let unmetered = BillingPlan::unmetered();
        catalog.insert(unmetered.plan_id.clone(), unmetered);
        Self {
            policies: DashMap::new(),
            plan_catalog: RwLock::new(catalog),
            tenant_plans: DashMap::new(),
            usage: DashMap::new(),
            daily_authorizations: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Wallet policies
    // ------------------------------------------------------------------

    /// Install a policy for an agent's wallet.
    pub fn set_policy(&self, tenant_id: &str, agent_id: &str, policy: WalletPolicy) {
        self.policies
            .insert((tenant_id.to_string(), agent_id.to_string()), policy);
    }

    /// The effective policy for an agent (default when none installed).
    pub fn policy_for(&self, tenant_id: &str, agent_id: &str) -> WalletPolicy {
        self.policies
            .get(&(tenant_id.to_string(), agent_id.to_string()))
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Check an authorization against the agent's policy, including the
    /// prospective per-day total. Does not commit the daily counter.
    #[allow(clippy::too_many_arguments)]
    pub fn check_authorization(
        &self,
        tenant_id: &str,
        agent_id: &str,
        amount_cents: Cents,
        currency: &str,
        tool_id: &str,
        provider_id: Option<&str>,
        delegation_depth: Option<u32>,
        ts_ms: u64,
    ) -> Result<(), PolicyError> {
        let policy = self.policy_for(tenant_id, agent_id);
        let day = day_key(ts_ms);
        let current = self
            .daily_authorizations
            .get(&(tenant_id.to_string(), agent_id.to_string(), day))
            .map(|v| *v)
            .unwrap_or(0);
        policy.check_authorization(
            amount_cents,
            currency,
            tool_id,
            provider_id,
            delegation_depth,
            current + amount_cents,
        )
    }

    /// Commit a successful authorization into the daily counter.
    pub fn commit_authorization(
        &self,
        tenant_id: &str,
        agent_id: &str,
        amount_cents: Cents,
        ts_ms: u64,
    ) {
        let day = day_key(ts_ms);
        *self
            .daily_authorizations
            .entry((tenant_id.to_string(), agent_id.to_string(), day))
            .or_insert(0) += amount_cents;
    }

    // ------------------------------------------------------------------
    // Billing
    // ------------------------------------------------------------------

    /// Replace the plan catalog (single-writer refresh).
    pub fn set_plan_catalog(&self, plans: Vec<BillingPlan>) {
        let mut catalog = HashMap::new();
        for plan in plans {
            catalog.insert(plan.plan_id.clone(), plan);
        }
        let unmetered = BillingPlan::unmetered();
        catalog.entry(unmetered.plan_id.clone()).or_insert(unmetered);
        *self.plan_catalog.write() = catalog;
        debug!("billing plan catalog refreshed");
    }

    /// Assign a plan to a tenant.
    pub fn assign_plan(&self, tenant_id: &str, plan_id: &str) {
        self.tenant_plans
            .insert(tenant_id.to_string(), plan_id.to_string());
    }

    /// The tenant's plan (copy-on-read snapshot of the catalog).
    pub fn plan_for(&self, tenant_id: &str) -> BillingPlan {
        let plan_id = self
            .tenant_plans
            .get(tenant_id)
            .map(|p| p.clone())
            .unwrap_or_else(|| "unmetered".to_string());
        self.plan_catalog
            .read()
            .get(&plan_id)
            .cloned()
            .unwrap_or_else(BillingPlan::unmetered)
    }

    /// Non-mutating probe: would this billable event breach a hard limit?
    /// Used before a transition so a breach rejects with no side effects.
    pub fn check_billable(
        &self,
        tenant_id: &str,
        ts_ms: u64,
        counter: BillableCounter,
    ) -> Result<(), PolicyError> {
        let plan = self.plan_for(tenant_id);
        let mut usage = self.usage_for(tenant_id, ts_ms);
        apply_billable(&plan, &mut usage, counter)
    }

    /// Record a billable event for the tenant's current period; hard
    /// limits reject before any counter moves.
    pub fn record_billable(
        &self,
        tenant_id: &str,
        ts_ms: u64,
        counter: BillableCounter,
    ) -> Result<(), PolicyError> {
        let plan = self.plan_for(tenant_id);
        let period = period_key(ts_ms);
        let mut usage = self
            .usage
            .entry((tenant_id.to_string(), period))
            .or_default();
        apply_billable(&plan, &mut usage, counter)
    }

    /// Usage counters for a (tenant, period).
    pub fn usage_for(&self, tenant_id: &str, ts_ms: u64) -> BillingUsage {
        self.usage
            .get(&(tenant_id.to_string(), period_key(ts_ms)))
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Overage owed for a (tenant, period).
    pub fn overage_for(&self, tenant_id: &str, ts_ms: u64) -> OverageCharge {
        overage_charge(&self.plan_for(tenant_id), &self.usage_for(tenant_id, ts_ms))
    }
}

fn period_key(ts_ms: u64) -> String {
    match Utc.timestamp_millis_opt(ts_ms as i64) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m").to_string(),
        _ => "invalid".to_string(),
    }
}

fn day_key(ts_ms: u64) -> String {
    match Utc.timestamp_millis_opt(ts_ms as i64) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d").to_string(),
        _ => "invalid".to_string(),
    }
}
