//! Kernel configuration.

use serde::{Deserialize, Serialize};

/// Orchestrator configuration, sourced from `SK_`-prefixed environment
/// variables with compiled-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelConfig {
    /// Concurrent in-flight operations per tenant.
    pub max_concurrent_per_tenant: usize,
    /// Conformance adapter deadline, milliseconds.
    pub adapter_timeout_ms: u64,
    /// Webhook timestamp tolerance, seconds.
    pub webhook_tolerance_seconds: u64,
    /// Enforce billing hard limits.
    pub billing_enforced: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_tenant: 8,
            adapter_timeout_ms: 60_000,
            webhook_tolerance_seconds: sk_crypto::DEFAULT_TOLERANCE_SECONDS,
            billing_enforced: true,
        }
    }
}

impl KernelConfig {
    /// Read `SK_MAX_CONCURRENT_PER_TENANT`, `SK_ADAPTER_TIMEOUT_MS`,
    /// `SK_WEBHOOK_TOLERANCE_SECONDS`, `SK_BILLING_ENFORCED`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_per_tenant: env_parse(
                "SK_MAX_CONCURRENT_PER_TENANT",
                defaults.max_concurrent_per_tenant,
            ),
            adapter_timeout_ms: env_parse("SK_ADAPTER_TIMEOUT_MS", defaults.adapter_timeout_ms),
            webhook_tolerance_seconds: env_parse(
                "SK_WEBHOOK_TOLERANCE_SECONDS",
                defaults.webhook_tolerance_seconds,
            ),
            billing_enforced: env_parse("SK_BILLING_ENFORCED", defaults.billing_enforced),
        }
    }

    /// Reject configurations the kernel cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_per_tenant == 0 {
            return Err("maxConcurrentPerTenant must be positive".to_string());
        }
        if self.adapter_timeout_ms == 0 {
            return Err("adapterTimeoutMs must be positive".to_string());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        KernelConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = KernelConfig {
            max_concurrent_per_tenant: 0,
            ..KernelConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
