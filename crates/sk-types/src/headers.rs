//! # Wire Headers & Ops Scopes
//!
//! Header names are fixed by the protocol; the transport layer (out of
//! scope here) copies them verbatim into the operation context.

use serde::{Deserialize, Serialize};

/// Tenant selector header.
pub const HEADER_TENANT_ID: &str = "x-proxy-tenant-id";
/// Operator token header.
pub const HEADER_OPS_TOKEN: &str = "x-proxy-ops-token";
/// Exactly-once request token header.
pub const HEADER_IDEMPOTENCY_KEY: &str = "x-idempotency-key";
/// Optimistic-concurrency guard for ledger appends.
pub const HEADER_EXPECTED_PREV_CHAIN_HASH: &str = "x-proxy-expected-prev-chain-hash";
/// Protocol version marker.
pub const HEADER_PROTOCOL: &str = "x-nooterra-protocol";

/// Scopes carried by an ops token. Missing or wrong scope is a 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpsScope {
    /// Read finance records (receipts, finance packs).
    FinanceRead,
    /// Mutate finance state (credits, settlement transitions).
    FinanceWrite,
    /// Read operational state (runs, cases, workspace views).
    OpsRead,
    /// Read audit artifacts (event chains, replay packs).
    AuditRead,
}

impl OpsScope {
    /// Wire form of the scope.
    pub fn as_str(self) -> &'static str {
        match self {
            OpsScope::FinanceRead => "finance_read",
            OpsScope::FinanceWrite => "finance_write",
            OpsScope::OpsRead => "ops_read",
            OpsScope::AuditRead => "audit_read",
        }
    }

    /// Parse the wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "finance_read" => Some(OpsScope::FinanceRead),
            "finance_write" => Some(OpsScope::FinanceWrite),
            "ops_read" => Some(OpsScope::OpsRead),
            "audit_read" => Some(OpsScope::AuditRead),
            _ => None,
        }
    }
}
