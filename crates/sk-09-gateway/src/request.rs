//! Operation requests as they arrive from the transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol headers lifted from the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeaders {
    /// `x-proxy-tenant-id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// `x-proxy-ops-token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ops_token: Option<String>,
    /// `x-idempotency-key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// `x-proxy-expected-prev-chain-hash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_prev_chain_hash: Option<String>,
    /// `x-nooterra-protocol`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// One external operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Operation name (`gate.verify`, `receipts.list`, …).
    pub op: String,
    /// Lifted headers.
    #[serde(default)]
    pub headers: RequestHeaders,
    /// Operation body.
    #[serde(default)]
    pub body: Value,
}

impl OperationRequest {
    /// Build a request with a tenant header only (test and internal use).
    pub fn new(op: impl Into<String>, tenant_id: impl Into<String>, body: Value) -> Self {
        Self {
            op: op.into(),
            headers: RequestHeaders {
                tenant_id: Some(tenant_id.into()),
                ..RequestHeaders::default()
            },
            body,
        }
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.headers.idempotency_key = Some(key.into());
        self
    }

    /// Attach an ops token.
    #[must_use]
    pub fn with_ops_token(mut self, token: impl Into<String>) -> Self {
        self.headers.ops_token = Some(token.into());
        self
    }

    /// Attach a CAS guard for ledger appends.
    #[must_use]
    pub fn with_expected_prev(mut self, hash: impl Into<String>) -> Self {
        self.headers.expected_prev_chain_hash = Some(hash.into());
        self
    }
}
