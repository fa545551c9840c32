//! # API Error Envelope
//!
//! Every subsystem failure surfaces as `{code, message, details?}` plus an
//! HTTP-ish status. Subsystem crates define their own `thiserror` enums and
//! convert into this envelope at the gateway boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire-stable error envelope.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Stable machine-readable code (e.g. `CHAIN_HASH_CAS_MISMATCH`).
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// HTTP-ish status the transport should map this to.
    #[serde(skip_serializing_if = "is_default_status", default = "default_status")]
    pub status: u16,
    /// Optional structured context (offending path, expected/actual hashes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

fn default_status() -> u16 {
    500
}

fn is_default_status(s: &u16) -> bool {
    *s == 500
}

impl ApiError {
    /// Build an error with a status, code and message.
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
            details: None,
        }
    }

    /// Attach structured context.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 400 schema failure naming the offending path.
    pub fn schema_invalid(path: &str, message: impl Into<String>) -> Self {
        Self::new(400, "SCHEMA_INVALID", message.into())
            .with_details(serde_json::json!({ "path": path }))
    }

    /// 500 internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "INTERNAL_ERROR", message)
    }
}
