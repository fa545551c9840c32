//! # Opaque List Cursors
//!
//! Receipts listing paginates with a stable `(issuedAt, receiptId)` order.
//! The cursor is the base64url encoding of a small JSON record; callers
//! treat it as opaque.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position in a `(issued_at_ms, id)`-ordered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    /// Issue timestamp (unix milliseconds) of the last returned record.
    pub issued_at_ms: u64,
    /// Identifier of the last returned record (tie-breaker).
    pub id: String,
}

/// Cursor decode failure; surfaces as `SCHEMA_INVALID`.
#[derive(Debug, Error)]
#[error("invalid cursor")]
pub struct CursorError;

impl PageCursor {
    /// Encode to the opaque wire form.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("cursor is plain data");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode the opaque wire form.
    pub fn decode(s: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| CursorError)?;
        serde_json::from_slice(&bytes).map_err(|_| CursorError)
    }
}
