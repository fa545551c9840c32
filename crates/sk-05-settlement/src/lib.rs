//! # sk-05-settlement
//!
//! Settlement gate state machine.
//!
//! ```text
//! created ──authorize──▶ authorized ──verify──▶ released        (green, 100%)
//!                                    ──verify──▶ partially_released
//!                                    ──verify──▶ refunded       (red, 0%)
//!                                    ──verify──▶ verifying      (manual hold)
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | No transition moves funds it did not pre-validate | `service.rs` |
//! | INVARIANT-2 | `released + refunded = amount` at every terminal | `sk_types::release_split` |
//! | INVARIANT-3 | Provider/quote bindings verify before any mutation | `domain/binding.rs` |
//! | INVARIANT-4 | Every terminal transition emits a signed receipt | `service.rs` |
//!
//! Rejections are fail-closed: no state change, no ledger mutation, and the
//! caller's idempotency key is not consumed.

#![warn(missing_docs)]

pub mod domain;
pub mod service;

pub use domain::binding::{evidence_request_hashes, evidence_response_hashes};
pub use domain::entities::{AgentPassport, CreateGateInput, SettlementGate, VerifyInput};
pub use domain::errors::SettlementError;
pub use domain::policy::{ColourRule, PolicyMode, ReleasePolicy};
pub use domain::receipt::{ReceiptIndexEntry, ReceiptStatus, RECEIPT_SCHEMA_VERSION};
pub use service::{SettlementEngine, VerifyOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
