//! # sk-06-reversal
//!
//! Reversal, dispute and arbitration protocols layered over settlement.
//!
//! ```text
//! authorized/released ──dispute.open──▶ disputed
//! disputed ──arbitration.open──▶ under_review
//! under_review ──verdict──▶ verdict_issued ──close──▶ closed
//! any terminal ──appeal.open──▶ (new case under_review)
//! ```
//!
//! ## Replay & Binding Rules
//!
//! | Rule | Enforcement Location |
//! |------|---------------------|
//! | `commandId` pins its payload hash; drift is a conflict | `service/reversal.rs` |
//! | Commands are payer-signed and expiry-checked | `service/reversal.rs` |
//! | Refund paths need `http:request_sha256` evidence | `service/reversal.rs` |
//! | Dispute close / verdicts / appeals bind the settlement request hash | `service/arbitration.rs` |
//!
//! Every effect appends to a per-gate reversal stream or per-case stream,
//! chained exactly like the run ledger.

#![warn(missing_docs)]

pub mod domain;
pub mod service;

pub use domain::arbitration::{
    AppealRef, ArbitrationCase, CaseView, VerdictCore, VERDICT_SCHEMA_VERSION,
};
pub use domain::command::{
    ReversalCommand, ReversalRequest, ReversalTarget, REVERSAL_COMMAND_SCHEMA_VERSION,
};
pub use domain::dispute::{Dispute, OpenDisputeInput};
pub use domain::errors::ReversalError;
pub use service::arbitration::ArbitrationDesk;
pub use service::reversal::ReversalProcessor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
