//! # sk-04-wallet
//!
//! Per-(tenant, agent) balance ledger split into `available` and
//! `escrowLocked` pools.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Balances never go negative | `service.rs` pre-validation |
//! | INVARIANT-2 | Multi-wallet ops conserve value (Σ deltas = 0) | `domain/journal.rs` |
//! | INVARIANT-3 | Two-wallet ops lock in sorted key order | `service.rs` - `with_two` |
//! | INVARIANT-4 | Every movement journals against a chain hash | `service.rs` |
//!
//! All movements are integer cents; percentage math happens upstream in
//! milli-cents and arrives here already split.

#![warn(missing_docs)]

pub mod domain;
pub mod service;

pub use domain::entities::{Wallet, WalletSnapshot};
pub use domain::errors::WalletError;
pub use domain::journal::{JournalEntry, JournalLeg};
pub use service::WalletLedger;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
