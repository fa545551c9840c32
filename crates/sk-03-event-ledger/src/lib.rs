//! # sk-03-event-ledger
//!
//! Per-(tenant, subject) chained append-only event log.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Chain linkage: `prevChainHash(e_i) = chainHash(e_{i-1})` | `domain/chain.rs` |
//! | INVARIANT-2 | CAS is the only linearizer for appends | `adapters/memory.rs` |
//! | INVARIANT-3 | No event is ever rewritten | append-only store API |
//! | INVARIANT-4 | `(tenant, idempotencyKey)` is exactly-once | `domain/idempotency.rs` |
//!
//! The first event of every subject links to the all-zeros genesis hash.
//! `lastChainHash` is recoverable from the tail event alone; no scan.

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::memory::InMemoryEventStore;
pub use domain::chain::compute_chain_hash;
pub use domain::entities::{subject, AppendOutcome, LedgerEvent, Run};
pub use domain::errors::LedgerError;
pub use domain::idempotency::{IdempotencyProbe, IdempotencyRecord, IdempotencyStore};
pub use ports::EventStore;
pub use service::EventLedger;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
