//! # sk-02-envelope
//!
//! Signed envelopes: given a *core* object, produce
//! `{…core, <hashField>: coreHash, signature}` and verify the construction
//! offline. The hash-field name is schema-specific (`receiptHash`,
//! `verdictHash`, `reportHash`, `certHash`, `packHash`, `transcriptHash`).
//!
//! ## Verification order
//!
//! 1. strip `<hashField>` and `signature`, recompute the canonical hash —
//!    mismatch is `SIGNATURE_PAYLOAD_HASH_MISMATCH`
//! 2. resolve the signer key — unknown id is `SIGNER_KEY_UNKNOWN`
//! 3. verify the Ed25519 signature over the hash — failure is
//!    `SIGNATURE_INVALID`
//!
//! A failure at any step rejects the envelope; there is no partial accept.

#![warn(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod registry;

pub use envelope::{open, seal, seal_unsigned, verify_block, EnvelopeSignature};
pub use errors::EnvelopeError;
pub use registry::{AgentKeyDirectory, InMemoryKeyRegistry, KeyRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
