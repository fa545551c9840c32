//! # sk-crypto — Settlement Kernel Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Canonical hashes, chain links |
//! | `signatures` | Ed25519 | Receipts, verdicts, reversal commands |
//! | `webhook` | HMAC-SHA256 | Inbound webhook authentication |
//!
//! ## Security Properties
//!
//! - **Ed25519**: deterministic nonces, no RNG dependency after keygen
//! - **HMAC comparisons**: constant-time via `subtle`
//! - **Key ids**: RFC 7638 JWK thumbprints of the raw public key

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;
pub mod webhook;

pub use errors::CryptoError;
pub use hashing::{sha256_hex, timing_safe_eq};
pub use signatures::{sign_hash_hex, verify_hash_hex, PublicKey, SigningPair};
pub use webhook::{verify_webhook, webhook_signature, DEFAULT_TOLERANCE_SECONDS};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
