//! # sk-01-canonical
//!
//! Canonical JSON subsystem: the single deterministic byte encoding every
//! hash, signature and idempotency comparison in the kernel is built on.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Same logical value, same bytes | `encoder.rs` - UTF-16 key sort |
//! | INVARIANT-2 | Encode/parse fixpoint | `encoder.rs` - integral floats in integer form |
//! | INVARIANT-3 | Fail closed on unencodable numbers | `encoder.rs` / `normalize.rs` |
//! | INVARIANT-4 | Unknown keys never pass silently | `normalize.rs` - key-set guards |
//!
//! Errors carry the JSON-pointer path of the offending value so schema
//! failures surface with their location.

#![warn(missing_docs)]

pub mod encoder;
pub mod errors;
pub mod normalize;

pub use encoder::{canonical_string, encode, hash_canonical};
pub use errors::CanonicalError;
pub use normalize::{as_object, check_allowed_keys, normalize, require_keys, MAX_DEPTH};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
