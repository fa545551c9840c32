//! # SHA-256 Hashing
//!
//! One-shot helpers producing the 64-char lowercase hex form used for chain
//! links, canonical hashes and binding evidence.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 of `data`, as 64 lowercase hex chars.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Decode a 64-char hex digest into its 32 raw bytes.
pub fn decode_hash_hex(hash_hex: &str) -> Result<[u8; 32], crate::CryptoError> {
    if hash_hex.len() != 64 {
        return Err(crate::CryptoError::InvalidHashHex {
            actual: hash_hex.len(),
        });
    }
    let bytes = hex::decode(hash_hex).map_err(|_| crate::CryptoError::InvalidHashHex {
        actual: hash_hex.len(),
    })?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Constant-time equality for secrets and MACs.
///
/// Unequal lengths compare unequal without leaking where they differ.
pub fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
