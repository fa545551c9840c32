//! # Ed25519 Signatures
//!
//! Artifacts never sign raw payload bytes: the payload is canonicalized and
//! hashed first, and the signature covers the 32 raw bytes of that hash.
//! Keys travel as base64 of the raw 32-byte point; key ids are RFC 7638 JWK
//! thumbprints (display form: first 16 hex chars).

use crate::hashing::{decode_hash_hex, sha256_hex};
use crate::CryptoError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create from raw bytes, validating the curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Decode the base64 wire form.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidEncoding("expected 32 bytes".into()))?;
        Self::from_bytes(arr)
    }

    /// Base64 wire form of the raw point.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full JWK thumbprint: SHA-256 hex of the canonical JWK
    /// `{"crv":"Ed25519","kty":"OKP","x":<base64url>}`.
    pub fn jwk_thumbprint(&self) -> String {
        // Keys are emitted in lexicographic order, which for this fixed JWK
        // is also the literal order below.
        let jwk = format!(
            "{{\"crv\":\"Ed25519\",\"kty\":\"OKP\",\"x\":\"{}\"}}",
            URL_SAFE_NO_PAD.encode(self.0)
        );
        sha256_hex(jwk)
    }

    /// Display key id: first 16 hex chars of the thumbprint.
    pub fn key_id(&self) -> String {
        self.jwk_thumbprint()[..16].to_string()
    }
}

/// Ed25519 signing pair.
pub struct SigningPair {
    signing_key: SigningKey,
}

impl SigningPair {
    /// Generate a random pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Restore from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Public half of the pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Display key id of the public half.
    pub fn key_id(&self) -> String {
        self.public_key().key_id()
    }

    /// Sign the 32 raw bytes of a hex digest; returns base64.
    pub fn sign_hash_hex(&self, hash_hex: &str) -> Result<String, CryptoError> {
        let raw = decode_hash_hex(hash_hex)?;
        let sig = self.signing_key.sign(&raw);
        Ok(STANDARD.encode(sig.to_bytes()))
    }

    /// Seed bytes (for persistence in tests and fixtures).
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Drop for SigningPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Sign a hex digest with a pair; free-function form mirroring
/// [`verify_hash_hex`].
pub fn sign_hash_hex(hash_hex: &str, pair: &SigningPair) -> Result<String, CryptoError> {
    pair.sign_hash_hex(hash_hex)
}

/// Verify a base64 signature over the 32 raw bytes of a hex digest.
pub fn verify_hash_hex(hash_hex: &str, signature_base64: &str, public_key: &PublicKey) -> bool {
    let Ok(raw) = decode_hash_hex(hash_hex) else {
        return false;
    };
    let Ok(sig_bytes) = STANDARD.decode(signature_base64) else {
        return false;
    };
    let Ok(sig_arr) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sig_arr);
    verifying_key.verify(&raw, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let pair = SigningPair::generate();
        let hash = sha256_hex("artifact core");

        let sig = pair.sign_hash_hex(&hash).unwrap();
        assert!(verify_hash_hex(&hash, &sig, &pair.public_key()));
    }

    #[test]
    fn wrong_hash_fails() {
        let pair = SigningPair::generate();
        let sig = pair.sign_hash_hex(&sha256_hex("a")).unwrap();
        assert!(!verify_hash_hex(&sha256_hex("b"), &sig, &pair.public_key()));
    }

    #[test]
    fn wrong_key_fails() {
        let pair1 = SigningPair::generate();
        let pair2 = SigningPair::generate();
        let hash = sha256_hex("a");
        let sig = pair1.sign_hash_hex(&hash).unwrap();
        assert!(!verify_hash_hex(&hash, &sig, &pair2.public_key()));
    }

    #[test]
    fn malformed_inputs_fail_closed() {
        let pair = SigningPair::generate();
        let hash = sha256_hex("a");
        assert!(!verify_hash_hex("zz", "sig", &pair.public_key()));
        assert!(!verify_hash_hex(&hash, "@@not-base64@@", &pair.public_key()));
    }

    #[test]
    fn key_id_is_stable_prefix_of_thumbprint() {
        let pair = SigningPair::from_seed([7u8; 32]);
        let pk = pair.public_key();
        let thumb = pk.jwk_thumbprint();
        assert_eq!(thumb.len(), 64);
        assert_eq!(pk.key_id(), thumb[..16]);
        // Same seed, same id.
        assert_eq!(SigningPair::from_seed([7u8; 32]).key_id(), pk.key_id());
    }

    #[test]
    fn public_key_base64_round_trip() {
        let pair = SigningPair::generate();
        let pk = pair.public_key();
        let restored = PublicKey::from_base64(&pk.to_base64()).unwrap();
        assert_eq!(restored, pk);
    }

    #[test]
    fn seed_round_trip() {
        let original = SigningPair::generate();
        let restored = SigningPair::from_seed(original.to_seed());
        assert_eq!(original.public_key(), restored.public_key());
    }
}
