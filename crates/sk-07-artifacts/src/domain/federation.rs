//! Federation trust registry and coordinator envelopes.
//!
//! Invoke/result envelopes are sealed under `envelopeHash` by a federation
//! coordinator. Strict verification requires a known, non-revoked anchor
//! whose version matches the envelope and which had not rotated before the
//! envelope's `signedAt`.

use crate::domain::errors::ArtifactError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sk_crypto::{verify_hash_hex, PublicKey};
use std::collections::HashMap;

/// Which coordinator envelope is being verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationEnvelopeKind {
    /// An invocation being forwarded into this kernel.
    Invoke,
    /// A result being returned from this kernel.
    Result,
}

/// A coordinator signing key accepted at a given version.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    /// Display key id of the anchor.
    pub key_id: String,
    /// The anchor's public key.
    pub public_key: PublicKey,
    /// Registry version this anchor belongs to.
    pub anchor_version: u64,
    /// Revoked anchors verify nothing.
    pub revoked: bool,
    /// When the anchor was rotated out, unix milliseconds.
    pub rotated_at_ms: Option<u64>,
}

/// Process-wide anchor snapshot. One writer refreshes; readers copy.
#[derive(Default)]
pub struct TrustRegistry {
    anchors: RwLock<HashMap<String, TrustAnchor>>,
}

impl TrustRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole anchor set (signalled refresh).
    pub fn refresh(&self, anchors: Vec<TrustAnchor>) {
        let mut map = HashMap::new();
        for anchor in anchors {
            map.insert(anchor.key_id.clone(), anchor);
        }
        *self.anchors.write() = map;
    }

    /// Copy-on-read snapshot of one anchor.
    pub fn anchor(&self, key_id: &str) -> Option<TrustAnchor> {
        self.anchors.read().get(key_id).cloned()
    }

    /// Verify a coordinator envelope in strict mode; returns the stripped
    /// core on success.
    pub fn verify_envelope(
        &self,
        envelope: &Value,
        _kind: FederationEnvelopeKind,
    ) -> Result<Value, ArtifactError> {
        let map = envelope
            .as_object()
            .ok_or_else(|| ArtifactError::FederationEnvelopeInvalid {
                reason: "envelope is not an object".to_string(),
            })?;

        let signature = map.get("signature").and_then(Value::as_object).ok_or_else(|| {
            ArtifactError::FederationEnvelopeInvalid {
                reason: "missing signature block".to_string(),
            }
        })?;
        let key_id = signature
            .get("keyId")
            .and_then(Value::as_str)
            .ok_or_else(|| ArtifactError::FederationEnvelopeInvalid {
                reason: "signature missing keyId".to_string(),
            })?;
        let signature_base64 = signature
            .get("signatureBase64")
            .and_then(Value::as_str)
            .ok_or_else(|| ArtifactError::FederationEnvelopeInvalid {
                reason: "signature missing signatureBase64".to_string(),
            })?;
        let anchor_version = map
            .get("trust")
            .and_then(|t| t.get("anchorVersion"))
            .and_then(Value::as_u64)
            .ok_or_else(|| ArtifactError::FederationEnvelopeInvalid {
                reason: "missing trust.anchorVersion".to_string(),
            })?;
        let signed_at = map.get("signedAt").and_then(Value::as_u64);

        let anchor = self
            .anchor(key_id)
            .ok_or_else(|| ArtifactError::UntrustedCoordinator {
                key_id: key_id.to_string(),
            })?;
        if anchor.revoked {
            return Err(ArtifactError::TrustAnchorRevoked {
                key_id: key_id.to_string(),
            });
        }
        if let (Some(rotated_at), Some(signed_at)) = (anchor.rotated_at_ms, signed_at) {
            if signed_at >= rotated_at {
                return Err(ArtifactError::TrustAnchorRotated);
            }
        }
        if anchor.anchor_version != anchor_version {
            return Err(ArtifactError::AnchorVersionMismatch {
                envelope: anchor_version,
                registry: anchor.anchor_version,
            });
        }

        // Hash check, then the anchor signature over the hash.
        let embedded = map
            .get("envelopeHash")
            .and_then(Value::as_str)
            .ok_or_else(|| ArtifactError::FederationEnvelopeInvalid {
                reason: "missing envelopeHash".to_string(),
            })?;
        let mut core = map.clone();
        core.remove("envelopeHash");
        core.remove("signature");
        let recomputed = sk_01_canonical::hash_canonical(&Value::Object(core.clone()))?;
        if recomputed != embedded {
            return Err(ArtifactError::Envelope(
                sk_02_envelope::EnvelopeError::PayloadHashMismatch {
                    embedded: embedded.to_string(),
                    recomputed,
                },
            ));
        }
        if !verify_hash_hex(embedded, signature_base64, &anchor.public_key) {
            return Err(ArtifactError::Envelope(
                sk_02_envelope::EnvelopeError::SignatureInvalid,
            ));
        }
        Ok(Value::Object(core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sk_02_envelope::seal;
    use sk_crypto::SigningPair;

    fn coordinator_envelope(key: &SigningPair, anchor_version: u64, signed_at: u64) -> Value {
        let core = json!({
            "schemaVersion": "FederationInvoke.v1",
            "tenantId": "t1",
            "operation": "run.append_event",
            "trust": { "anchorVersion": anchor_version },
            "signedAt": signed_at,
        });
        seal(&core, "envelopeHash", key).unwrap()
    }

    fn registry_with(key: &SigningPair, revoked: bool, rotated_at_ms: Option<u64>) -> TrustRegistry {
        let registry = TrustRegistry::new();
        registry.refresh(vec![TrustAnchor {
            key_id: key.key_id(),
            public_key: key.public_key(),
            anchor_version: 3,
            revoked,
            rotated_at_ms,
        }]);
        registry
    }

    #[test]
    fn trusted_envelope_verifies() {
        let key = SigningPair::generate();
        let registry = registry_with(&key, false, None);
        let envelope = coordinator_envelope(&key, 3, 1000);
        let core = registry
            .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
            .unwrap();
        assert_eq!(core["operation"], "run.append_event");
    }

    #[test]
    fn unknown_coordinator_rejected() {
        let key = SigningPair::generate();
        let registry = TrustRegistry::new();
        let envelope = coordinator_envelope(&key, 3, 1000);
        let err = registry
            .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
            .unwrap_err();
        assert_eq!(err.code(), "FEDERATION_UNTRUSTED_COORDINATOR");
    }

    #[test]
    fn revoked_and_rotated_anchors_rejected() {
        let key = SigningPair::generate();

        let revoked = registry_with(&key, true, None);
        let envelope = coordinator_envelope(&key, 3, 1000);
        assert_eq!(
            revoked
                .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
                .unwrap_err()
                .code(),
            "FEDERATION_TRUST_ANCHOR_REVOKED"
        );

        // Signed after rotation.
        let rotated = registry_with(&key, false, Some(500));
        assert_eq!(
            rotated
                .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
                .unwrap_err()
                .code(),
            "FEDERATION_TRUST_ANCHOR_ROTATED"
        );

        // Signed before rotation is still fine.
        let envelope = coordinator_envelope(&key, 3, 400);
        rotated
            .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
            .unwrap();
    }

    #[test]
    fn anchor_version_must_match() {
        let key = SigningPair::generate();
        let registry = registry_with(&key, false, None);
        let envelope = coordinator_envelope(&key, 2, 1000);
        assert_eq!(
            registry
                .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
                .unwrap_err()
                .code(),
            "FEDERATION_ANCHOR_VERSION_MISMATCH"
        );
    }

    #[test]
    fn tampered_envelope_rejected() {
        let key = SigningPair::generate();
        let registry = registry_with(&key, false, None);
        let mut envelope = coordinator_envelope(&key, 3, 1000);
        envelope["operation"] = json!("wallet.credit");
        assert_eq!(
            registry
                .verify_envelope(&envelope, FederationEnvelopeKind::Invoke)
                .unwrap_err()
                .code(),
            "SIGNATURE_PAYLOAD_HASH_MISMATCH"
        );
    }
}
