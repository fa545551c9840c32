//! Seal and open operations.

use crate::errors::EnvelopeError;
use crate::registry::KeyRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sk_01_canonical::{hash_canonical, normalize};
use sk_crypto::{verify_hash_hex, SigningPair};

/// Signature block embedded in every signed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeSignature {
    /// Always `"ed25519"`.
    pub algorithm: String,
    /// Display key id of the signer.
    pub key_id: String,
    /// Base64 Ed25519 signature over the 32 raw bytes of the core hash.
    pub signature_base64: String,
}

/// Hash a core and embed the hash without signing (artifacts whose schema
/// makes the signature optional).
pub fn seal_unsigned(core: &Value, hash_field: &str) -> Result<Value, EnvelopeError> {
    let map = core_map(core, hash_field)?;
    let normalized = normalize(core)?;
    let core_hash = hash_canonical(&normalized)?;
    let mut envelope = map.clone();
    envelope.insert(hash_field.to_string(), Value::String(core_hash));
    Ok(Value::Object(envelope))
}

/// Hash a core, embed the hash under `hash_field` and attach the signer's
/// signature block.
pub fn seal(core: &Value, hash_field: &str, pair: &SigningPair) -> Result<Value, EnvelopeError> {
    let map = core_map(core, hash_field)?;
    let normalized = normalize(core)?;
    let core_hash = hash_canonical(&normalized)?;
    let signature_base64 = pair
        .sign_hash_hex(&core_hash)
        .map_err(|e| EnvelopeError::Signing(e.to_string()))?;
    let signature = EnvelopeSignature {
        algorithm: "ed25519".to_string(),
        key_id: pair.key_id(),
        signature_base64,
    };
    let mut envelope = map.clone();
    envelope.insert(hash_field.to_string(), Value::String(core_hash));
    envelope.insert(
        "signature".to_string(),
        serde_json::to_value(signature).expect("signature block is plain data"),
    );
    Ok(Value::Object(envelope))
}

/// Verify an envelope and return its stripped core.
///
/// When `require_signature` is false, a missing signature block still passes
/// hash verification (hash-only artifacts); a *present* signature is always
/// verified.
pub fn open(
    envelope: &Value,
    hash_field: &str,
    registry: &dyn KeyRegistry,
    tenant_id: &str,
    require_signature: bool,
) -> Result<Value, EnvelopeError> {
    let map = envelope.as_object().ok_or(EnvelopeError::CoreNotAnObject)?;

    let embedded = map
        .get(hash_field)
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingSignature)?
        .to_string();

    let mut core = map.clone();
    core.remove(hash_field);
    let signature_value = core.remove("signature");

    let recomputed = hash_canonical(&normalize(&Value::Object(core.clone()))?)?;
    if recomputed != embedded {
        return Err(EnvelopeError::PayloadHashMismatch {
            embedded,
            recomputed,
        });
    }

    match signature_value {
        None => {
            if require_signature {
                return Err(EnvelopeError::MissingSignature);
            }
        }
        Some(sig_value) => {
            let signature: EnvelopeSignature = serde_json::from_value(sig_value)
                .map_err(|_| EnvelopeError::SignatureInvalid)?;
            verify_block(&recomputed, &signature, registry, tenant_id)?;
        }
    }

    Ok(Value::Object(core))
}

/// Verify a detached signature block over a known core hash.
pub fn verify_block(
    core_hash: &str,
    signature: &EnvelopeSignature,
    registry: &dyn KeyRegistry,
    tenant_id: &str,
) -> Result<(), EnvelopeError> {
    if signature.algorithm != "ed25519" {
        return Err(EnvelopeError::UnsupportedAlgorithm {
            algorithm: signature.algorithm.clone(),
        });
    }
    let public_key = registry
        .lookup(tenant_id, &signature.key_id)
        .ok_or_else(|| EnvelopeError::SignerKeyUnknown {
            key_id: signature.key_id.clone(),
        })?;
    if !verify_hash_hex(core_hash, &signature.signature_base64, &public_key) {
        return Err(EnvelopeError::SignatureInvalid);
    }
    Ok(())
}

fn core_map<'a>(core: &'a Value, hash_field: &str) -> Result<&'a Map<String, Value>, EnvelopeError> {
    let map = core.as_object().ok_or(EnvelopeError::CoreNotAnObject)?;
    for reserved in [hash_field, "signature"] {
        if map.contains_key(reserved) {
            return Err(EnvelopeError::ReservedField {
                field: reserved.to_string(),
            });
        }
    }
    Ok(map)
}
