//! Binding-evidence parsing and provider/quote verification.
//!
//! Binding evidence anchors a transition to a specific HTTP round-trip:
//! `http:request_sha256:<hex>` and `http:response_sha256:<hex>` entries.

use crate::domain::entities::ProviderSignature;
use crate::domain::errors::SettlementError;
use serde_json::Value;
use sk_01_canonical::{hash_canonical, normalize};
use sk_02_envelope::{AgentKeyDirectory, KeyRegistry};
use sk_crypto::verify_hash_hex;

const REQUEST_PREFIX: &str = "http:request_sha256:";
const RESPONSE_PREFIX: &str = "http:response_sha256:";

/// Request hashes named by the evidence list.
pub fn evidence_request_hashes(evidence_refs: &[String]) -> Vec<&str> {
    evidence_refs
        .iter()
        .filter_map(|r| r.strip_prefix(REQUEST_PREFIX))
        .collect()
}

/// Response hashes named by the evidence list.
pub fn evidence_response_hashes(evidence_refs: &[String]) -> Vec<&str> {
    evidence_refs
        .iter()
        .filter_map(|r| r.strip_prefix(RESPONSE_PREFIX))
        .collect()
}

/// Outcome of a verified provider-signature binding.
#[derive(Debug, Clone)]
pub struct ProviderSigBinding {
    /// Signer key id.
    pub key_id: String,
    /// Full JWK thumbprint of the signer key.
    pub jwk_thumbprint: String,
    /// Canonical hash of the provider response.
    pub response_sha256: String,
}

/// Re-hash the provider response, check it against the evidence list and
/// verify the payee's signature over it.
pub fn verify_provider_signature(
    tenant_id: &str,
    payee_agent_id: &str,
    response: &Value,
    signature: &ProviderSignature,
    evidence_refs: &[String],
    registry: &dyn KeyRegistry,
    directory: &dyn AgentKeyDirectory,
) -> Result<ProviderSigBinding, SettlementError> {
    let response_sha256 = hash_canonical(&normalize(response)?)?;

    if !evidence_response_hashes(evidence_refs)
        .iter()
        .any(|h| *h == response_sha256)
    {
        return Err(SettlementError::ProviderSignatureInvalid {
            reason: format!("response_sha256 {response_sha256} not present in evidenceRefs"),
        });
    }
    if !directory.key_belongs_to(tenant_id, payee_agent_id, &signature.key_id) {
        return Err(SettlementError::ProviderSignatureInvalid {
            reason: format!("key {} is not registered for the payee", signature.key_id),
        });
    }
    let public_key = registry.lookup(tenant_id, &signature.key_id).ok_or_else(|| {
        SettlementError::ProviderSignatureInvalid {
            reason: format!("unknown key {}", signature.key_id),
        }
    })?;
    if !verify_hash_hex(&response_sha256, &signature.signature_base64, &public_key) {
        return Err(SettlementError::ProviderSignatureInvalid {
            reason: "signature does not verify over the response hash".to_string(),
        });
    }

    Ok(ProviderSigBinding {
        key_id: signature.key_id.clone(),
        jwk_thumbprint: public_key.jwk_thumbprint(),
        response_sha256,
    })
}

/// Outcome of a verified quote binding.
#[derive(Debug, Clone)]
pub struct QuoteBinding {
    /// Signer key id.
    pub key_id: String,
    /// Full JWK thumbprint of the quote signing key.
    pub jwk_thumbprint: String,
    /// Quote identifier (uniqueness is enforced by the engine).
    pub quote_id: String,
    /// Canonical hash of the quote payload.
    pub quote_sha256: String,
    /// Request hash the quote binds to.
    pub request_binding_sha256: String,
}

/// Canonical-hash the quote payload, match the expected hash, verify the
/// payee's signature, and check amount/currency/request binding.
#[allow(clippy::too_many_arguments)]
pub fn verify_quote_binding(
    tenant_id: &str,
    payee_agent_id: &str,
    quote_payload: &Value,
    expected_quote_sha256: Option<&str>,
    signature: &ProviderSignature,
    gate_amount_cents: u64,
    gate_currency: &str,
    evidence_refs: &[String],
    registry: &dyn KeyRegistry,
    directory: &dyn AgentKeyDirectory,
) -> Result<QuoteBinding, SettlementError> {
    let mismatch = |reason: String| SettlementError::QuoteBindingMismatch { reason };

    let quote_sha256 = hash_canonical(&normalize(quote_payload)?)?;
    if let Some(expected) = expected_quote_sha256 {
        if expected != quote_sha256 {
            return Err(mismatch(format!(
                "quoteSha256 mismatch: expected {expected}, computed {quote_sha256}"
            )));
        }
    }

    let payload = quote_payload
        .as_object()
        .ok_or_else(|| mismatch("quote payload must be an object".to_string()))?;

    let quote_id = payload
        .get("quoteId")
        .and_then(Value::as_str)
        .ok_or_else(|| mismatch("quote payload missing quoteId".to_string()))?
        .to_string();

    let amount = payload.get("amountCents").and_then(Value::as_u64);
    if amount != Some(gate_amount_cents) {
        return Err(mismatch(format!(
            "quote amountCents {amount:?} does not match gate amount {gate_amount_cents}"
        )));
    }
    let currency = payload.get("currency").and_then(Value::as_str);
    if currency != Some(gate_currency) {
        return Err(mismatch(format!(
            "quote currency {currency:?} does not match gate currency {gate_currency}"
        )));
    }

    let request_binding_sha256 = payload
        .get("requestBindingSha256")
        .and_then(Value::as_str)
        .ok_or_else(|| mismatch("quote payload missing requestBindingSha256".to_string()))?
        .to_string();
    if !evidence_request_hashes(evidence_refs)
        .iter()
        .any(|h| *h == request_binding_sha256)
    {
        return Err(mismatch(format!(
            "requestBindingSha256 {request_binding_sha256} not present in evidenceRefs"
        )));
    }

    if !directory.key_belongs_to(tenant_id, payee_agent_id, &signature.key_id) {
        return Err(mismatch(format!(
            "quote key {} is not registered for the payee",
            signature.key_id
        )));
    }
    let public_key = registry
        .lookup(tenant_id, &signature.key_id)
        .ok_or_else(|| mismatch(format!("unknown quote key {}", signature.key_id)))?;
    if !verify_hash_hex(&quote_sha256, &signature.signature_base64, &public_key) {
        return Err(mismatch(
            "quote signature does not verify over the quote hash".to_string(),
        ));
    }

    Ok(QuoteBinding {
        key_id: signature.key_id.clone(),
        jwk_thumbprint: public_key.jwk_thumbprint(),
        quote_id,
        quote_sha256,
        request_binding_sha256,
    })
}
