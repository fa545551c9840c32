//! # Webhook HMAC
//!
//! Inbound webhooks authenticate with `hex(HMAC-SHA256(secret, "{ts}.{body}"))`
//! and a signed-at timestamp. Verification enforces a skew window both ways
//! and compares in constant time.

use crate::hashing::timing_safe_eq;
use crate::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default timestamp tolerance.
pub const DEFAULT_TOLERANCE_SECONDS: u64 = 300;

/// Compute the webhook signature for `ts` and `body`.
pub fn webhook_signature(secret: &[u8], ts: u64, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(ts.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature at time `now` with the given tolerance.
pub fn verify_webhook(
    secret: &[u8],
    ts: u64,
    body: &str,
    signature_hex: &str,
    now: u64,
    tolerance_seconds: u64,
) -> Result<(), CryptoError> {
    let skew = now.abs_diff(ts);
    if skew > tolerance_seconds {
        return Err(CryptoError::TimestampOutOfTolerance {
            skew_seconds: skew,
            tolerance_seconds,
        });
    }
    let expected = webhook_signature(secret, ts, body);
    if !timing_safe_eq(expected.as_bytes(), signature_hex.as_bytes()) {
        return Err(CryptoError::WebhookSignatureMismatch);
    }
    Ok(())
}
