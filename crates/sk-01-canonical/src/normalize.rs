//! # Normalization & Key-Set Guards
//!
//! `normalize` pre-validates a value tree before it is hashed, stored or
//! compared: it walks every node, applies the number rules and the nesting
//! cap, and returns the validated tree. Externally-received maps
//! additionally pass through the key-set guards so unknown keys fail closed.

use crate::errors::CanonicalError;
use serde_json::{Map, Value};

/// Maximum nesting depth accepted by the kernel.
pub const MAX_DEPTH: usize = 64;

/// Validate a value tree; returns the normalized tree or the offending path.
pub fn normalize(value: &Value) -> Result<Value, CanonicalError> {
    walk(value, "", 0)?;
    Ok(value.clone())
}

fn walk(value: &Value, path: &str, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::DepthExceeded { path: path.into() });
    }
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() || n.as_u64().is_some() {
                return Ok(());
            }
            let f = n
                .as_f64()
                .ok_or_else(|| CanonicalError::NumberNotFinite { path: path.into() })?;
            if !f.is_finite() {
                return Err(CanonicalError::NumberNotFinite { path: path.into() });
            }
            if f == 0.0 && f.is_sign_negative() {
                return Err(CanonicalError::NegativeZero { path: path.into() });
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}/{i}"), depth + 1)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &format!("{path}/{key}"), depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Reject any key outside `allowed`.
pub fn check_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    path: &str,
) -> Result<(), CanonicalError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(CanonicalError::UnknownKey {
                path: path.into(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// Require every key in `required` to be present and non-null.
pub fn require_keys(
    map: &Map<String, Value>,
    required: &[&str],
    path: &str,
) -> Result<(), CanonicalError> {
    for key in required {
        match map.get(*key) {
            Some(Value::Null) | None => {
                return Err(CanonicalError::MissingKey {
                    path: path.into(),
                    key: (*key).to_string(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Borrow the object form of a value, or fail with the path.
pub fn as_object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<&'a Map<String, Value>, CanonicalError> {
    value
        .as_object()
        .ok_or_else(|| CanonicalError::NotAnObject { path: path.into() })
}
