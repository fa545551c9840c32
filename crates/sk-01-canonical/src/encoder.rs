//! # Canonical Encoder
//!
//! `encode` maps a `serde_json::Value` to its unique byte form:
//!
//! - object keys sorted by UTF-16 code-unit order (insertion order is
//!   irrelevant)
//! - arrays in element order
//! - integers as `n`; integral floats within the 2^53 safe range in integer
//!   form; other finite floats in Rust's shortest round-trip form
//! - minimal string escaping: control chars, `"` and `\` only
//! - no whitespace

use crate::errors::CanonicalError;
use serde_json::Value;
use std::cmp::Ordering;

/// Largest integer exactly representable as an IEEE-754 double.
const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_992.0;

/// Encode a value to its canonical UTF-8 bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(128);
    write_value(value, "", &mut out)?;
    Ok(out)
}

/// Encode to a `String` (the bytes are always valid UTF-8).
pub fn canonical_string(value: &Value) -> Result<String, CanonicalError> {
    let bytes = encode(value)?;
    Ok(String::from_utf8(bytes).expect("canonical output is UTF-8"))
}

/// SHA-256 hex of the canonical bytes.
pub fn hash_canonical(value: &Value) -> Result<String, CanonicalError> {
    Ok(sk_crypto::sha256_hex(encode(value)?))
}

fn write_value(value: &Value, path: &str, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(n, path, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, &format!("{path}/{i}"), out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_cmp(a, b));
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                let child = &map[key.as_str()];
                write_value(child, &format!("{path}/{key}"), out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_number(n: &serde_json::Number, path: &str, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
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
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER_F64 {
        // Integral doubles collapse to integer form so the encode/parse
        // fixpoint holds.
        out.extend_from_slice((f as i64).to_string().as_bytes());
    } else {
        // Rust's Display for f64 is the shortest decimal that round-trips,
        // with no exponent notation.
        out.extend_from_slice(f.to_string().as_bytes());
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Compare two strings by their UTF-16 code-unit sequences.
///
/// Differs from byte order only for keys containing supplementary-plane
/// characters, which sort *before* U+E000..U+FFFF in UTF-16.
fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}
