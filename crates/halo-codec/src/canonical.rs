//! Deterministic canonical encoding.
//!
//! The encoding rules:
//!
//! - `null` / absent → `null`
//! - booleans → `true` / `false`
//! - finite numbers → shortest decimal string; non-finite rejected
//! - strings → quoted, JSON-style escaping
//! - byte sequences → quoted `0x`-prefixed lowercase hex
//! - arrays → order preserved, comma-joined, bracket-wrapped
//! - maps → keys sorted lexicographically by code point, `"key":value`
//!   entries comma-joined, brace-wrapped
//!
//! No whitespace is ever inserted. Structurally equal maps canonicalize to
//! byte-identical strings regardless of how they were built.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use core::fmt::Write;

use crate::error::CodecError;
use crate::value::Value;

/// Fields of a capability covered by its signature, in canonical order.
///
/// Anything outside this list is silently dropped from what gets signed:
/// the signature is bound to a known schema, so extra fields can never be
/// smuggled into a verified object.
pub const CAPABILITY_FIELDS: &[&str] = &[
    "appOrigin",
    "branchId",
    "circle",
    "encrypted",
    "epoch",
    "expiresAt",
    "issuedAt",
    "methods",
    "nonceBase",
    "scope",
    "version",
];

/// Header fields of an invocation covered by its signature.
pub const INVOCATION_HEADER_FIELDS: &[&str] = &[
    "branchId",
    "circleId",
    "epoch",
    "nonce",
    "originHash",
    "timestamp",
    "version",
];

/// Body fields of an invocation covered by its signature.
pub const INVOCATION_BODY_FIELDS: &[&str] = &["capabilityId", "method", "payloadHash"];

/// Encode a value into its unique canonical string.
pub fn canonicalize(value: &Value) -> Result<String, CodecError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, *n)?,
        Value::String(s) => write_escaped(out, s),
        Value::Bytes(bytes) => {
            out.push('"');
            out.push_str("0x");
            out.push_str(&hex::encode(bytes));
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            // BTreeMap iterates in code-point order already.
            for (index, (key, entry)) in entries.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_escaped(out, key);
                out.push(':');
                write_value(out, entry)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(out: &mut String, n: f64) -> Result<(), CodecError> {
    if !n.is_finite() {
        return Err(CodecError::NonFiniteNumber);
    }
    // Negative zero renders as plain zero.
    if n == 0.0 {
        out.push('0');
        return Ok(());
    }
    let _ = write!(out, "{}", n);
    Ok(())
}

fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Build the allow-list projection of a capability payload.
///
/// Every key in [`CAPABILITY_FIELDS`] is present in the result (absent input
/// fields project to `null`, keeping the signed schema stable); `methods` is
/// sorted lexicographically; everything else on the input is dropped.
pub fn capability_projection(payload: &Value) -> Result<Value, CodecError> {
    let map = payload.as_map().ok_or(CodecError::ExpectedObject)?;
    let mut out = BTreeMap::new();
    for &field in CAPABILITY_FIELDS {
        let mut value = map.get(field).cloned().unwrap_or(Value::Null);
        if field == "methods" {
            sort_string_array(&mut value);
        }
        out.insert(field.to_string(), value);
    }
    Ok(Value::Map(out))
}

/// Build the allow-list projection of an invocation.
///
/// The projection is `{header: {...}, body: {...}}` with exactly the fields
/// in [`INVOCATION_HEADER_FIELDS`] and [`INVOCATION_BODY_FIELDS`].
pub fn invocation_projection(invocation: &Value) -> Result<Value, CodecError> {
    let map = invocation.as_map().ok_or(CodecError::ExpectedObject)?;
    let header = map.get("header").cloned().unwrap_or(Value::Null);
    let body = map.get("body").cloned().unwrap_or(Value::Null);

    let mut out = BTreeMap::new();
    out.insert(
        "header".to_string(),
        project_fields(&header, INVOCATION_HEADER_FIELDS)?,
    );
    out.insert(
        "body".to_string(),
        project_fields(&body, INVOCATION_BODY_FIELDS)?,
    );
    Ok(Value::Map(out))
}

fn project_fields(value: &Value, fields: &[&str]) -> Result<Value, CodecError> {
    let map = value.as_map().ok_or(CodecError::ExpectedObject)?;
    let mut out = BTreeMap::new();
    for &field in fields {
        out.insert(
            field.to_string(),
            map.get(field).cloned().unwrap_or(Value::Null),
        );
    }
    Ok(Value::Map(out))
}

fn sort_string_array(value: &mut Value) {
    if let Value::Array(items) = value {
        if items.iter().all(|item| matches!(item, Value::String(_))) {
            items.sort_by(|a, b| a.as_str().unwrap_or("").cmp(b.as_str().unwrap_or("")));
        }
    }
}

/// Canonicalize the allow-list projection of a capability payload.
pub fn canonicalize_capability(payload: &Value) -> Result<String, CodecError> {
    canonicalize(&capability_projection(payload)?)
}

/// Canonicalize the allow-list projection of an invocation.
pub fn canonicalize_invocation(invocation: &Value) -> Result<String, CodecError> {
    canonicalize(&invocation_projection(invocation)?)
}
