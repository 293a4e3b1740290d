//! Byte-payload renormalization.
//!
//! Raw byte payloads lose their typed shape when serialized across a
//! structured-message boundary, arriving as generic indexed objects
//! (`{"0": 222, "1": 173, ...}`). The relay renormalizes such objects back
//! into ordered byte sequences before handing them onward — in both
//! directions — otherwise the codec's byte-array case misfires and every
//! signature over the payload diverges.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::value::Value;

/// Recursively restore byte sequences degraded into indexed objects.
pub fn renormalize(value: Value) -> Value {
    match value {
        Value::Map(entries) => {
            if let Some(bytes) = as_byte_object(&entries) {
                return Value::Bytes(bytes);
            }
            Value::Map(
                entries
                    .into_iter()
                    .map(|(key, entry)| (key, renormalize(entry)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(renormalize).collect()),
        other => other,
    }
}

/// A map is a degraded byte sequence exactly when its keys are the canonical
/// decimal strings `"0"` through `"n-1"` and every value is an integer in
/// `0..=255`.
fn as_byte_object(entries: &BTreeMap<String, Value>) -> Option<Vec<u8>> {
    if entries.is_empty() {
        return None;
    }
    let mut bytes = vec![0u8; entries.len()];
    for (key, value) in entries {
        let index: usize = key.parse().ok()?;
        if index >= bytes.len() || key != &alloc::format!("{}", index) {
            return None;
        }
        let number = value.as_u64()?;
        if number > 255 {
            return None;
        }
        bytes[index] = number as u8;
    }
    Some(bytes)
}
