//! Domain-separated hashing over canonical strings.
//!
//! Three fixed ASCII prefixes keep the protocol contexts apart: a signature
//! produced for one context can never verify in another, even when the
//! underlying field values are identical. The digest is SHA-256; the prefixes
//! and the canonical encoding together form the wire-format contract.

use alloc::format;
use alloc::string::String;

use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize, canonicalize_capability, canonicalize_invocation};
use crate::error::CodecError;
use crate::value::Value;

/// Domain prefix for generic signed messages.
pub const MESSAGE_DOMAIN: &str = "HALO_MSG_V1:";

/// Domain prefix for capabilities.
pub const CAPABILITY_DOMAIN: &str = "HALO_CAP_V1:";

/// Domain prefix for invocations.
pub const INVOCATION_DOMAIN: &str = "HALO_INV_V1:";

fn digest_with_domain(domain: &str, canonical: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

/// Hash an arbitrary value under the generic message domain.
pub fn hash_message_with_domain(value: &Value) -> Result<[u8; 32], CodecError> {
    Ok(digest_with_domain(MESSAGE_DOMAIN, &canonicalize(value)?))
}

/// Hash the allow-list projection of a capability payload.
pub fn hash_capability_with_domain(payload: &Value) -> Result<[u8; 32], CodecError> {
    Ok(digest_with_domain(
        CAPABILITY_DOMAIN,
        &canonicalize_capability(payload)?,
    ))
}

/// Hash the allow-list projection of an invocation.
pub fn hash_invocation_with_domain(invocation: &Value) -> Result<[u8; 32], CodecError> {
    Ok(digest_with_domain(
        INVOCATION_DOMAIN,
        &canonicalize_invocation(invocation)?,
    ))
}

/// Hex-encoded message-domain hash of a method payload, as carried in an
/// invocation body's `payloadHash` field.
pub fn payload_hash(payload: &Value) -> Result<String, CodecError> {
    Ok(format!("0x{}", hex::encode(hash_message_with_domain(payload)?)))
}

/// Hex-encoded SHA-256 of an origin string, as carried in an invocation
/// header's `originHash` field.
pub fn origin_hash(origin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    format!("0x{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::string::ToString;
    use alloc::vec;

    fn overlapping_payload() -> Value {
        // Field names shared between the capability and invocation schemas.
        let mut header = BTreeMap::new();
        header.insert("branchId".to_string(), Value::String("main".into()));
        header.insert("epoch".to_string(), Value::Number(3.0));
        header.insert("version".to_string(), Value::Number(1.0));

        let mut map = BTreeMap::new();
        map.insert("branchId".to_string(), Value::String("main".into()));
        map.insert("epoch".to_string(), Value::Number(3.0));
        map.insert("version".to_string(), Value::Number(1.0));
        map.insert("header".to_string(), Value::Map(header.clone()));
        map.insert("body".to_string(), Value::Map(header));
        Value::Map(map)
    }

    #[test]
    fn test_domain_separation() {
        let payload = overlapping_payload();
        let as_message = hash_message_with_domain(&payload).unwrap();
        let as_capability = hash_capability_with_domain(&payload).unwrap();
        let as_invocation = hash_invocation_with_domain(&payload).unwrap();

        assert_ne!(as_message, as_capability);
        assert_ne!(as_message, as_invocation);
        assert_ne!(as_capability, as_invocation);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let payload = overlapping_payload();
        assert_eq!(
            hash_capability_with_domain(&payload).unwrap(),
            hash_capability_with_domain(&payload).unwrap()
        );
    }

    #[test]
    fn test_origin_hash_shape() {
        let hash = origin_hash("https://dapp.example");
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 2 + 64);
        assert_ne!(hash, origin_hash("https://evil.example"));
    }

    #[test]
    fn test_payload_hash_covers_content() {
        let a = Value::Array(vec![Value::Number(1.0)]);
        let b = Value::Array(vec![Value::Number(2.0)]);
        assert_ne!(payload_hash(&a).unwrap(), payload_hash(&b).unwrap());
    }
}
