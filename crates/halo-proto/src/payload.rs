//! Tagged request payloads.
//!
//! Wire messages are discriminated unions validated at the boundary: a
//! payload either parses into one of these variants or the message is
//! rejected. Nothing is trusted on structural similarity alone.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use halo_codec::Value;

use crate::types::InvocationDraft;

/// A request entering the system from the page context.
///
/// The serialized form is `{"type": "...", "data": {...}}`, flattened into
/// the surrounding envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RequestPayload {
    /// Ask the user to grant a capability to the calling origin.
    #[serde(rename = "capability/request", rename_all = "camelCase")]
    CapabilityRequest {
        methods: Vec<String>,
        scope: String,
        ttl_ms: u64,
    },

    /// Exercise a capability once; returns the signed invocation.
    #[serde(rename = "capability/invoke", rename_all = "camelCase")]
    CapabilityInvoke { draft: InvocationDraft },

    /// Extend a capability's expiry; id and methods are preserved.
    #[serde(rename = "capability/renew", rename_all = "camelCase")]
    CapabilityRenew { capability_id: String, extend_ms: u64 },

    /// Revoke a capability; irreversible.
    #[serde(rename = "capability/revoke", rename_all = "camelCase")]
    CapabilityRevoke { capability_id: String },

    /// Sign an arbitrary payload under the generic message domain.
    #[serde(rename = "message/sign", rename_all = "camelCase")]
    SignMessage { payload: Value },
}

impl RequestPayload {
    /// The wire tag for this payload.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestPayload::CapabilityRequest { .. } => "capability/request",
            RequestPayload::CapabilityInvoke { .. } => "capability/invoke",
            RequestPayload::CapabilityRenew { .. } => "capability/renew",
            RequestPayload::CapabilityRevoke { .. } => "capability/revoke",
            RequestPayload::SignMessage { .. } => "message/sign",
        }
    }
}

/// Event kinds for unsolicited authority pushes.
pub mod events {
    /// A capability was revoked; data carries `appOrigin` and `capabilityId`.
    pub const CAPABILITY_REVOKED: &str = "event/capabilityRevoked";
    /// The session locked; capabilities are unusable until the next unlock.
    pub const SESSION_LOCKED: &str = "event/sessionLocked";
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_tagged_wire_shape() {
        let payload = RequestPayload::CapabilityRequest {
            methods: vec!["transfer".to_string()],
            scope: "account".to_string(),
            ttl_ms: 60_000,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"capability/request\""));
        assert!(json.contains("\"ttlMs\":60000"));

        let back: RequestPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result: Result<RequestPayload, _> =
            serde_json::from_str(r#"{"type":"wallet/exportSecrets","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_kind_matches_tag() {
        let payload = RequestPayload::CapabilityRevoke {
            capability_id: "cap-1".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(payload.kind()));
    }
}
