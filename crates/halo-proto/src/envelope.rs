//! Envelopes for the three hops.
//!
//! Page → Relay: `{source: "provider", type, requestId, data}`
//! Relay → Page: `{source: "relay", requestId, type, success, result|error}`
//! Relay → Authority: `{source: "relay", type, requestId, data: {...payload, appOrigin}}`
//! Authority → Relay: `{type, requestId, success, result|error}`, plus
//! unsolicited pushes `{type, data}` with no request id.
//!
//! The relay attaches `appOrigin` from its OWN document location before
//! forwarding to the authority — the page payload is never trusted for it.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};

use halo_codec::Value;

use crate::error::WalletError;
use crate::payload::RequestPayload;

/// `source` value on messages originating from the page provider stub.
pub const SOURCE_PROVIDER: &str = "provider";

/// `source` value on messages originating from the relay.
pub const SOURCE_RELAY: &str = "relay";

/// Key under which the relay stamps the calling origin into the data object.
pub const APP_ORIGIN_KEY: &str = "appOrigin";

/// Page → Relay request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
    pub source: String,
    pub request_id: String,
    #[serde(flatten)]
    pub payload: RequestPayload,
}

impl PageEnvelope {
    pub fn new(request_id: String, payload: RequestPayload) -> Self {
        Self {
            source: SOURCE_PROVIDER.to_string(),
            request_id,
            payload,
        }
    }
}

/// Relay → Page response envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub source: String,
    pub request_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WalletError>,
}

/// Relay → Page out-of-band event (no request id; never resolves a pending
/// request).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Relay → Authority request envelope.
///
/// `data` is the page payload's data object with `appOrigin` merged in by
/// the relay. [`AuthorityEnvelope::parse`] is the typed boundary on the
/// authority side: it splits the origin back out and rejects anything that
/// does not match a known payload shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityEnvelope {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: String,
    pub data: Value,
}

impl AuthorityEnvelope {
    /// Build the authority-bound envelope from a page envelope, stamping the
    /// relay-derived origin into the data object.
    pub fn from_page(envelope: &PageEnvelope, app_origin: &str) -> Result<Self, WalletError> {
        let tagged = serde_json::to_value(&envelope.payload)
            .map_err(|e| WalletError::Internal(alloc::format!("serialization failed: {}", e)))?;
        let tagged = Value::from(tagged);
        let data = tagged
            .get("data")
            .cloned()
            .ok_or_else(|| WalletError::MalformedEnvelope("payload has no data".to_string()))?;

        let mut entries = match data {
            Value::Map(entries) => entries,
            _ => return Err(WalletError::MalformedEnvelope("data is not an object".to_string())),
        };
        entries.insert(
            APP_ORIGIN_KEY.to_string(),
            Value::String(app_origin.to_string()),
        );

        Ok(Self {
            source: SOURCE_RELAY.to_string(),
            kind: envelope.payload.kind().to_string(),
            request_id: envelope.request_id.clone(),
            data: Value::Map(entries),
        })
    }

    /// Split the envelope into the relay-stamped origin and the typed
    /// payload. Unknown tags and malformed shapes are rejected here, at the
    /// boundary.
    pub fn parse(&self) -> Result<(String, RequestPayload), WalletError> {
        let entries = self
            .data
            .as_map()
            .ok_or_else(|| WalletError::MalformedEnvelope("data is not an object".to_string()))?;

        let app_origin = entries
            .get(APP_ORIGIN_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| WalletError::MalformedEnvelope("missing appOrigin".to_string()))?
            .to_string();

        let mut rest: BTreeMap<String, Value> = entries.clone();
        rest.remove(APP_ORIGIN_KEY);

        let mut tagged = BTreeMap::new();
        tagged.insert("type".to_string(), Value::String(self.kind.clone()));
        tagged.insert("data".to_string(), Value::Map(rest));

        let json = serde_json::to_value(Value::Map(tagged))
            .map_err(|e| WalletError::Internal(alloc::format!("serialization failed: {}", e)))?;
        let payload: RequestPayload = serde_json::from_value(json)
            .map_err(|_| WalletError::UnknownPayload(self.kind.clone()))?;

        // Byte payloads inside raw value fields degrade again during the
        // typed parse; restore them so the codec's byte case holds.
        let payload = match payload {
            RequestPayload::SignMessage { payload } => RequestPayload::SignMessage {
                payload: halo_codec::renormalize(payload),
            },
            other => other,
        };

        Ok((app_origin, payload))
    }
}

/// Authority → Relay response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WalletError>,
}

impl AuthorityResponse {
    pub fn ok(kind: &str, request_id: &str, result: Value) -> Self {
        Self {
            kind: kind.to_string(),
            request_id: request_id.to_string(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(kind: &str, request_id: &str, error: WalletError) -> Self {
        Self {
            kind: kind.to_string(),
            request_id: request_id.to_string(),
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Authority → Relay unsolicited push. No request id: the relay forwards
/// these to the page as out-of-band events instead of resolving a pending
/// request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityPush {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}
