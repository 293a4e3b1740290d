//! Capability and invocation wire shapes.
//!
//! These are wire-format contracts: field names (camelCase) feed directly
//! into the canonical allow-list projections, so renaming a field here breaks
//! every signature in the system.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use halo_codec::Value;

use crate::error::WalletError;

/// Lifecycle state of a capability.
///
/// `Revoked` is terminal: there is no transition out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapabilityState {
    Active,
    Expired,
    Revoked,
}

/// A signed, origin-bound permission object granting a dApp a specific
/// method set for a limited time.
///
/// Owned by the authority once issued; immutable except `state` and
/// `last_nonce`. `app_origin` never changes after issuance, `last_nonce` is
/// monotonically non-decreasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Capability id (UUID)
    pub id: String,
    /// Schema version
    pub version: u64,
    /// Deployment circle this capability belongs to
    pub circle: String,
    /// Granted method names (set semantics; kept sorted and deduplicated)
    pub methods: Vec<String>,
    /// Grant scope
    pub scope: String,
    /// Whether invocation payloads must be encrypted
    pub encrypted: bool,
    /// The single web origin this capability is valid for
    pub app_origin: String,
    /// Branch context identifier
    pub branch_id: String,
    /// Key epoch at issuance
    pub epoch: u64,
    /// Issuance time (milliseconds since Unix epoch)
    pub issued_at: u64,
    /// Expiry time (milliseconds since Unix epoch)
    pub expires_at: u64,
    /// Random base folded into the nonce order
    pub nonce_base: u64,
    /// Highest accepted invocation nonce (0 before first use)
    pub last_nonce: u64,
    /// Hex-encoded public key of the backing wallet
    pub wallet_pub_key: String,
    /// Hex-encoded signature over the domain-separated projection hash
    pub signature: String,
    /// Lifecycle state
    pub state: CapabilityState,
}

impl Capability {
    /// Whether the capability's expiry is in the past.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at < now
    }

    /// Whether the capability grants the given method.
    pub fn grants_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// Convert to a codec value (the input to the allow-list projection).
    pub fn to_value(&self) -> Result<Value, WalletError> {
        to_value(self)
    }
}

/// Header of an invocation, covered by its signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationHeader {
    pub branch_id: String,
    pub circle_id: String,
    pub epoch: u64,
    /// Caller-supplied nonce; must strictly exceed the capability's
    /// `last_nonce` to be accepted
    pub nonce: u64,
    /// Hex-encoded SHA-256 of the calling origin
    pub origin_hash: String,
    /// Caller timestamp (milliseconds since Unix epoch)
    pub timestamp: u64,
    pub version: u64,
}

/// Body of an invocation, covered by its signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationBody {
    /// Id of the capability being exercised
    pub capability_id: String,
    /// Method being called
    pub method: String,
    /// Hex-encoded message-domain hash of the method payload
    pub payload_hash: String,
}

/// An unsigned invocation as submitted by the page.
///
/// The authority validates it, advances the nonce, and returns the signed
/// [`Invocation`]. Drafts are ephemeral: created per call, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationDraft {
    pub header: InvocationHeader,
    pub body: InvocationBody,
}

impl InvocationDraft {
    /// Convert to a codec value (the input to the allow-list projection).
    pub fn to_value(&self) -> Result<Value, WalletError> {
        to_value(self)
    }
}

/// A single signed use of a capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub header: InvocationHeader,
    pub body: InvocationBody,
    /// Hex-encoded signature over the domain-separated projection hash
    pub signature: String,
}

impl Invocation {
    /// Convert to a codec value (the input to the allow-list projection).
    pub fn to_value(&self) -> Result<Value, WalletError> {
        to_value(self)
    }
}

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, WalletError> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| WalletError::Internal(alloc::format!("serialization failed: {}", e)))
}
