//! Error taxonomy shared by every context.
//!
//! These errors cross the wire inside response envelopes, so they are plain
//! serde-serializable enums. Protocol-violation errors (origin, signature,
//! nonce, method) are terminal per invocation and are never auto-retried:
//! retrying them would mask or enable probing attacks.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use halo_codec::CodecError;

/// Wallet-core error taxonomy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    /// The calling origin does not match the capability's bound origin
    OriginMismatch,
    /// The capability's expiry is in the past
    Expired,
    /// The capability has been revoked (terminal state)
    Revoked,
    /// The requested method is not in the capability's granted set
    MethodNotGranted,
    /// Signature verification failed over the domain-separated hash
    InvalidSignature,
    /// The supplied nonce does not advance the capability's nonce order
    NonceReplay,
    /// Authenticated decryption failed (wrong password or corrupted data)
    DecryptionFailure,
    /// No session material is available; the vault is locked
    SessionUnavailable,
    /// Re-encryption of a legacy record failed during self-heal
    MigrationFailure,
    /// The client-side deadline for a pending request passed
    MessageTimeout,
    /// A number in a payload was NaN or infinite (codec)
    NonFiniteNumber,
    /// The user declined the capability grant
    ApprovalDenied,
    /// No capability with the given id exists for the calling origin
    CapabilityNotFound,
    /// No wallet with the given address is unlocked
    WalletNotFound,
    /// A payload's tag did not match any known request shape
    UnknownPayload(String),
    /// An envelope was structurally invalid
    MalformedEnvelope(String),
    /// A storage port failed
    Storage(String),
    /// Internal failure (serialization, entropy source)
    Internal(String),
}

impl From<CodecError> for WalletError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::NonFiniteNumber => WalletError::NonFiniteNumber,
            CodecError::ExpectedObject => {
                WalletError::MalformedEnvelope(String::from("expected an object"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_cross_the_wire() {
        let json = serde_json::to_string(&WalletError::NonceReplay).unwrap();
        assert_eq!(json, "\"NonceReplay\"");

        let back: WalletError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WalletError::NonceReplay);

        let storage = WalletError::Storage(String::from("quota exceeded"));
        let json = serde_json::to_string(&storage).unwrap();
        let back: WalletError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, storage);
    }

    #[test]
    fn test_codec_error_folds_in() {
        assert_eq!(
            WalletError::from(CodecError::NonFiniteNumber),
            WalletError::NonFiniteNumber
        );
    }
}
