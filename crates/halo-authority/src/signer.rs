//! Signature primitives behind a trait seam.
//!
//! The elliptic-curve scheme is an external, swappable primitive: everything
//! above this module works with digests, hex strings, and the two traits.

use alloc::string::String;
use alloc::vec::Vec;

use ed25519_dalek::{Signer as DalekSigner, SigningKey, VerifyingKey};

use halo_proto::WalletError;

/// Produces signatures over 256-bit digests.
pub trait Signer {
    /// Raw public key bytes.
    fn public_key(&self) -> [u8; 32];
    /// Sign a domain-separated digest.
    fn sign(&self, digest: &[u8; 32]) -> [u8; 64];
}

/// Verifies signatures over 256-bit digests.
pub trait SignatureVerifier {
    fn verify(&self, public_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool;
}

/// Ed25519 signer over a wallet seed.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    fn sign(&self, digest: &[u8; 32]) -> [u8; 64] {
        self.key.sign(digest).to_bytes()
    }
}

/// Ed25519 verifier.
#[derive(Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool {
        let public_key: [u8; 32] = match public_key.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let verifying_key = match VerifyingKey::from_bytes(&public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let signature: [u8; 64] = match signature.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        verifying_key
            .verify_strict(digest, &ed25519_dalek::Signature::from_bytes(&signature))
            .is_ok()
    }
}

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    alloc::format!("0x{}", hex::encode(bytes))
}

/// Decode a `0x`-prefixed hex string.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, WalletError> {
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(stripped).map_err(|_| WalletError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = Ed25519Signer::from_seed(&[7u8; 32]);
        let digest = [1u8; 32];
        let signature = signer.sign(&digest);

        let verifier = Ed25519Verifier;
        assert!(verifier.verify(&signer.public_key(), &digest, &signature));
        assert!(!verifier.verify(&signer.public_key(), &[2u8; 32], &signature));

        let other = Ed25519Signer::from_seed(&[8u8; 32]);
        assert!(!verifier.verify(&other.public_key(), &digest, &signature));
    }

    #[test]
    fn test_verify_rejects_malformed_inputs() {
        let verifier = Ed25519Verifier;
        assert!(!verifier.verify(&[0u8; 5], &[0u8; 32], &[0u8; 64]));
        assert!(!verifier.verify(&[0u8; 32], &[0u8; 32], &[0u8; 3]));
    }

    #[test]
    fn test_hex_roundtrip() {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        let text = encode_hex(&bytes);
        assert_eq!(text, "0xdeadbeef");
        assert_eq!(decode_hex(&text).unwrap(), bytes);
        assert_eq!(decode_hex("deadbeef").unwrap(), bytes);
        assert!(decode_hex("0xzz").is_err());
    }
}
