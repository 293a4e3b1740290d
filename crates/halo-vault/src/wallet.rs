//! Wallet types and key generation.

use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use halo_proto::WalletError;

use crate::crypto::{self, DerivedKey, EncryptedBlob};

/// How a wallet's key material came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    /// Generated in this extension
    Generated,
    /// Imported from a seed or mnemonic
    Imported,
}

/// A decrypted wallet.
///
/// The private key is exclusively owned by the session manager's decrypted
/// in-memory set: it is never written to durable storage unencrypted and
/// never crosses the message bridge. Secrets are zeroed on drop.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Chain-generic address derived from the public key
    pub address: String,
    /// Hex-encoded public key
    pub public_key: String,
    /// Raw Ed25519 seed
    pub private_key: [u8; 32],
    /// Recovery mnemonic, if the wallet was created from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    /// Provenance
    #[serde(rename = "type")]
    pub kind: WalletKind,
}

impl Wallet {
    /// Generate a fresh wallet from secure entropy.
    pub fn generate() -> Result<Self, WalletError> {
        let seed = crypto::random_bytes::<32>()?;
        Ok(Self::from_seed(seed, None, WalletKind::Generated))
    }

    /// Build a wallet from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32], mnemonic: Option<String>, kind: WalletKind) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let public_key = signing_key.verifying_key().to_bytes();
        Self {
            address: derive_address(&public_key),
            public_key: format!("0x{}", hex::encode(public_key)),
            private_key: seed,
            mnemonic,
            kind,
        }
    }

    /// Zero the secret fields in place.
    pub fn scrub(&mut self) {
        self.private_key.zeroize();
        if let Some(mnemonic) = &mut self.mnemonic {
            mnemonic.zeroize();
        }
        self.mnemonic = None;
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        self.scrub();
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("kind", &self.kind)
            .finish()
    }
}

/// Derive the chain-generic address for a public key:
/// `0x` + hex of the first 20 bytes of SHA-256(public key).
pub fn derive_address(public_key: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key);
    let digest: [u8; 32] = hasher.finalize().into();
    format!("0x{}", hex::encode(&digest[..20]))
}

/// The only durable representation of a wallet's secret material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedWalletRecord {
    pub address: String,
    pub encrypted_blob: EncryptedBlob,
    pub created_at: u64,
}

impl EncryptedWalletRecord {
    /// Encrypt a wallet under the password-derived key.
    pub fn seal(wallet: &Wallet, key: &DerivedKey, now: u64) -> Result<Self, WalletError> {
        let plaintext = serde_json::to_vec(wallet)
            .map_err(|e| WalletError::Internal(format!("serialization failed: {}", e)))?;
        Ok(Self {
            address: wallet.address.clone(),
            encrypted_blob: crypto::encrypt_blob(key, &plaintext)?,
            created_at: now,
        })
    }

    /// Decrypt back into a wallet.
    pub fn open(&self, key: &DerivedKey) -> Result<Wallet, WalletError> {
        let plaintext = crypto::decrypt_blob(key, &self.encrypted_blob)?;
        serde_json::from_slice(&plaintext).map_err(|_| WalletError::DecryptionFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct_wallets() {
        let a = Wallet::generate().unwrap();
        let b = Wallet::generate().unwrap();
        assert_ne!(a.address, b.address);
        assert!(a.address.starts_with("0x"));
        assert_eq!(a.address.len(), 2 + 40);
        assert_eq!(a.kind, WalletKind::Generated);
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = Wallet::from_seed([5u8; 32], None, WalletKind::Imported);
        let b = Wallet::from_seed([5u8; 32], None, WalletKind::Imported);
        assert_eq!(a.address, b.address);
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = DerivedKey::from_bytes([3u8; 32]);
        let wallet = Wallet::from_seed(
            [5u8; 32],
            Some("abandon ability able".into()),
            WalletKind::Imported,
        );
        let record = EncryptedWalletRecord::seal(&wallet, &key, 1_000).unwrap();
        assert_eq!(record.address, wallet.address);
        assert_eq!(record.created_at, 1_000);

        let opened = record.open(&key).unwrap();
        assert_eq!(opened, wallet);
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let key = DerivedKey::from_bytes([3u8; 32]);
        let wrong = DerivedKey::from_bytes([4u8; 32]);
        let wallet = Wallet::generate().unwrap();
        let record = EncryptedWalletRecord::seal(&wallet, &key, 0).unwrap();
        assert!(matches!(
            record.open(&wrong),
            Err(WalletError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_record_never_contains_plaintext_key() {
        let key = DerivedKey::from_bytes([3u8; 32]);
        let wallet = Wallet::from_seed([5u8; 32], None, WalletKind::Imported);
        let record = EncryptedWalletRecord::seal(&wallet, &key, 0).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("privateKey"));
        assert!(!json.contains(&hex::encode([5u8; 32])));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let wallet = Wallet::from_seed([5u8; 32], Some("seed words".into()), WalletKind::Imported);
        let rendered = alloc::format!("{:?}", wallet);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("seed words"));
    }
}
