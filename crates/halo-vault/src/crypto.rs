//! Cryptographic operations for the vault.
//!
//! Argon2id for password hardening, AES-256-GCM for authenticated
//! encryption. Both are external primitives in the sense of the protocol:
//! nothing above this module depends on the concrete algorithms, only on
//! the shapes.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use halo_proto::WalletError;

/// Argon2id parameters.
///
/// Defaults are the WASM-compatible minimum: Argon2 in WASM runs 10-100x
/// slower than native, so the memory cost stays low. Hosts with native
/// execution should raise it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfConfig {
    /// Iterations
    pub time_cost: u32,
    /// Memory cost in KB
    pub memory_cost: u32,
    /// Parallelism
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_cost: 64,
            parallelism: 1,
        }
    }
}

/// A 256-bit key derived from a password or generated for a session.
///
/// The raw bytes are zeroed on drop and never leave this module except
/// through the encrypt/decrypt functions.
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key (used for session keys).
    pub fn generate() -> Result<Self, WalletError> {
        Ok(Self(random_bytes::<32>()?))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy of the raw bytes, for writing to the ephemeral store only.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Derive an encryption key from a password using Argon2id.
pub fn derive_key(
    password: &str,
    salt: &[u8; 32],
    config: &KdfConfig,
) -> Result<DerivedKey, WalletError> {
    let params = Params::new(
        config.memory_cost,
        config.time_cost,
        config.parallelism,
        Some(32),
    )
    .map_err(|e| WalletError::Internal(format!("invalid KDF params: {:?}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| WalletError::Internal(format!("key derivation failed: {:?}", e)))?;

    Ok(DerivedKey(key))
}

/// Verification value stored durably in place of the password.
///
/// A hash of the derived key, so the stored value can confirm a password
/// without the raw key-encryption key ever being written anywhere.
pub fn verification_hash(key: &DerivedKey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// An authenticated ciphertext.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    /// Encrypted payload
    pub ciphertext: Vec<u8>,
    /// Nonce/IV for decryption
    pub nonce: [u8; 12],
    /// Authentication tag
    pub tag: [u8; 16],
}

/// Encrypt a payload under a derived key (AES-256-GCM, fresh random nonce).
pub fn encrypt_blob(key: &DerivedKey, plaintext: &[u8]) -> Result<EncryptedBlob, WalletError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| WalletError::Internal(format!("cipher init failed: {:?}", e)))?;

    let nonce: [u8; 12] = random_bytes()?;

    let ciphertext_with_tag = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| WalletError::Internal(format!("encryption failed: {:?}", e)))?;

    // AES-GCM appends the 16-byte tag to the ciphertext.
    let tag_start = ciphertext_with_tag.len() - 16;
    let ciphertext = ciphertext_with_tag[..tag_start].to_vec();
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&ciphertext_with_tag[tag_start..]);

    Ok(EncryptedBlob {
        ciphertext,
        nonce,
        tag,
    })
}

/// Decrypt a blob. The authentication tag is verified before any plaintext
/// is returned; a wrong key or tampered data fails with `DecryptionFailure`.
pub fn decrypt_blob(key: &DerivedKey, blob: &EncryptedBlob) -> Result<Vec<u8>, WalletError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| WalletError::Internal(format!("cipher init failed: {:?}", e)))?;

    let mut ciphertext_with_tag = blob.ciphertext.clone();
    ciphertext_with_tag.extend_from_slice(&blob.tag);

    cipher
        .decrypt(Nonce::from_slice(&blob.nonce), ciphertext_with_tag.as_slice())
        .map_err(|_| WalletError::DecryptionFailure)
}

/// Fill an array with secure random bytes.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], WalletError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| WalletError::Internal(format!("entropy source failed: {}", e)))?;
    Ok(bytes)
}

/// Generate a random KDF salt.
pub fn generate_salt() -> Result<[u8; 32], WalletError> {
    random_bytes()
}

/// Encode a password for the ephemeral store.
///
/// Base64 is an encoding, not protection: the value is only as safe as the
/// ephemeral store's browser-session scope.
pub fn encode_session_password(password: &str) -> Vec<u8> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    STANDARD.encode(password.as_bytes()).into_bytes()
}

/// Decode a password recovered from the ephemeral store.
pub fn decode_session_password(encoded: &[u8]) -> Result<String, WalletError> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let text = core::str::from_utf8(encoded)
        .map_err(|_| WalletError::DecryptionFailure)?;
    let bytes = STANDARD
        .decode(text)
        .map_err(|_| WalletError::DecryptionFailure)?;
    String::from_utf8(bytes).map_err(|_| WalletError::DecryptionFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_is_deterministic() {
        let salt = [7u8; 32];
        let config = KdfConfig::default();
        let a = derive_key("correct horse battery", &salt, &config).unwrap();
        let b = derive_key("correct horse battery", &salt, &config).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        let other = derive_key("wrong password", &salt, &config).unwrap();
        assert_ne!(a.as_bytes(), other.as_bytes());
    }

    #[test]
    fn test_verification_hash_hides_key() {
        let key = DerivedKey::from_bytes([9u8; 32]);
        let hash = verification_hash(&key);
        assert_ne!(&hash, key.as_bytes());
        assert_eq!(hash, verification_hash(&DerivedKey::from_bytes([9u8; 32])));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = DerivedKey::generate().unwrap();
        let blob = encrypt_blob(&key, b"secret wallet material").unwrap();
        assert_eq!(blob.tag.len(), 16);

        let plaintext = decrypt_blob(&key, &blob).unwrap();
        assert_eq!(plaintext, b"secret wallet material");
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key = DerivedKey::generate().unwrap();
        let other = DerivedKey::generate().unwrap();
        let blob = encrypt_blob(&key, b"secret").unwrap();
        assert_eq!(
            decrypt_blob(&other, &blob),
            Err(WalletError::DecryptionFailure)
        );
    }

    #[test]
    fn test_decrypt_tampered_fails() {
        let key = DerivedKey::generate().unwrap();
        let mut blob = encrypt_blob(&key, b"secret").unwrap();
        blob.ciphertext[0] ^= 0xff;
        assert_eq!(
            decrypt_blob(&key, &blob),
            Err(WalletError::DecryptionFailure)
        );
    }

    #[test]
    fn test_session_password_encoding_roundtrip() {
        let encoded = encode_session_password("hunter2-but-longer");
        let decoded = decode_session_password(&encoded).unwrap();
        assert_eq!(decoded, "hunter2-but-longer");
    }
}
