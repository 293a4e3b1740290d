//! Correlation and capability identifiers.

use alloc::format;
use alloc::string::{String, ToString};

use crate::error::WalletError;

/// Generate a fresh random id (UUID v4, hyphenated).
///
/// Used for request correlation and capability ids. Entropy comes from the
/// host's secure generator.
pub fn random_id() -> Result<String, WalletError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| WalletError::Internal(format!("entropy source failed: {}", e)))?;
    Ok(uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string())
}

/// Generate a random nonce base for a new capability.
///
/// Kept within 32 bits so the value survives the codec's number
/// representation exactly on every party.
pub fn random_nonce_base() -> Result<u64, WalletError> {
    let mut bytes = [0u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| WalletError::Internal(format!("entropy source failed: {}", e)))?;
    Ok(u32::from_le_bytes(bytes) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = random_id().unwrap();
        let b = random_id().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
