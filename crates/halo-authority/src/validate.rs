//! Capability validation.

use halo_codec::hash_capability_with_domain;
use halo_proto::{Capability, CapabilityState, WalletError};

use crate::signer::{decode_hex, SignatureVerifier};

/// Validate a capability against the calling origin and requested method.
///
/// The checks are independent and their order is fixed for testability: a
/// capability failing several of them always reports the first of
/// origin → expiry → revocation → method grant → signature. Protocol
/// violations found here are terminal per invocation and never retried.
pub fn validate_capability<V: SignatureVerifier>(
    verifier: &V,
    capability: &Capability,
    app_origin: &str,
    method: &str,
    now: u64,
) -> Result<(), WalletError> {
    if capability.app_origin != app_origin {
        log::warn!(
            "origin mismatch for capability {}: caller {}",
            capability.id,
            app_origin
        );
        return Err(WalletError::OriginMismatch);
    }
    if capability.is_expired(now) || capability.state == CapabilityState::Expired {
        return Err(WalletError::Expired);
    }
    if capability.state == CapabilityState::Revoked {
        return Err(WalletError::Revoked);
    }
    if !capability.grants_method(method) {
        return Err(WalletError::MethodNotGranted);
    }

    let digest = hash_capability_with_domain(&capability.to_value()?)?;
    let public_key = decode_hex(&capability.wallet_pub_key)?;
    let signature = decode_hex(&capability.signature)?;
    if !verifier.verify(&public_key, &digest, &signature) {
        log::warn!("signature verification failed for capability {}", capability.id);
        return Err(WalletError::InvalidSignature);
    }
    Ok(())
}
