//! Halo Capability Authority
//!
//! The trusted end of the message bridge: holds no UI, trusts no payload,
//! and is the only component that may combine capability validation with
//! key material from the vault.
//!
//! # State machine
//!
//! `Requested → Active → {Expired | Revoked}`, with `Active → Active` on
//! renewal. `Requested` exists only while the approval port is pending: a
//! capability is signed and stored strictly after user approval, so the
//! store never holds an unapproved entry. `Revoked` is terminal.
//!
//! # Nonce authority
//!
//! The wallet is sole arbiter of invocation ordering. Each accepted
//! invocation must supply a nonce strictly above the capability's
//! `last_nonce`; acceptance advances `last_nonce` to that nonce. The
//! validate → advance → sign sequence runs under a per-capability signing
//! mutex so near-simultaneous invocations can never observe the same
//! `last_nonce`.

#![no_std]
extern crate alloc;

pub mod approval;
pub mod mutex;
pub mod service;
pub mod signer;
pub mod store;
pub mod validate;

#[cfg(test)]
mod tests;

pub use approval::{ApprovalPort, AutoApprove, DenyAll};
pub use mutex::SigningMutex;
pub use service::{AuthorityConfig, AuthorityService};
pub use signer::{decode_hex, encode_hex, Ed25519Signer, Ed25519Verifier, Signer, SignatureVerifier};
pub use store::CapabilityStore;
pub use validate::validate_capability;
