//! Halo Canonical Codec
//!
//! Deterministic value encoding and domain-separated hashing. The canonical
//! string produced here is the exact byte-for-byte input to every signature
//! in the system: every signer and every verifier must go through this crate,
//! and any divergence breaks all signatures.
//!
//! The codec is pure and stateless: no I/O, no clocks, no randomness.
//!
//! # Safety Invariants
//!
//! ## Success Conditions
//! - `canonicalize` succeeds only for trees of finite numbers
//! - Structurally equal maps produce byte-identical output regardless of
//!   insertion order
//!
//! ## Forbidden States
//! - Whitespace anywhere in canonical output
//! - A capability or invocation hash computed over fields outside the
//!   allow-list projections
//! - A digest shared between two domain prefixes

#![no_std]
extern crate alloc;

pub mod canonical;
pub mod error;
pub mod hash;
pub mod renorm;
pub mod value;

pub use canonical::{
    canonicalize, canonicalize_capability, canonicalize_invocation, capability_projection,
    invocation_projection,
};
pub use error::CodecError;
pub use hash::{
    hash_capability_with_domain, hash_invocation_with_domain, hash_message_with_domain,
    origin_hash, payload_hash, CAPABILITY_DOMAIN, INVOCATION_DOMAIN, MESSAGE_DOMAIN,
};
pub use renorm::renormalize;
pub use value::Value;
