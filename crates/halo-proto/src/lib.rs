//! Halo Wire Protocol
//!
//! This crate is the **single source of truth** for everything that crosses a
//! context boundary:
//!
//! - **Envelopes** for the three hops (page ↔ relay ↔ authority)
//! - **Payloads**: tagged request variants, validated at the boundary
//! - **Capability / Invocation** wire shapes
//! - **Error taxonomy** shared by every context
//! - **Storage keys** for the durable and ephemeral stores
//!
//! Duplicating any of these constants or shapes in another crate is a bug:
//! the page provider, the relay, and the authority must agree on them
//! byte-for-byte, and a single definition is what keeps them agreeing.

#![no_std]
extern crate alloc;

pub mod envelope;
pub mod error;
pub mod ids;
pub mod payload;
pub mod storage;
pub mod types;

pub use envelope::{
    AuthorityEnvelope, AuthorityPush, AuthorityResponse, PageEnvelope, PageEvent, RelayResponse,
    SOURCE_PROVIDER, SOURCE_RELAY,
};
pub use error::WalletError;
pub use ids::random_id;
pub use payload::RequestPayload;
pub use types::{
    Capability, CapabilityState, Invocation, InvocationBody, InvocationDraft, InvocationHeader,
};
