//! Halo Message Bridge
//!
//! The three-hop relay protocol between an untrusted page, an isolated
//! relay, and the trusted authority. Contexts share no memory and exchange
//! only envelopes; this crate is transport-agnostic — the host adapter wires
//! the envelopes to the actual extension messaging surfaces.
//!
//! # Trust gradient
//!
//! - **Page**: runs the provider stub exposed to the dApp. Fully untrusted;
//!   everything it sends is re-validated downstream.
//! - **Relay**: enforces origin policy and stamps the calling origin from
//!   its own document location, never from the page payload.
//! - **Authority**: holds secrets and executes validated actions.
//!
//! # Correlation
//!
//! Every page request carries a fresh request id and a client-side
//! deadline. A response without a matching pending entry — late after the
//! client gave up, or spoofed — is discarded; the authority's side effects
//! are deliberately not undone.

#![no_std]
extern crate alloc;

pub mod provider;
pub mod relay;


pub use provider::{PageOutcome, PageProvider, RelayToPage, Settled, DEFAULT_REQUEST_TIMEOUT_MS};
pub use relay::{Relay, RelayConfig};
