//! Halo Session & Key Manager
//!
//! The vault owns every secret in the system: the password-derived key, the
//! per-session encryption key, and the decrypted wallet set. It is the most
//! stateful piece of the core and the only one allowed to touch private key
//! material.
//!
//! # Safety Invariants
//!
//! ## Success Conditions
//! - A wallet's private key exists in exactly three forms: encrypted under
//!   the password-derived key in durable storage, encrypted under the
//!   session key in ephemeral storage, and decrypted in the memory of an
//!   unlocked [`SessionManager`]
//! - The session key is generated fresh on every unlock and is never
//!   written durably
//!
//! ## Acceptable Partial Failure
//! - A single corrupted wallet record is skipped and logged during bulk
//!   decryption; the remaining records still load
//! - Ephemeral/durable inconsistency self-heals by resync, never surfaces
//!
//! ## Forbidden States
//! - A plaintext private key or mnemonic in either store
//! - Key material surviving in memory after `lock`
//! - A write of wallet material while no session password is available
//!
//! # Design
//!
//! The manager is constructed once per process with injected durable and
//! ephemeral storage ports and an explicit init/teardown lifecycle. The host
//! process may be evicted between messages, so every fact needed across
//! invocations (locked flag, auto-lock timer start, wallet set, active
//! pointer) lives in storage, and independent instances converge by watching
//! storage-change notifications.

#![no_std]
extern crate alloc;

pub mod crypto;
pub mod memory;
pub mod session;
pub mod store;
pub mod wallet;


pub use crypto::{DerivedKey, EncryptedBlob, KdfConfig};
pub use memory::MemoryStore;
pub use session::{AutoLockConfig, SessionManager};
pub use store::{DurableStore, EphemeralStore};
pub use wallet::{EncryptedWalletRecord, Wallet, WalletKind};
