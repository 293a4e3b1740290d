//! Storage ports.
//!
//! The vault never touches a concrete browser API. The host injects one
//! implementation of each port; all instances of the extension observe the
//! same underlying stores and receive change notifications by key name.

use alloc::string::String;
use alloc::vec::Vec;

use halo_proto::WalletError;

/// Durable key-value storage. Shared by all instances, survives browser
/// restarts.
pub trait DurableStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WalletError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), WalletError>;
    fn remove(&mut self, key: &str) -> Result<(), WalletError>;
}

/// Ephemeral key-value storage. Shared within one browser session, gone on
/// browser close. The only place session-scoped secrets may be cached.
pub trait EphemeralStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WalletError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), WalletError>;
    fn remove(&mut self, key: &str) -> Result<(), WalletError>;
}

/// Read a UTF-8 string value.
pub(crate) fn get_string<S: DurableStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<String>, WalletError> {
    match store.get(key)? {
        Some(bytes) => Ok(core::str::from_utf8(&bytes).ok().map(String::from)),
        None => Ok(None),
    }
}
