//! In-memory store implementation.
//!
//! Used as the test double throughout the workspace and as a starting point
//! for host adapters. Clones share the same underlying map, which is how
//! tests model several extension instances observing one browser store.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use halo_proto::WalletError;

use crate::store::{DurableStore, EphemeralStore};

/// Shared in-memory key-value store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the full contents, for byte-level assertions in tests.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries.borrow().clone()
    }

    /// All keys currently present.
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WalletError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), WalletError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), WalletError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

impl EphemeralStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WalletError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), WalletError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), WalletError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
