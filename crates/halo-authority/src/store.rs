//! Capability storage.
//!
//! Capabilities are keyed by `(app_origin, id)` and mirrored to durable
//! storage on every mutation: the host process may be evicted between
//! messages, and revocation or a nonce advance must never be forgotten.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use halo_proto::storage::durable;
use halo_proto::{Capability, WalletError};
use halo_vault::DurableStore;

/// In-memory capability map with a durable mirror.
pub struct CapabilityStore<D: DurableStore> {
    store: D,
    caps: BTreeMap<(String, String), Capability>,
}

impl<D: DurableStore> CapabilityStore<D> {
    pub fn new(store: D) -> Self {
        Self {
            store,
            caps: BTreeMap::new(),
        }
    }

    /// Reload the map from durable storage. Called at construction and after
    /// a storage-change notification for the capability key.
    pub fn load(&mut self) -> Result<(), WalletError> {
        self.caps.clear();
        let bytes = match self.store.get(durable::CAPABILITIES)? {
            Some(bytes) => bytes,
            None => return Ok(()),
        };
        let caps: Vec<Capability> = serde_json::from_slice(&bytes)
            .map_err(|_| WalletError::Storage("malformed capability records".to_string()))?;
        for cap in caps {
            self.caps
                .insert((cap.app_origin.clone(), cap.id.clone()), cap);
        }
        Ok(())
    }

    pub fn insert(&mut self, cap: Capability) -> Result<(), WalletError> {
        self.caps
            .insert((cap.app_origin.clone(), cap.id.clone()), cap);
        self.persist()
    }

    pub fn get(&self, app_origin: &str, id: &str) -> Option<&Capability> {
        self.caps
            .get(&(app_origin.to_string(), id.to_string()))
    }

    /// Find a capability by id alone, regardless of origin. Used to report
    /// `OriginMismatch` (rather than not-found) when a foreign origin
    /// replays a known capability id.
    pub fn find_by_id(&self, id: &str) -> Option<&Capability> {
        self.caps.values().find(|cap| cap.id == id)
    }

    /// Apply a mutation and persist. Returns the updated capability.
    pub fn update<F>(
        &mut self,
        app_origin: &str,
        id: &str,
        mutate: F,
    ) -> Result<Capability, WalletError>
    where
        F: FnOnce(&mut Capability),
    {
        let key = (app_origin.to_string(), id.to_string());
        let cap = self
            .caps
            .get_mut(&key)
            .ok_or(WalletError::CapabilityNotFound)?;
        mutate(cap);
        let updated = cap.clone();
        self.persist()?;
        Ok(updated)
    }

    fn persist(&mut self) -> Result<(), WalletError> {
        let caps: Vec<&Capability> = self.caps.values().collect();
        let bytes = serde_json::to_vec(&caps)
            .map_err(|e| WalletError::Internal(format!("serialization failed: {}", e)))?;
        self.store.set(durable::CAPABILITIES, &bytes)
    }
}
