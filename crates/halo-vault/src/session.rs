//! Session lifecycle and key custody.
//!
//! One [`SessionManager`] per execution process, constructed with injected
//! storage ports. The state machine is `Locked ⇄ Unlocked`, with `Unlocked`
//! auto-transitioning to `Locked` on inactivity timeout, explicit lock, or
//! process restart.
//!
//! Two encryption layers protect wallet material:
//!
//! 1. Durable records are encrypted under the password-derived key.
//! 2. The ephemeral cross-instance cache is encrypted under a fresh random
//!    session key generated at unlock and never written durably.
//!
//! The auto-lock timer persists its *start timestamp* rather than relying on
//! a live timer handle: the host process may be suspended and restarted at
//! any point, so every instance must be able to detect expiry from storage
//! alone.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use zeroize::Zeroizing;

use halo_proto::storage::{durable, ephemeral};
use halo_proto::WalletError;

use crate::crypto::{self, DerivedKey, EncryptedBlob, KdfConfig};
use crate::store::{get_string, DurableStore, EphemeralStore};
use crate::wallet::{EncryptedWalletRecord, Wallet, WalletKind};

/// Current storage schema version, written after a successful self-heal.
pub const MIGRATION_VERSION: u32 = 1;

/// Auto-lock configuration.
#[derive(Clone, Debug)]
pub struct AutoLockConfig {
    /// Inactivity window in milliseconds
    pub timeout_ms: u64,
}

impl Default for AutoLockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15 * 60 * 1_000,
        }
    }
}

/// Secrets of an unlocked session. Dropped (and zeroed) on lock.
struct SessionSecrets {
    password: Zeroizing<String>,
    session_key: DerivedKey,
}

/// Session and key manager.
pub struct SessionManager<D: DurableStore, E: EphemeralStore> {
    durable: D,
    ephemeral: E,
    auto_lock: AutoLockConfig,
    kdf: KdfConfig,
    secrets: Option<SessionSecrets>,
    wallets: Vec<Wallet>,
    active_wallet: Option<String>,
}

impl<D: DurableStore, E: EphemeralStore> SessionManager<D, E> {
    pub fn new(durable: D, ephemeral: E, auto_lock: AutoLockConfig, kdf: KdfConfig) -> Self {
        Self {
            durable,
            ephemeral,
            auto_lock,
            kdf,
            secrets: None,
            wallets: Vec::new(),
            active_wallet: None,
        }
    }

    /// Resynchronize from storage at process start: reload the active-wallet
    /// pointer, pick up an existing browser-session unlock from the
    /// ephemeral cache, and apply any auto-lock that expired while this
    /// process did not exist.
    pub fn init(&mut self, now: u64) -> Result<(), WalletError> {
        self.active_wallet = get_string(&self.durable, durable::ACTIVE_WALLET)?;
        if self.restore_from_ephemeral()? {
            log::debug!("session restored from ephemeral cache");
        }
        self.check_auto_lock(now)?;
        Ok(())
    }

    /// Drop in-memory secrets without touching storage. The process is going
    /// away; other instances keep their view.
    pub fn teardown(&mut self) {
        self.discard_local_session();
    }

    pub fn is_unlocked(&self) -> bool {
        self.secrets.is_some()
    }

    /// Whether a password has ever been set up.
    pub fn has_password(&self) -> Result<bool, WalletError> {
        Ok(self.durable.get(durable::PASSWORD_HASH)?.is_some())
    }

    /// Decrypted wallet set; empty while locked.
    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn active_wallet(&self) -> Option<&str> {
        self.active_wallet.as_deref()
    }

    pub fn set_active_wallet(&mut self, address: &str) -> Result<(), WalletError> {
        self.durable
            .set(durable::ACTIVE_WALLET, address.as_bytes())?;
        self.active_wallet = Some(address.to_string());
        Ok(())
    }

    // =========================================================================
    // Password setup and unlock
    // =========================================================================

    /// First-run setup: store the password verification material and open a
    /// session with an empty wallet set.
    pub fn create_password(&mut self, password: &str, now: u64) -> Result<(), WalletError> {
        if self.has_password()? {
            return Err(WalletError::Storage(
                "password already initialized".to_string(),
            ));
        }
        let salt = crypto::generate_salt()?;
        let key = crypto::derive_key(password, &salt, &self.kdf)?;
        self.durable.set(durable::PASSWORD_SALT, &salt)?;
        self.durable
            .set(durable::PASSWORD_HASH, &crypto::verification_hash(&key))?;
        self.durable.set(
            durable::MIGRATION_VERSION,
            format!("{}", MIGRATION_VERSION).as_bytes(),
        )?;
        self.establish_session(password, Vec::new(), now)
    }

    /// Verify the password, decrypt the durable wallet set, and open a
    /// session.
    ///
    /// A single corrupted record is skipped and logged; it does not abort
    /// decryption of the remaining records. Legacy plaintext records found
    /// during the scan are re-encrypted in place (idempotent self-heal).
    pub fn unlock(&mut self, password: &str, now: u64) -> Result<(), WalletError> {
        let salt = self.require_salt()?;
        let key = crypto::derive_key(password, &salt, &self.kdf)?;

        let stored_hash = self
            .durable
            .get(durable::PASSWORD_HASH)?
            .ok_or_else(|| WalletError::Storage("password not initialized".to_string()))?;
        if stored_hash != crypto::verification_hash(&key) {
            return Err(WalletError::DecryptionFailure);
        }

        let wallets = self.decrypt_and_heal(&key, now)?;
        self.establish_session(password, wallets, now)
    }

    /// Clear session material, clear the ephemeral cache, set the durable
    /// locked flag. The active-wallet pointer is explicitly preserved so it
    /// survives into the next unlock.
    pub fn lock(&mut self, _now: u64) -> Result<(), WalletError> {
        self.discard_local_session();
        self.ephemeral.remove(ephemeral::SESSION_PASSWORD)?;
        self.ephemeral.remove(ephemeral::SESSION_KEY)?;
        self.ephemeral.remove(ephemeral::SESSION_WALLETS)?;
        self.durable.set(durable::LOCKED, b"1")?;
        log::info!("session locked");
        Ok(())
    }

    // =========================================================================
    // Auto-lock
    // =========================================================================

    /// Apply the inactivity timeout. Works from storage alone, so a freshly
    /// started instance detects an expiry that happened while it was
    /// suspended. Returns whether a lock transition was performed.
    pub fn check_auto_lock(&mut self, now: u64) -> Result<bool, WalletError> {
        let start = match get_string(&self.durable, durable::LOCK_TIMER_START)? {
            Some(text) => match text.parse::<u64>() {
                Ok(start) => start,
                Err(_) => return Ok(false),
            },
            None => return Ok(false),
        };
        if now < start.saturating_add(self.auto_lock.timeout_ms) {
            return Ok(false);
        }
        if self.locked_flag()? && self.secrets.is_none() {
            return Ok(false);
        }
        log::info!("auto-lock timeout reached");
        self.lock(now)?;
        Ok(true)
    }

    /// Record user activity: restart the persisted inactivity window.
    pub fn touch(&mut self, now: u64) -> Result<(), WalletError> {
        if self.secrets.is_some() {
            self.durable
                .set(durable::LOCK_TIMER_START, format!("{}", now).as_bytes())?;
        }
        Ok(())
    }

    // =========================================================================
    // Wallet custody
    // =========================================================================

    /// Generate a fresh wallet and store it encrypted. Returns the wallet so
    /// the trusted UI can show the address (and backup material) once.
    pub fn create_wallet(&mut self, now: u64) -> Result<Wallet, WalletError> {
        let wallet = Wallet::generate()?;
        self.add_wallet(wallet.clone(), now)?;
        Ok(wallet)
    }

    /// Import a wallet from a 32-byte seed.
    pub fn import_wallet(
        &mut self,
        seed: [u8; 32],
        mnemonic: Option<String>,
        now: u64,
    ) -> Result<Wallet, WalletError> {
        let wallet = Wallet::from_seed(seed, mnemonic, WalletKind::Imported);
        self.add_wallet(wallet.clone(), now)?;
        Ok(wallet)
    }

    /// Append an encrypted wallet record.
    ///
    /// Requires an available session password; if none is in memory the
    /// ephemeral cache is consulted. With neither available this fails
    /// closed with `SessionUnavailable` — it never falls back to writing an
    /// unencrypted record, and durable storage is untouched on failure.
    pub fn add_wallet(&mut self, wallet: Wallet, now: u64) -> Result<(), WalletError> {
        self.ensure_session()?;
        let password = match &self.secrets {
            Some(secrets) => secrets.password.clone(),
            None => return Err(WalletError::SessionUnavailable),
        };
        let salt = self.require_salt()?;
        let key = crypto::derive_key(&password, &salt, &self.kdf)?;

        let record = EncryptedWalletRecord::seal(&wallet, &key, now)?;
        let mut records = self.load_raw_records()?;
        records.push(
            serde_json::to_value(&record)
                .map_err(|e| WalletError::Internal(format!("serialization failed: {}", e)))?,
        );
        self.store_raw_records(&records)?;

        self.wallets.push(wallet);
        self.update_ephemeral_cache()?;
        if self.active_wallet.is_none() {
            let address = self.wallets[self.wallets.len() - 1].address.clone();
            self.set_active_wallet(&address)?;
        }
        self.touch(now)
    }

    /// Hand out a decrypted signing key. Fails closed while locked.
    pub fn signing_key(&self, address: Option<&str>) -> Result<[u8; 32], WalletError> {
        if self.secrets.is_none() {
            return Err(WalletError::SessionUnavailable);
        }
        let address = address
            .or(self.active_wallet.as_deref())
            .ok_or(WalletError::WalletNotFound)?;
        self.wallets
            .iter()
            .find(|w| w.address == address)
            .map(|w| w.private_key)
            .ok_or(WalletError::WalletNotFound)
    }

    /// Hex public key of a wallet. Fails closed while locked.
    pub fn public_key(&self, address: Option<&str>) -> Result<String, WalletError> {
        if self.secrets.is_none() {
            return Err(WalletError::SessionUnavailable);
        }
        let address = address
            .or(self.active_wallet.as_deref())
            .ok_or(WalletError::WalletNotFound)?;
        self.wallets
            .iter()
            .find(|w| w.address == address)
            .map(|w| w.public_key.clone())
            .ok_or(WalletError::WalletNotFound)
    }

    // =========================================================================
    // Multi-instance synchronization
    // =========================================================================

    /// React to a storage-change notification from the host. Eventual
    /// consistency: each instance resynchronizes its local view,
    /// last-write-wins, nothing is surfaced to the user.
    pub fn on_storage_change(&mut self, key: &str, _now: u64) -> Result<(), WalletError> {
        match key {
            durable::LOCKED => {
                if self.locked_flag()? {
                    if self.secrets.is_some() {
                        log::debug!("another instance locked; dropping local session");
                        self.discard_local_session();
                    }
                } else if self.secrets.is_none() && self.restore_from_ephemeral()? {
                    log::debug!("another instance unlocked; session restored");
                }
            }
            durable::ACTIVE_WALLET => {
                self.active_wallet = get_string(&self.durable, durable::ACTIVE_WALLET)?;
            }
            durable::WALLETS | ephemeral::SESSION_WALLETS => {
                if self.secrets.is_some() {
                    self.resync_wallets_from_cache();
                }
            }
            ephemeral::SESSION_KEY | ephemeral::SESSION_PASSWORD => {
                if self.secrets.is_none() && self.restore_from_ephemeral()? {
                    log::debug!("session restored after ephemeral update");
                }
            }
            _ => {}
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn establish_session(
        &mut self,
        password: &str,
        wallets: Vec<Wallet>,
        now: u64,
    ) -> Result<(), WalletError> {
        let session_key = DerivedKey::generate()?;
        self.ephemeral.set(
            ephemeral::SESSION_PASSWORD,
            &crypto::encode_session_password(password),
        )?;
        self.ephemeral
            .set(ephemeral::SESSION_KEY, &session_key.to_bytes())?;

        self.secrets = Some(SessionSecrets {
            password: Zeroizing::new(password.to_string()),
            session_key,
        });
        self.wallets = wallets;
        self.update_ephemeral_cache()?;

        self.durable.set(durable::LOCKED, b"0")?;
        self.durable
            .set(durable::LOCK_TIMER_START, format!("{}", now).as_bytes())?;

        self.active_wallet = get_string(&self.durable, durable::ACTIVE_WALLET)?;
        log::info!("session unlocked ({} wallets)", self.wallets.len());
        Ok(())
    }

    /// Decrypt every durable record, healing legacy plaintext entries in
    /// place. Safe to run on every unlock.
    fn decrypt_and_heal(
        &mut self,
        key: &DerivedKey,
        now: u64,
    ) -> Result<Vec<Wallet>, WalletError> {
        let raw = self.load_raw_records()?;
        let mut wallets = Vec::new();
        let mut rewritten = Vec::with_capacity(raw.len());
        let mut healed = 0usize;

        for entry in raw {
            if let Ok(record) = serde_json::from_value::<EncryptedWalletRecord>(entry.clone()) {
                match record.open(key) {
                    Ok(wallet) => wallets.push(wallet),
                    Err(_) => {
                        // Partial-failure isolation: availability over
                        // completeness.
                        log::warn!("skipping corrupted wallet record {}", record.address);
                    }
                }
                rewritten.push(entry);
            } else if let Ok(legacy) = serde_json::from_value::<Wallet>(entry.clone()) {
                match EncryptedWalletRecord::seal(&legacy, key, now) {
                    Ok(record) => {
                        log::warn!("re-encrypting legacy plaintext record {}", legacy.address);
                        rewritten.push(serde_json::to_value(&record).map_err(|e| {
                            WalletError::Internal(format!("serialization failed: {}", e))
                        })?);
                        wallets.push(legacy);
                        healed += 1;
                    }
                    Err(e) => {
                        log::warn!("migration failure for {}: {:?}", legacy.address, e);
                        rewritten.push(entry);
                    }
                }
            } else {
                log::warn!("skipping unrecognized wallet record");
                rewritten.push(entry);
            }
        }

        if healed > 0 {
            self.store_raw_records(&rewritten)?;
            self.durable.set(
                durable::MIGRATION_VERSION,
                format!("{}", MIGRATION_VERSION).as_bytes(),
            )?;
            log::info!("healed {} legacy wallet records", healed);
        }
        Ok(wallets)
    }

    fn ensure_session(&mut self) -> Result<(), WalletError> {
        if self.secrets.is_some() {
            return Ok(());
        }
        if self.restore_from_ephemeral()? {
            return Ok(());
        }
        Err(WalletError::SessionUnavailable)
    }

    /// Rebuild the in-memory session from the ephemeral cache, if a live
    /// browser-session unlock exists. Inconsistent cache contents self-heal
    /// by clearing the cache; nothing is surfaced.
    fn restore_from_ephemeral(&mut self) -> Result<bool, WalletError> {
        if self.locked_flag()? {
            return Ok(false);
        }
        let encoded = match self.ephemeral.get(ephemeral::SESSION_PASSWORD)? {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        let key_bytes = match self.ephemeral.get(ephemeral::SESSION_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        let blob_bytes = match self.ephemeral.get(ephemeral::SESSION_WALLETS)? {
            Some(bytes) => bytes,
            None => return Ok(false),
        };

        let password = match crypto::decode_session_password(&encoded) {
            Ok(password) => password,
            Err(_) => return self.clear_inconsistent_cache(),
        };
        let key_bytes: [u8; 32] = match key_bytes.as_slice().try_into() {
            Ok(bytes) => bytes,
            Err(_) => return self.clear_inconsistent_cache(),
        };
        let session_key = DerivedKey::from_bytes(key_bytes);
        let blob: EncryptedBlob = match serde_json::from_slice(&blob_bytes) {
            Ok(blob) => blob,
            Err(_) => return self.clear_inconsistent_cache(),
        };
        let wallets: Vec<Wallet> = match crypto::decrypt_blob(&session_key, &blob)
            .and_then(|bytes| {
                serde_json::from_slice(&bytes).map_err(|_| WalletError::DecryptionFailure)
            }) {
            Ok(wallets) => wallets,
            Err(_) => return self.clear_inconsistent_cache(),
        };

        self.secrets = Some(SessionSecrets {
            password: Zeroizing::new(password),
            session_key,
        });
        self.wallets = wallets;
        self.active_wallet = get_string(&self.durable, durable::ACTIVE_WALLET)?;
        Ok(true)
    }

    fn clear_inconsistent_cache(&mut self) -> Result<bool, WalletError> {
        log::warn!("ephemeral session cache inconsistent; clearing");
        self.ephemeral.remove(ephemeral::SESSION_PASSWORD)?;
        self.ephemeral.remove(ephemeral::SESSION_KEY)?;
        self.ephemeral.remove(ephemeral::SESSION_WALLETS)?;
        Ok(false)
    }

    /// Re-encrypt the decrypted wallet set under the session key into the
    /// ephemeral cache.
    fn update_ephemeral_cache(&mut self) -> Result<(), WalletError> {
        let secrets = match &self.secrets {
            Some(secrets) => secrets,
            None => return Ok(()),
        };
        let plaintext = serde_json::to_vec(&self.wallets)
            .map_err(|e| WalletError::Internal(format!("serialization failed: {}", e)))?;
        let blob = crypto::encrypt_blob(&secrets.session_key, &plaintext)?;
        let blob_bytes = serde_json::to_vec(&blob)
            .map_err(|e| WalletError::Internal(format!("serialization failed: {}", e)))?;
        self.ephemeral
            .set(ephemeral::SESSION_WALLETS, &blob_bytes)?;
        Ok(())
    }

    fn resync_wallets_from_cache(&mut self) {
        let secrets = match &self.secrets {
            Some(secrets) => secrets,
            None => return,
        };
        let blob_bytes = match self.ephemeral.get(ephemeral::SESSION_WALLETS) {
            Ok(Some(bytes)) => bytes,
            _ => return,
        };
        let blob: EncryptedBlob = match serde_json::from_slice(&blob_bytes) {
            Ok(blob) => blob,
            Err(_) => return,
        };
        match crypto::decrypt_blob(&secrets.session_key, &blob).and_then(|bytes| {
            serde_json::from_slice::<Vec<Wallet>>(&bytes)
                .map_err(|_| WalletError::DecryptionFailure)
        }) {
            Ok(wallets) => {
                log::debug!("wallet set resynced ({} wallets)", wallets.len());
                self.wallets = wallets;
            }
            Err(_) => log::warn!("wallet resync failed; keeping local view"),
        }
    }

    fn discard_local_session(&mut self) {
        self.secrets = None;
        for wallet in &mut self.wallets {
            wallet.scrub();
        }
        self.wallets.clear();
    }

    fn locked_flag(&self) -> Result<bool, WalletError> {
        Ok(self
            .durable
            .get(durable::LOCKED)?
            .map(|flag| flag == b"1")
            .unwrap_or(false))
    }

    fn require_salt(&self) -> Result<[u8; 32], WalletError> {
        let salt = self
            .durable
            .get(durable::PASSWORD_SALT)?
            .ok_or_else(|| WalletError::Storage("password not initialized".to_string()))?;
        salt.as_slice()
            .try_into()
            .map_err(|_| WalletError::Storage("malformed password salt".to_string()))
    }

    fn load_raw_records(&self) -> Result<Vec<serde_json::Value>, WalletError> {
        match self.durable.get(durable::WALLETS)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|_| WalletError::Storage("malformed wallet records".to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn store_raw_records(&mut self, records: &[serde_json::Value]) -> Result<(), WalletError> {
        let bytes = serde_json::to_vec(records)
            .map_err(|e| WalletError::Internal(format!("serialization failed: {}", e)))?;
        self.durable.set(durable::WALLETS, &bytes)
    }
}
