//! Storage key constants.
//!
//! Every key read or written by any context is defined here. The durable
//! store is shared by all instances and survives browser restarts; the
//! ephemeral store is shared within one browser session only.

/// Keys in the durable store.
pub mod durable {
    /// SHA-256 of the password-derived key (verification value)
    pub const PASSWORD_HASH: &str = "halo.passwordHash";
    /// Salt for the password KDF
    pub const PASSWORD_SALT: &str = "halo.passwordSalt";
    /// JSON array of encrypted wallet records
    pub const WALLETS: &str = "halo.wallets";
    /// Locked flag (`1` / `0`)
    pub const LOCKED: &str = "halo.locked";
    /// Address of the selected wallet; survives the lock boundary
    pub const ACTIVE_WALLET: &str = "halo.activeWallet";
    /// Storage schema migration version
    pub const MIGRATION_VERSION: &str = "halo.migrationVersion";
    /// Auto-lock timer start (decimal milliseconds since Unix epoch).
    /// Persisted so a suspended instance can detect expiry on resume.
    pub const LOCK_TIMER_START: &str = "halo.lockTimerStart";
    /// JSON array of issued capabilities
    pub const CAPABILITIES: &str = "halo.capabilities";
}

/// Keys in the ephemeral (browser-session) store.
pub mod ephemeral {
    /// Base64-encoded session password (cross-instance recovery)
    pub const SESSION_PASSWORD: &str = "halo.session.password";
    /// Raw session encryption key; never written durably
    pub const SESSION_KEY: &str = "halo.session.key";
    /// Wallet set encrypted under the session key
    pub const SESSION_WALLETS: &str = "halo.session.wallets";
}
