//! Authority-side message handling.
//!
//! Every request follows the same fail-closed shape: parse at the boundary,
//! fetch key material from the vault (failing closed if locked), consult the
//! approval port where user consent is required, then do the work and
//! respond. Protocol violations return structured errors and are never
//! retried here.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use halo_codec::{
    hash_capability_with_domain, hash_invocation_with_domain, hash_message_with_domain,
    origin_hash, Value,
};
use halo_proto::payload::events;
use halo_proto::storage::durable;
use halo_proto::{
    ids, AuthorityEnvelope, AuthorityPush, AuthorityResponse, Capability, CapabilityState,
    Invocation, InvocationDraft, RequestPayload, WalletError,
};
use halo_vault::wallet::derive_address;
use halo_vault::{DurableStore, EphemeralStore, SessionManager};

use crate::approval::ApprovalPort;
use crate::mutex::{DeferredInvoke, SigningMutex};
use crate::signer::{decode_hex, encode_hex, Ed25519Signer, Ed25519Verifier, Signer};
use crate::store::CapabilityStore;
use crate::validate::validate_capability;

/// Deployment context baked into every issued capability.
#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    pub circle: String,
    pub branch_id: String,
    pub epoch: u64,
    pub capability_version: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            circle: "halo".to_string(),
            branch_id: "main".to_string(),
            epoch: 1,
            capability_version: 1,
        }
    }
}

/// The trusted authority: capability state machine, nonce authority, and
/// signing service behind the message bridge.
pub struct AuthorityService<D, E, P>
where
    D: DurableStore,
    E: EphemeralStore,
    P: ApprovalPort,
{
    vault: SessionManager<D, E>,
    caps: CapabilityStore<D>,
    approval: P,
    config: AuthorityConfig,
    pub(crate) mutex: SigningMutex,
    pushes: Vec<AuthorityPush>,
}

impl<D, E, P> AuthorityService<D, E, P>
where
    D: DurableStore,
    E: EphemeralStore,
    P: ApprovalPort,
{
    /// `capability_store` is a second handle onto the same durable storage
    /// the vault uses; capabilities must survive host-process eviction just
    /// like wallet records do.
    pub fn new(
        vault: SessionManager<D, E>,
        capability_store: D,
        approval: P,
        config: AuthorityConfig,
    ) -> Result<Self, WalletError> {
        let mut caps = CapabilityStore::new(capability_store);
        caps.load()?;
        Ok(Self {
            vault,
            caps,
            approval,
            config,
            mutex: SigningMutex::new(),
            pushes: Vec::new(),
        })
    }

    pub fn vault(&self) -> &SessionManager<D, E> {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut SessionManager<D, E> {
        &mut self.vault
    }

    /// Drain pending unsolicited pushes for the host to deliver to relays.
    pub fn take_pushes(&mut self) -> Vec<AuthorityPush> {
        core::mem::take(&mut self.pushes)
    }

    /// Lock the session and notify connected pages.
    pub fn lock(&mut self, now: u64) -> Result<(), WalletError> {
        self.vault.lock(now)?;
        self.push_event(events::SESSION_LOCKED, Value::Map(Default::default()));
        Ok(())
    }

    /// Periodic housekeeping: apply the auto-lock window and notify pages
    /// if it fired.
    pub fn tick(&mut self, now: u64) -> Result<(), WalletError> {
        if self.vault.check_auto_lock(now)? {
            self.push_event(events::SESSION_LOCKED, Value::Map(Default::default()));
        }
        Ok(())
    }

    /// React to a storage-change notification from the host.
    pub fn on_storage_change(&mut self, key: &str, now: u64) -> Result<(), WalletError> {
        if key == durable::CAPABILITIES {
            self.caps.load()?;
        }
        self.vault.on_storage_change(key, now)
    }

    /// Handle one relay envelope. Usually one response; draining the signing
    /// mutex after an invocation may settle several parked requests at once.
    pub fn handle_envelope(
        &mut self,
        envelope: &AuthorityEnvelope,
        now: u64,
    ) -> Vec<AuthorityResponse> {
        let (app_origin, payload) = match envelope.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("rejected envelope {}: {:?}", envelope.request_id, e);
                return alloc::vec![AuthorityResponse::err(
                    &envelope.kind,
                    &envelope.request_id,
                    e
                )];
            }
        };

        let mut responses = Vec::new();
        match payload {
            RequestPayload::CapabilityRequest {
                methods,
                scope,
                ttl_ms,
            } => {
                let result = self.issue(&app_origin, methods, &scope, ttl_ms, now);
                responses.push(respond(&envelope.kind, &envelope.request_id, result));
            }
            RequestPayload::CapabilityInvoke { draft } => {
                self.handle_invoke(
                    &envelope.kind,
                    &envelope.request_id,
                    &app_origin,
                    draft,
                    now,
                    &mut responses,
                );
            }
            RequestPayload::CapabilityRenew {
                capability_id,
                extend_ms,
            } => {
                let result = self.renew(&app_origin, &capability_id, extend_ms, now);
                responses.push(respond(&envelope.kind, &envelope.request_id, result));
            }
            RequestPayload::CapabilityRevoke { capability_id } => {
                let result = self.revoke(&app_origin, &capability_id);
                responses.push(respond(&envelope.kind, &envelope.request_id, result));
            }
            RequestPayload::SignMessage { payload } => {
                let result = self.sign_message(&app_origin, &payload);
                responses.push(respond(&envelope.kind, &envelope.request_id, result));
            }
        }
        responses
    }

    // =========================================================================
    // Capability state machine
    // =========================================================================

    /// Issue a capability to an origin after user approval.
    fn issue(
        &mut self,
        app_origin: &str,
        methods: Vec<String>,
        scope: &str,
        ttl_ms: u64,
        now: u64,
    ) -> Result<Value, WalletError> {
        // Key material first: fail closed before asking the user anything.
        let wallet_pub_key = self.vault.public_key(None)?;
        let seed = self.vault.signing_key(None)?;

        if !self
            .approval
            .approve_capability(app_origin, &methods, scope)
        {
            log::warn!("capability request for {} denied", app_origin);
            return Err(WalletError::ApprovalDenied);
        }

        let mut methods = methods;
        methods.sort();
        methods.dedup();

        let mut cap = Capability {
            id: ids::random_id()?,
            version: self.config.capability_version,
            circle: self.config.circle.clone(),
            methods,
            scope: scope.to_string(),
            encrypted: false,
            app_origin: app_origin.to_string(),
            branch_id: self.config.branch_id.clone(),
            epoch: self.config.epoch,
            issued_at: now,
            expires_at: now.saturating_add(ttl_ms),
            nonce_base: ids::random_nonce_base()?,
            last_nonce: 0,
            wallet_pub_key,
            signature: String::new(),
            state: CapabilityState::Active,
        };

        let digest = hash_capability_with_domain(&cap.to_value()?)?;
        cap.signature = encode_hex(&Ed25519Signer::from_seed(&seed).sign(&digest));

        self.caps.insert(cap.clone())?;
        log::info!("issued capability {} to {}", cap.id, app_origin);
        cap.to_value()
    }

    /// Extend a capability's expiry. Id and methods are preserved; only the
    /// expiry (and therefore the signature) changes.
    fn renew(
        &mut self,
        app_origin: &str,
        capability_id: &str,
        extend_ms: u64,
        now: u64,
    ) -> Result<Value, WalletError> {
        let cap = match self.caps.get(app_origin, capability_id) {
            Some(cap) => cap.clone(),
            None => return Err(self.missing_capability_error(capability_id)),
        };
        if cap.state == CapabilityState::Revoked {
            return Err(WalletError::Revoked);
        }

        let seed = self.signing_seed_for(&cap)?;
        let mut renewed = cap;
        renewed.expires_at = now.saturating_add(extend_ms);
        renewed.state = CapabilityState::Active;
        let digest = hash_capability_with_domain(&renewed.to_value()?)?;
        let signature = encode_hex(&Ed25519Signer::from_seed(&seed).sign(&digest));

        let updated = self.caps.update(app_origin, capability_id, |c| {
            c.expires_at = renewed.expires_at;
            c.state = CapabilityState::Active;
            c.signature = signature.clone();
        })?;
        log::info!("renewed capability {}", capability_id);
        updated.to_value()
    }

    /// Revoke a capability. Irreversible; connected pages for the origin are
    /// notified out-of-band.
    fn revoke(&mut self, app_origin: &str, capability_id: &str) -> Result<Value, WalletError> {
        if self.caps.get(app_origin, capability_id).is_none() {
            return Err(self.missing_capability_error(capability_id));
        }
        let updated = self.caps.update(app_origin, capability_id, |c| {
            c.state = CapabilityState::Revoked;
        })?;
        log::info!("revoked capability {} for {}", capability_id, app_origin);

        let mut data = alloc::collections::BTreeMap::new();
        data.insert(
            "appOrigin".to_string(),
            Value::String(app_origin.to_string()),
        );
        data.insert(
            "capabilityId".to_string(),
            Value::String(capability_id.to_string()),
        );
        self.push_event(events::CAPABILITY_REVOKED, Value::Map(data));

        updated.to_value()
    }

    // =========================================================================
    // Invocation (nonce authority + signing mutex)
    // =========================================================================

    fn handle_invoke(
        &mut self,
        kind: &str,
        request_id: &str,
        app_origin: &str,
        draft: InvocationDraft,
        now: u64,
        out: &mut Vec<AuthorityResponse>,
    ) {
        let capability_id = draft.body.capability_id.clone();
        if !self.mutex.acquire(&capability_id) {
            // Another invocation holds the critical section; park this one.
            self.mutex.defer(
                &capability_id,
                DeferredInvoke {
                    request_id: request_id.to_string(),
                    app_origin: app_origin.to_string(),
                    draft,
                },
            );
            return;
        }

        let result = self.invoke_critical(app_origin, &draft, now);
        out.push(respond(kind, request_id, result));
        self.drain_invocations(kind, &capability_id, now, out);
    }

    /// Release the capability's slot and run invocations that arrived while
    /// the critical section was held; each sees the advanced nonce.
    pub(crate) fn drain_invocations(
        &mut self,
        kind: &str,
        capability_id: &str,
        now: u64,
        out: &mut Vec<AuthorityResponse>,
    ) {
        while let Some(next) = self.mutex.release(capability_id) {
            let result = self.invoke_critical(&next.app_origin, &next.draft, now);
            out.push(respond(kind, &next.request_id, result));
        }
    }

    /// The critical section: validate → advance nonce → sign, executed only
    /// while holding the capability's mutex slot.
    fn invoke_critical(
        &mut self,
        app_origin: &str,
        draft: &InvocationDraft,
        now: u64,
    ) -> Result<Value, WalletError> {
        let cap = match self.caps.find_by_id(&draft.body.capability_id) {
            Some(cap) => cap.clone(),
            None => return Err(WalletError::CapabilityNotFound),
        };

        // Key material first: fail closed before any state changes.
        let seed = self.signing_seed_for(&cap)?;

        validate_capability(&Ed25519Verifier, &cap, app_origin, &draft.body.method, now)?;

        // The header binds the origin and the capability context into the
        // signed bytes.
        if draft.header.origin_hash != origin_hash(app_origin) {
            log::warn!("invocation origin hash mismatch for {}", cap.id);
            return Err(WalletError::OriginMismatch);
        }
        if draft.header.branch_id != cap.branch_id
            || draft.header.circle_id != cap.circle
            || draft.header.epoch != cap.epoch
        {
            return Err(WalletError::MalformedEnvelope(
                "invocation context mismatch".to_string(),
            ));
        }

        // Nonce authority: strict advance, no side effect on rejection.
        if draft.header.nonce <= cap.last_nonce {
            log::warn!(
                "nonce replay on capability {}: {} <= {}",
                cap.id,
                draft.header.nonce,
                cap.last_nonce
            );
            return Err(WalletError::NonceReplay);
        }
        self.caps.update(&cap.app_origin, &cap.id, |c| {
            c.last_nonce = draft.header.nonce;
        })?;

        let digest = hash_invocation_with_domain(&draft.to_value()?)?;
        let invocation = Invocation {
            header: draft.header.clone(),
            body: draft.body.clone(),
            signature: encode_hex(&Ed25519Signer::from_seed(&seed).sign(&digest)),
        };
        invocation.to_value()
    }

    // =========================================================================
    // Generic message signing
    // =========================================================================

    fn sign_message(&mut self, app_origin: &str, payload: &Value) -> Result<Value, WalletError> {
        let public_key = self.vault.public_key(None)?;
        let seed = self.vault.signing_key(None)?;

        if !self.approval.approve_message(app_origin) {
            log::warn!("message signing for {} denied", app_origin);
            return Err(WalletError::ApprovalDenied);
        }

        let digest = hash_message_with_domain(payload)?;
        let signature = encode_hex(&Ed25519Signer::from_seed(&seed).sign(&digest));

        let mut data = alloc::collections::BTreeMap::new();
        data.insert("signature".to_string(), Value::String(signature));
        data.insert("publicKey".to_string(), Value::String(public_key));
        Ok(Value::Map(data))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Signing key of the wallet backing a capability, failing closed when
    /// the vault is locked.
    fn signing_seed_for(&self, cap: &Capability) -> Result<[u8; 32], WalletError> {
        let public_key: [u8; 32] = decode_hex(&cap.wallet_pub_key)?
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::InvalidSignature)?;
        self.vault.signing_key(Some(&derive_address(&public_key)))
    }

    fn missing_capability_error(&self, capability_id: &str) -> WalletError {
        // A known id under a different origin is an origin violation, not a
        // lookup miss; the distinction matters for audit logs.
        if self.caps.find_by_id(capability_id).is_some() {
            log::warn!("foreign-origin access to capability {}", capability_id);
            WalletError::OriginMismatch
        } else {
            WalletError::CapabilityNotFound
        }
    }

    fn push_event(&mut self, kind: &str, data: Value) {
        self.pushes.push(AuthorityPush {
            kind: kind.to_string(),
            data,
        });
    }
}

fn respond(kind: &str, request_id: &str, result: Result<Value, WalletError>) -> AuthorityResponse {
    match result {
        Ok(value) => AuthorityResponse::ok(kind, request_id, value),
        Err(e) => AuthorityResponse::err(kind, request_id, e),
    }
}
