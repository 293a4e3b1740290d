//! End-to-end scenarios across all three hops: page provider → relay →
//! authority, with real crypto and shared in-memory stores.

use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use halo_bridge::{PageOutcome, PageProvider, Relay, RelayConfig, RelayToPage, Settled};
use halo_codec::{hash_invocation_with_domain, hash_message_with_domain, origin_hash, payload_hash, Value};
use halo_proto::payload::events;
use halo_proto::{
    Capability, CapabilityState, Invocation, InvocationBody, InvocationDraft, InvocationHeader,
    RequestPayload, WalletError,
};
use halo_vault::{AutoLockConfig, KdfConfig, MemoryStore, SessionManager};

use crate::approval::{AutoApprove, DenyAll};
use crate::service::{AuthorityConfig, AuthorityService};
use crate::signer::{decode_hex, Ed25519Verifier, SignatureVerifier};
use crate::validate::validate_capability;

const ORIGIN: &str = "https://dapp.example";
const PASSWORD: &str = "a sufficiently long password";
const T0: u64 = 1_700_000_000_000;
const HOUR: u64 = 60 * 60 * 1_000;

type Service = AuthorityService<MemoryStore, MemoryStore, AutoApprove>;

fn fast_kdf() -> KdfConfig {
    KdfConfig {
        time_cost: 1,
        memory_cost: 8,
        parallelism: 1,
    }
}

fn unlocked_vault(
    durable: &MemoryStore,
    ephemeral: &MemoryStore,
) -> SessionManager<MemoryStore, MemoryStore> {
    let mut vault = SessionManager::new(
        durable.clone(),
        ephemeral.clone(),
        AutoLockConfig::default(),
        fast_kdf(),
    );
    vault.create_password(PASSWORD, T0).unwrap();
    vault.create_wallet(T0).unwrap();
    vault
}

fn service() -> (Service, MemoryStore, MemoryStore) {
    let durable = MemoryStore::new();
    let ephemeral = MemoryStore::new();
    let vault = unlocked_vault(&durable, &ephemeral);
    let service =
        AuthorityService::new(vault, durable.clone(), AutoApprove, AuthorityConfig::default())
            .unwrap();
    (service, durable, ephemeral)
}

/// Drive one request through all three hops and return the settled result.
fn roundtrip(
    provider: &mut PageProvider,
    relay: &Relay,
    service: &mut Service,
    payload: RequestPayload,
    now: u64,
) -> Settled {
    let envelope = provider.request(payload, now).unwrap();
    let authority_envelope = relay
        .accept_page(&envelope, Some(relay.origin()), true)
        .unwrap();
    let mut responses = service.handle_envelope(&authority_envelope, now);
    assert_eq!(responses.len(), 1);
    let relayed = relay.accept_authority(responses.remove(0));
    match provider.accept(RelayToPage::Response(relayed), now) {
        Some(PageOutcome::Settled(settled)) => settled,
        other => panic!("expected settled request, got {:?}", other),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &Value) -> T {
    serde_json::from_value(serde_json::to_value(value).unwrap()).unwrap()
}

fn issue(
    provider: &mut PageProvider,
    relay: &Relay,
    service: &mut Service,
    now: u64,
) -> Capability {
    let settled = roundtrip(
        provider,
        relay,
        service,
        RequestPayload::CapabilityRequest {
            methods: vec!["transfer".to_string(), "balance".to_string()],
            scope: "account".to_string(),
            ttl_ms: HOUR,
        },
        now,
    );
    decode(&settled.result.unwrap())
}

fn draft(cap: &Capability, origin: &str, method: &str, nonce: u64, now: u64) -> InvocationDraft {
    let payload = Value::Bytes(vec![1, 2, 3]);
    InvocationDraft {
        header: InvocationHeader {
            branch_id: cap.branch_id.clone(),
            circle_id: cap.circle.clone(),
            epoch: cap.epoch,
            nonce,
            origin_hash: origin_hash(origin),
            timestamp: now,
            version: cap.version,
        },
        body: InvocationBody {
            capability_id: cap.id.clone(),
            method: method.to_string(),
            payload_hash: payload_hash(&payload).unwrap(),
        },
    }
}

fn invoke(
    provider: &mut PageProvider,
    relay: &Relay,
    service: &mut Service,
    cap: &Capability,
    nonce: u64,
    now: u64,
) -> Result<Value, WalletError> {
    roundtrip(
        provider,
        relay,
        service,
        RequestPayload::CapabilityInvoke {
            draft: draft(cap, relay.origin(), "transfer", nonce, now),
        },
        now,
    )
    .result
}

#[test]
fn test_capability_lifecycle_across_three_hops() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();

    let cap = issue(&mut provider, &relay, &mut service, T0);
    assert_eq!(cap.app_origin, ORIGIN);
    assert_eq!(cap.state, CapabilityState::Active);
    assert_eq!(cap.last_nonce, 0);
    // Methods come back lexicographically sorted.
    assert_eq!(cap.methods, vec!["balance".to_string(), "transfer".to_string()]);
    // The issued capability verifies against its own signature.
    assert_eq!(
        validate_capability(&Ed25519Verifier, &cap, ORIGIN, "transfer", T0),
        Ok(())
    );

    // A first use returns a wallet-signed invocation.
    let result = invoke(&mut provider, &relay, &mut service, &cap, 1, T0 + 1).unwrap();
    let invocation: Invocation = decode(&result);
    assert_eq!(invocation.header.nonce, 1);

    let digest = hash_invocation_with_domain(&invocation.to_value().unwrap()).unwrap();
    let public_key = decode_hex(&cap.wallet_pub_key).unwrap();
    let signature = decode_hex(&invocation.signature).unwrap();
    assert!(Ed25519Verifier.verify(&public_key, &digest, &signature));
}

#[test]
fn test_nonce_monotonicity_and_replay() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);

    assert!(invoke(&mut provider, &relay, &mut service, &cap, 5, T0).is_ok());

    // Replaying the accepted nonce fails without executing anything.
    assert_eq!(
        invoke(&mut provider, &relay, &mut service, &cap, 5, T0),
        Err(WalletError::NonceReplay)
    );
    // Going backwards fails too: the order never skips backward.
    assert_eq!(
        invoke(&mut provider, &relay, &mut service, &cap, 4, T0),
        Err(WalletError::NonceReplay)
    );
    // Strictly above the watermark is accepted, gaps allowed.
    assert!(invoke(&mut provider, &relay, &mut service, &cap, 9, T0).is_ok());
}

#[test]
fn test_origin_binding_across_relays() {
    let (mut service, _, _) = service();
    let dapp_relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &dapp_relay, &mut service, T0);

    // The same, cryptographically valid capability presented through a relay
    // on another origin fails origin binding, signature validity regardless.
    let evil_relay = Relay::new(RelayConfig::new("https://evil.example"));
    let result = invoke(&mut provider, &evil_relay, &mut service, &cap, 1, T0);
    assert_eq!(result, Err(WalletError::OriginMismatch));

    // And the legitimate origin still works afterwards.
    assert!(invoke(&mut provider, &dapp_relay, &mut service, &cap, 1, T0).is_ok());
}

#[test]
fn test_invoke_fails_closed_while_locked() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);

    service.lock(T0).unwrap();
    let pushes = service.take_pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].kind, events::SESSION_LOCKED);

    assert_eq!(
        invoke(&mut provider, &relay, &mut service, &cap, 1, T0),
        Err(WalletError::SessionUnavailable)
    );

    // Nothing advanced: after unlocking, the first nonce is still available.
    service.vault_mut().unlock(PASSWORD, T0 + 1).unwrap();
    assert!(invoke(&mut provider, &relay, &mut service, &cap, 1, T0 + 1).is_ok());
}

#[test]
fn test_revocation_is_terminal_and_pushed() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);

    let settled = roundtrip(
        &mut provider,
        &relay,
        &mut service,
        RequestPayload::CapabilityRevoke {
            capability_id: cap.id.clone(),
        },
        T0,
    );
    let revoked: Capability = decode(&settled.result.unwrap());
    assert_eq!(revoked.state, CapabilityState::Revoked);

    // The revocation reaches the page as an out-of-band event.
    let pushes = service.take_pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].kind, events::CAPABILITY_REVOKED);
    let event = relay.accept_push(pushes.into_iter().next().unwrap());
    match provider.accept(RelayToPage::Event(event), T0) {
        Some(PageOutcome::Event(event)) => {
            assert_eq!(
                event.data.get("capabilityId").and_then(Value::as_str),
                Some(cap.id.as_str())
            );
        }
        other => panic!("expected event, got {:?}", other),
    }

    // Terminal: invocation and renewal both stay rejected.
    assert_eq!(
        invoke(&mut provider, &relay, &mut service, &cap, 1, T0),
        Err(WalletError::Revoked)
    );
    let renewal = roundtrip(
        &mut provider,
        &relay,
        &mut service,
        RequestPayload::CapabilityRenew {
            capability_id: cap.id.clone(),
            extend_ms: HOUR,
        },
        T0,
    );
    assert_eq!(renewal.result, Err(WalletError::Revoked));
}

#[test]
fn test_renewal_extends_expiry_preserving_identity() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);

    // Past the original expiry the capability rejects.
    let late = cap.expires_at + 1;
    assert_eq!(
        invoke(&mut provider, &relay, &mut service, &cap, 1, late),
        Err(WalletError::Expired)
    );

    let settled = roundtrip(
        &mut provider,
        &relay,
        &mut service,
        RequestPayload::CapabilityRenew {
            capability_id: cap.id.clone(),
            extend_ms: 2 * HOUR,
        },
        late,
    );
    let renewed: Capability = decode(&settled.result.unwrap());
    assert_eq!(renewed.id, cap.id);
    assert_eq!(renewed.methods, cap.methods);
    assert!(renewed.expires_at > cap.expires_at);
    // The re-signed capability verifies at the later time.
    assert_eq!(
        validate_capability(&Ed25519Verifier, &renewed, ORIGIN, "transfer", late),
        Ok(())
    );
    assert!(invoke(&mut provider, &relay, &mut service, &renewed, 1, late).is_ok());
}

#[test]
fn test_near_simultaneous_invocations_serialize() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);

    // A rival invocation holds the signing section while two more arrive.
    assert!(service.mutex.acquire(&cap.id));

    let mut parked = Vec::new();
    for nonce in [1u64, 2u64] {
        let envelope = provider
            .request(
                RequestPayload::CapabilityInvoke {
                    draft: draft(&cap, ORIGIN, "transfer", nonce, T0),
                },
                T0,
            )
            .unwrap();
        let authority_envelope = relay.accept_page(&envelope, Some(ORIGIN), true).unwrap();
        // Parked, not rejected: no response yet.
        assert!(service.handle_envelope(&authority_envelope, T0).is_empty());
        parked.push(envelope.request_id);
    }

    // The holder completes; the queue drains FIFO, each entry observing the
    // previous advance.
    let mut responses = Vec::new();
    service.drain_invocations("capability/invoke", &cap.id, T0, &mut responses);
    assert_eq!(responses.len(), 2);

    let mut nonces = Vec::new();
    for (response, expected_id) in responses.iter().zip(&parked) {
        assert_eq!(&response.request_id, expected_id);
        assert!(response.success);
        let invocation: Invocation = decode(response.result.as_ref().unwrap());
        nonces.push(invocation.header.nonce);
    }
    // Distinct, strictly increasing: never a collision.
    assert_eq!(nonces, vec![1, 2]);
    assert!(!service.mutex.is_held(&cap.id));
}

#[test]
fn test_colliding_nonces_never_double_sign() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);

    // Both rapid invocations picked the same nonce; exactly one signature
    // comes back.
    assert!(service.mutex.acquire(&cap.id));
    for _ in 0..2 {
        let envelope = provider
            .request(
                RequestPayload::CapabilityInvoke {
                    draft: draft(&cap, ORIGIN, "transfer", 1, T0),
                },
                T0,
            )
            .unwrap();
        let authority_envelope = relay.accept_page(&envelope, Some(ORIGIN), true).unwrap();
        assert!(service.handle_envelope(&authority_envelope, T0).is_empty());
    }

    let mut responses = Vec::new();
    service.drain_invocations("capability/invoke", &cap.id, T0, &mut responses);
    assert_eq!(responses.len(), 2);
    assert!(responses[0].success);
    assert!(!responses[1].success);
    assert_eq!(responses[1].error, Some(WalletError::NonceReplay));
}

#[test]
fn test_sign_message_round_trip_with_byte_payload() {
    let (mut service, _, _) = service();
    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();

    let payload = Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
    let envelope = provider
        .request(
            RequestPayload::SignMessage {
                payload: payload.clone(),
            },
            T0,
        )
        .unwrap();

    // Cross the structured-message boundary for real.
    let json = serde_json::to_string(&envelope).unwrap();
    let received: halo_proto::PageEnvelope = serde_json::from_str(&json).unwrap();

    let authority_envelope = relay.accept_page(&received, Some(ORIGIN), true).unwrap();
    let mut responses = service.handle_envelope(&authority_envelope, T0);
    let settled = match provider.accept(
        RelayToPage::Response(relay.accept_authority(responses.remove(0))),
        T0,
    ) {
        Some(PageOutcome::Settled(settled)) => settled,
        other => panic!("expected settled request, got {:?}", other),
    };

    let result = settled.result.unwrap();
    let signature = decode_hex(result.get("signature").and_then(Value::as_str).unwrap()).unwrap();
    let public_key =
        decode_hex(result.get("publicKey").and_then(Value::as_str).unwrap()).unwrap();

    // The page can verify against the SAME canonical bytes it hashed
    // locally; renormalization preserved the byte payload end to end.
    let digest = hash_message_with_domain(&payload).unwrap();
    assert!(Ed25519Verifier.verify(&public_key, &digest, &signature));
}

#[test]
fn test_approval_denied_issues_nothing() {
    let durable = MemoryStore::new();
    let ephemeral = MemoryStore::new();
    let vault = unlocked_vault(&durable, &ephemeral);
    let mut service =
        AuthorityService::new(vault, durable.clone(), DenyAll, AuthorityConfig::default())
            .unwrap();

    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let envelope = provider
        .request(
            RequestPayload::CapabilityRequest {
                methods: vec!["transfer".to_string()],
                scope: "account".to_string(),
                ttl_ms: HOUR,
            },
            T0,
        )
        .unwrap();
    let authority_envelope = relay.accept_page(&envelope, Some(ORIGIN), true).unwrap();
    let responses = service.handle_envelope(&authority_envelope, T0);
    assert_eq!(responses[0].error, Some(WalletError::ApprovalDenied));
    assert!(!has_stored_capabilities(&durable));
}

fn has_stored_capabilities(durable: &MemoryStore) -> bool {
    use halo_vault::DurableStore;
    durable
        .get(halo_proto::storage::durable::CAPABILITIES)
        .unwrap()
        .map(|bytes| {
            let caps: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
            !caps.is_empty()
        })
        .unwrap_or(false)
}

#[test]
fn test_nonce_watermark_survives_process_restart() {
    let durable = MemoryStore::new();
    let ephemeral = MemoryStore::new();
    let vault = unlocked_vault(&durable, &ephemeral);
    let mut service =
        AuthorityService::new(vault, durable.clone(), AutoApprove, AuthorityConfig::default())
            .unwrap();

    let relay = Relay::new(RelayConfig::new(ORIGIN));
    let mut provider = PageProvider::new();
    let cap = issue(&mut provider, &relay, &mut service, T0);
    assert!(invoke(&mut provider, &relay, &mut service, &cap, 3, T0).is_ok());
    drop(service);

    // The host evicted the authority; a fresh process re-derives everything
    // from storage.
    let mut vault = SessionManager::new(
        durable.clone(),
        ephemeral.clone(),
        AutoLockConfig::default(),
        fast_kdf(),
    );
    vault.init(T0 + 1).unwrap();
    assert!(vault.is_unlocked());
    let mut restarted =
        AuthorityService::new(vault, durable.clone(), AutoApprove, AuthorityConfig::default())
            .unwrap();

    assert_eq!(
        invoke(&mut provider, &relay, &mut restarted, &cap, 3, T0 + 1),
        Err(WalletError::NonceReplay)
    );
    assert!(invoke(&mut provider, &relay, &mut restarted, &cap, 4, T0 + 1).is_ok());
}

#[test]
fn test_auto_lock_tick_notifies_pages() {
    let (mut service, _, _) = service();
    service.tick(T0 + 16 * 60 * 1_000).unwrap();

    let pushes = service.take_pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].kind, events::SESSION_LOCKED);
    assert!(!service.vault().is_unlocked());
}

#[test]
fn test_unknown_payload_rejected_at_the_boundary() {
    let (mut service, _, _) = service();

    let mut data = alloc::collections::BTreeMap::new();
    data.insert(
        "appOrigin".to_string(),
        Value::String(ORIGIN.to_string()),
    );
    let envelope = halo_proto::AuthorityEnvelope {
        source: halo_proto::SOURCE_RELAY.to_string(),
        kind: "wallet/exportSecrets".to_string(),
        request_id: "req-1".to_string(),
        data: Value::Map(data),
    };
    let responses = service.handle_envelope(&envelope, T0);
    assert_eq!(
        responses[0].error,
        Some(WalletError::UnknownPayload("wallet/exportSecrets".to_string()))
    );
}
