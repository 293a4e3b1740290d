//! The isolated relay context.
//!
//! Sits between the untrusted page and the authority. Its two jobs:
//!
//! 1. **Origin policy**: inbound page messages are accepted only from the
//!    same window and the same document origin as the relay itself. The
//!    origin forwarded to the authority comes from the relay's OWN location,
//!    never from the page payload.
//! 2. **Payload fidelity**: byte payloads degraded by the structured-message
//!    boundary are renormalized on the way in and on the way out.

use alloc::string::ToString;

use halo_codec::renormalize;
use halo_proto::{
    AuthorityEnvelope, AuthorityPush, AuthorityResponse, PageEnvelope, PageEvent, RelayResponse,
    WalletError, SOURCE_PROVIDER, SOURCE_RELAY,
};

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// The relay's own document origin; the value bound into capability
    /// validation.
    pub origin: alloc::string::String,
    /// Accept messages whose sender origin is null (local-file contexts).
    ///
    /// A deliberate, auditable security downgrade for hosts that must serve
    /// `file://` pages. Off by default; every acceptance under the flag is
    /// logged.
    pub allow_null_origin: bool,
}

impl RelayConfig {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            allow_null_origin: false,
        }
    }
}

/// The isolated relay.
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub fn origin(&self) -> &str {
        &self.config.origin
    }

    /// Accept an inbound page message and produce the authority-bound
    /// envelope.
    ///
    /// `sender_origin` is the origin reported by the messaging surface
    /// (`None` models a null origin); `same_window` is whether the message
    /// came from the relay's own window.
    pub fn accept_page(
        &self,
        envelope: &PageEnvelope,
        sender_origin: Option<&str>,
        same_window: bool,
    ) -> Result<AuthorityEnvelope, WalletError> {
        if envelope.source != SOURCE_PROVIDER {
            return Err(WalletError::MalformedEnvelope(
                "unexpected message source".to_string(),
            ));
        }
        if !same_window {
            log::warn!("rejected cross-window message {}", envelope.request_id);
            return Err(WalletError::OriginMismatch);
        }
        match sender_origin {
            Some(origin) if origin == self.config.origin => {}
            Some(origin) => {
                log::warn!(
                    "rejected message {} from foreign origin {}",
                    envelope.request_id,
                    origin
                );
                return Err(WalletError::OriginMismatch);
            }
            None if self.config.allow_null_origin => {
                log::warn!(
                    "accepting null-origin message {} (local-file downgrade)",
                    envelope.request_id
                );
            }
            None => {
                log::warn!("rejected null-origin message {}", envelope.request_id);
                return Err(WalletError::OriginMismatch);
            }
        }

        let mut authority = AuthorityEnvelope::from_page(envelope, &self.config.origin)?;
        authority.data = renormalize(authority.data);
        Ok(authority)
    }

    /// Hand an authority response back toward the page, renormalizing any
    /// byte-bearing result.
    pub fn accept_authority(&self, response: AuthorityResponse) -> RelayResponse {
        RelayResponse {
            source: SOURCE_RELAY.to_string(),
            request_id: response.request_id,
            kind: response.kind,
            success: response.success,
            result: response.result.map(renormalize),
            error: response.error,
        }
    }

    /// Forward an unsolicited authority push to the page as an out-of-band
    /// event. Never resolves a pending request.
    pub fn accept_push(&self, push: AuthorityPush) -> PageEvent {
        PageEvent {
            source: SOURCE_RELAY.to_string(),
            kind: push.kind,
            data: renormalize(push.data),
        }
    }
}
