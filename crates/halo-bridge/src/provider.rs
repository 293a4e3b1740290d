//! Page-context provider stub.
//!
//! Maintains the pending-request table mapping request ids to deadlines.
//! Each request is a typed channel keyed by its correlation id: responses
//! without a matching entry are discarded, and entries past their deadline
//! settle with `MessageTimeout`.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use halo_codec::Value;
use halo_proto::{ids, PageEnvelope, PageEvent, RelayResponse, RequestPayload, WalletError};

/// Default client-side timeout per pending request (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// A message arriving at the page from the relay. Responses carry a request
/// id; out-of-band events do not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayToPage {
    Response(RelayResponse),
    Event(PageEvent),
}

/// A request that finished: resolved, failed, or timed out.
#[derive(Clone, Debug, PartialEq)]
pub struct Settled {
    pub request_id: String,
    pub kind: String,
    pub result: Result<Value, WalletError>,
}

/// What the page sees from one inbound relay message.
#[derive(Clone, Debug, PartialEq)]
pub enum PageOutcome {
    /// A pending request settled.
    Settled(Settled),
    /// An out-of-band event (session invalidated, capability revoked).
    Event(PageEvent),
}

struct PendingRequest {
    kind: String,
    deadline: u64,
}

/// The provider stub exposed to the dApp.
pub struct PageProvider {
    timeout_ms: u64,
    pending: BTreeMap<String, PendingRequest>,
}

impl Default for PageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PageProvider {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT_MS)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            pending: BTreeMap::new(),
        }
    }

    /// Number of requests awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Create an outbound envelope with a fresh request id and record the
    /// pending entry.
    pub fn request(
        &mut self,
        payload: RequestPayload,
        now: u64,
    ) -> Result<PageEnvelope, WalletError> {
        let request_id = ids::random_id()?;
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                kind: payload.kind().to_string(),
                deadline: now.saturating_add(self.timeout_ms),
            },
        );
        Ok(PageEnvelope::new(request_id, payload))
    }

    /// Accept an inbound relay message.
    ///
    /// A response lacking a matching pending entry — late arrival after the
    /// client-side timeout, or spoofed — is discarded with a log line and
    /// `None`.
    pub fn accept(&mut self, message: RelayToPage, _now: u64) -> Option<PageOutcome> {
        match message {
            RelayToPage::Event(event) => Some(PageOutcome::Event(event)),
            RelayToPage::Response(response) => {
                let pending = match self.pending.remove(&response.request_id) {
                    Some(pending) => pending,
                    None => {
                        log::warn!(
                            "discarding response with no pending request: {}",
                            response.request_id
                        );
                        return None;
                    }
                };
                let result = if response.success {
                    Ok(response.result.unwrap_or(Value::Null))
                } else {
                    Err(response.error.unwrap_or_else(|| {
                        WalletError::MalformedEnvelope(
                            "failure response without error".to_string(),
                        )
                    }))
                };
                Some(PageOutcome::Settled(Settled {
                    request_id: response.request_id,
                    kind: pending.kind,
                    result,
                }))
            }
        }
    }

    /// Fail every pending request whose deadline has passed.
    pub fn expire(&mut self, now: u64) -> Vec<Settled> {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(request_id, _)| request_id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|request_id| {
                self.pending.remove(&request_id).map(|pending| {
                    log::debug!("request {} timed out", request_id);
                    Settled {
                        request_id,
                        kind: pending.kind,
                        result: Err(WalletError::MessageTimeout),
                    }
                })
            })
            .collect()
    }
}
