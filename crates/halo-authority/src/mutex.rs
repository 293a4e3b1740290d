//! Per-capability signing mutex.
//!
//! The critical section "validate → advance nonce → sign" must execute as
//! one atomic step per capability: two invocations arriving
//! near-simultaneously must never both read the same `last_nonce` before
//! either commits its advance. The authority acquires the capability's slot
//! before entering the critical section; an invocation arriving while the
//! slot is held is queued FIFO and drained when the holder releases.

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::{String, ToString};

use halo_proto::InvocationDraft;

/// An invocation parked while its capability's slot was held.
#[derive(Clone, Debug)]
pub struct DeferredInvoke {
    pub request_id: String,
    pub app_origin: String,
    pub draft: InvocationDraft,
}

/// Serialization discipline for the signing critical section.
#[derive(Default)]
pub struct SigningMutex {
    in_flight: BTreeSet<String>,
    deferred: BTreeMap<String, VecDeque<DeferredInvoke>>,
}

impl SigningMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to enter the critical section for a capability. Returns `false`
    /// when another invocation currently holds it.
    pub fn acquire(&mut self, capability_id: &str) -> bool {
        self.in_flight.insert(capability_id.to_string())
    }

    /// Park an invocation behind the current holder.
    pub fn defer(&mut self, capability_id: &str, invoke: DeferredInvoke) {
        self.deferred
            .entry(capability_id.to_string())
            .or_default()
            .push_back(invoke);
    }

    /// Leave the critical section. If an invocation is parked, it is handed
    /// back and the slot stays held for it; otherwise the slot is freed.
    pub fn release(&mut self, capability_id: &str) -> Option<DeferredInvoke> {
        if let Some(queue) = self.deferred.get_mut(capability_id) {
            if let Some(next) = queue.pop_front() {
                return Some(next);
            }
            self.deferred.remove(capability_id);
        }
        self.in_flight.remove(capability_id);
        None
    }

    /// Whether the capability's slot is currently held.
    pub fn is_held(&self, capability_id: &str) -> bool {
        self.in_flight.contains(capability_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_proto::{InvocationBody, InvocationHeader};

    fn deferred(request_id: &str) -> DeferredInvoke {
        DeferredInvoke {
            request_id: request_id.to_string(),
            app_origin: "https://dapp.example".to_string(),
            draft: InvocationDraft {
                header: InvocationHeader {
                    branch_id: "main".to_string(),
                    circle_id: "halo".to_string(),
                    epoch: 1,
                    nonce: 1,
                    origin_hash: "0x00".to_string(),
                    timestamp: 0,
                    version: 1,
                },
                body: InvocationBody {
                    capability_id: "cap-1".to_string(),
                    method: "transfer".to_string(),
                    payload_hash: "0x00".to_string(),
                },
            },
        }
    }

    #[test]
    fn test_exclusive_acquire() {
        let mut mutex = SigningMutex::new();
        assert!(mutex.acquire("cap-1"));
        assert!(!mutex.acquire("cap-1"));
        // Other capabilities are unaffected: ordering is per capability.
        assert!(mutex.acquire("cap-2"));
    }

    #[test]
    fn test_release_drains_fifo() {
        let mut mutex = SigningMutex::new();
        assert!(mutex.acquire("cap-1"));
        mutex.defer("cap-1", deferred("req-a"));
        mutex.defer("cap-1", deferred("req-b"));

        // The slot stays held while deferred work remains.
        let next = mutex.release("cap-1").unwrap();
        assert_eq!(next.request_id, "req-a");
        assert!(mutex.is_held("cap-1"));

        let next = mutex.release("cap-1").unwrap();
        assert_eq!(next.request_id, "req-b");

        assert!(mutex.release("cap-1").is_none());
        assert!(!mutex.is_held("cap-1"));
        assert!(mutex.acquire("cap-1"));
    }
}
