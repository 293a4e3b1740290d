//! User-approval port.
//!
//! Capability issuance and message signing require explicit user consent.
//! The dialog itself is a UI collaborator outside this core; the authority
//! only sees the decision through this port.

use alloc::string::String;

/// Decision seam to the trusted UI.
pub trait ApprovalPort {
    /// Approve granting `methods` under `scope` to `app_origin`.
    fn approve_capability(&self, app_origin: &str, methods: &[String], scope: &str) -> bool;

    /// Approve signing an arbitrary message for `app_origin`.
    fn approve_message(&self, app_origin: &str) -> bool;
}

/// Approves everything. Tests and development builds only.
#[derive(Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalPort for AutoApprove {
    fn approve_capability(&self, _app_origin: &str, _methods: &[String], _scope: &str) -> bool {
        true
    }

    fn approve_message(&self, _app_origin: &str) -> bool {
        true
    }
}

/// Denies everything. The safe default until the host wires a real dialog.
#[derive(Clone, Copy, Default)]
pub struct DenyAll;

impl ApprovalPort for DenyAll {
    fn approve_capability(&self, _app_origin: &str, _methods: &[String], _scope: &str) -> bool {
        false
    }

    fn approve_message(&self, _app_origin: &str) -> bool {
        false
    }
}
