//! Authorization interceptor
//!
//! Attaches `Authorization: Bearer <token>` to every non-public call. The
//! token is read from the store at dispatch time, never when the call is
//! built, so a call queued behind a refresh goes out with the new token.

use std::sync::Arc;

use memberdesk_domain::constants::{AUTHORIZATION_HEADER, BEARER_PREFIX, PUBLIC_OPERATIONS};
use tracing::trace;

use super::call::OutgoingCall;
use crate::session::SessionStore;

/// How a call was authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Operation is on the public allow-list
    Public,
    /// Caller asked to skip authorization
    Bypassed,
    /// Bearer header attached
    Bearer,
    /// No token available; sent without a header
    Missing,
}

/// Whether `operation` is sent without a bearer credential
pub fn is_public_operation(operation: &str) -> bool {
    PUBLIC_OPERATIONS.contains(&operation)
}

/// Decorates outgoing calls with the current bearer credential
#[derive(Clone)]
pub struct AuthorizationInterceptor {
    store: Arc<SessionStore>,
}

impl AuthorizationInterceptor {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn authorize(&self, call: &mut OutgoingCall) -> Authorization {
        let outcome = if call.bypass_auth {
            call.remove_header(AUTHORIZATION_HEADER);
            Authorization::Bypassed
        } else if is_public_operation(&call.operation) {
            call.remove_header(AUTHORIZATION_HEADER);
            Authorization::Public
        } else if let Some(token) = self.store.access_token() {
            call.set_header(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{token}"));
            Authorization::Bearer
        } else {
            call.remove_header(AUTHORIZATION_HEADER);
            Authorization::Missing
        };

        trace!(call_id = %call.id, operation = %call.operation, ?outcome, "Call authorized");
        outcome
    }
}
