//! Retry on authorization failure
//!
//! An authorization failure on a retryable call triggers one refresh
//! (shared with every other caller through the single-flight coordinator)
//! and one replay of the call. The [`RetryLedger`] remembers which calls
//! already used their replay.

use std::sync::Arc;
use std::time::Duration;

use memberdesk_domain::constants::{AUTH_FAILURE_CODES, NO_RETRY_OPERATIONS};
use moka::sync::Cache;
use tracing::{debug, info, warn};

use super::call::{CallFailure, CallId, OutgoingCall};
use crate::session::RefreshCoordinator;

/// Upper bound on concurrently tracked calls
const LEDGER_MAX_CAPACITY: u64 = 10_000;

/// Message fragments that indicate a rejected credential
const AUTH_FAILURE_MESSAGES: &[&str] = &[
    "unauthorized",
    "unauthenticated",
    "token expired",
    "expired token",
    "jwt expired",
    "invalid token",
    "token is invalid",
    "token has expired",
];

/// Whether `failure` means the credential was rejected
pub fn is_auth_failure(failure: &CallFailure) -> bool {
    if failure.status == Some(401) {
        return true;
    }
    if failure
        .code
        .as_deref()
        .is_some_and(|code| AUTH_FAILURE_CODES.iter().any(|c| c.eq_ignore_ascii_case(code)))
    {
        return true;
    }
    let message = failure.message.to_ascii_lowercase();
    AUTH_FAILURE_MESSAGES.iter().any(|fragment| message.contains(fragment))
}

/// Whether `operation` may be refreshed and replayed
pub fn is_retryable_operation(operation: &str) -> bool {
    !NO_RETRY_OPERATIONS.contains(&operation)
}

/// Calls that already triggered their one retry
///
/// Entries expire on their own after the TTL; [`RetryLedger::settle`]
/// removes them as soon as the call finishes.
#[derive(Clone)]
pub struct RetryLedger {
    entries: Cache<CallId, ()>,
}

impl RetryLedger {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder().max_capacity(LEDGER_MAX_CAPACITY).time_to_live(ttl).build();
        Self { entries }
    }

    /// Record the retry for `id`
    ///
    /// Returns `false` if the call was already retried.
    pub fn mark_retried(&self, id: CallId) -> bool {
        self.entries.entry(id).or_insert(()).is_fresh()
    }

    pub fn was_retried(&self, id: CallId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn settle(&self, id: CallId) {
        self.entries.invalidate(&id);
    }

    /// Number of tracked calls
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What to do with a failed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send the call again with the current token
    Replay,
    /// Hand the failure to the caller
    Propagate(CallFailure),
}

/// Refreshes and replays calls rejected for an expired credential
pub struct RetryOnAuthFailureInterceptor {
    coordinator: Arc<RefreshCoordinator>,
    ledger: RetryLedger,
}

impl RetryOnAuthFailureInterceptor {
    pub fn new(coordinator: Arc<RefreshCoordinator>, ledger: RetryLedger) -> Self {
        Self { coordinator, ledger }
    }

    /// Decide what to do with a failed attempt
    ///
    /// `sent_token` is the access token the failed attempt carried. When the
    /// store already holds a different one, another caller refreshed in the
    /// meantime and the call is replayed without a new exchange.
    pub async fn on_failure(
        &self,
        call: &OutgoingCall,
        sent_token: Option<&str>,
        failure: CallFailure,
    ) -> RetryDecision {
        if !is_retryable_operation(&call.operation) || !is_auth_failure(&failure) {
            return RetryDecision::Propagate(failure);
        }

        if !self.ledger.mark_retried(call.id) {
            debug!(call_id = %call.id, operation = %call.operation, "Call already retried once");
            return RetryDecision::Propagate(failure);
        }

        let current = self.coordinator.store().access_token();
        if let (Some(sent), Some(current)) = (sent_token, current.as_deref()) {
            if sent != current {
                debug!(call_id = %call.id, "Credential already rotated; replaying");
                return RetryDecision::Replay;
            }
        }

        info!(call_id = %call.id, operation = %call.operation, "Authorization failure; refreshing");
        match self.coordinator.refresh().await {
            Ok(_) => RetryDecision::Replay,
            Err(err) => {
                warn!(
                    call_id = %call.id,
                    error = %err,
                    "Refresh failed; propagating original failure"
                );
                RetryDecision::Propagate(failure)
            }
        }
    }

    /// Forget `id` once its call has finished
    pub fn settle(&self, id: CallId) {
        self.ledger.settle(id);
    }

    pub fn ledger(&self) -> &RetryLedger {
        &self.ledger
    }
}
