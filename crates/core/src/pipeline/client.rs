//! Authorized client
//!
//! Runs every business call through the full pipeline:
//! authorize, send, and on failure either replay once after a refresh or
//! hand the original failure back to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use memberdesk_domain::constants::{AUTHORIZATION_HEADER, BEARER_PREFIX};

use super::authorization::AuthorizationInterceptor;
use super::call::{CallFailure, CallResponse, OutgoingCall, Transport};
use super::retry::{RetryDecision, RetryLedger, RetryOnAuthFailureInterceptor};
use crate::session::{RefreshCoordinator, SessionStore};

/// Code attached to failures decoding a response body
pub const DECODE_FAILURE_CODE: &str = "DECODE";
/// Code attached to failures encoding a request body
pub const ENCODE_FAILURE_CODE: &str = "ENCODE";

/// Sends calls with the current credential and recovers from expired tokens
pub struct AuthorizedClient {
    transport: Arc<dyn Transport>,
    authorization: AuthorizationInterceptor,
    retry: RetryOnAuthFailureInterceptor,
}

impl AuthorizedClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<SessionStore>,
        coordinator: Arc<RefreshCoordinator>,
        ledger_ttl: Duration,
    ) -> Self {
        Self {
            transport,
            authorization: AuthorizationInterceptor::new(store),
            retry: RetryOnAuthFailureInterceptor::new(coordinator, RetryLedger::new(ledger_ttl)),
        }
    }

    /// Send `call`, replaying it at most once after a refresh
    ///
    /// # Errors
    /// The failure of the last attempt, unchanged.
    #[instrument(skip(self, call), fields(call_id = %call.id, operation = %call.operation))]
    pub async fn execute(&self, call: OutgoingCall) -> Result<CallResponse, CallFailure> {
        let outcome = loop {
            // Authorize a fresh copy each attempt so a replay picks up the new token
            let mut attempt = call.clone();
            self.authorization.authorize(&mut attempt);
            let sent_token = attempt
                .header_value(AUTHORIZATION_HEADER)
                .and_then(|value| value.strip_prefix(BEARER_PREFIX))
                .map(str::to_owned);

            match self.transport.send(&attempt).await {
                Ok(response) => break Ok(response),
                Err(failure) => {
                    match self.retry.on_failure(&call, sent_token.as_deref(), failure).await {
                        RetryDecision::Replay => {
                            debug!("Replaying call with refreshed credential");
                        }
                        RetryDecision::Propagate(failure) => break Err(failure),
                    }
                }
            }
        };

        self.retry.settle(call.id);
        outcome
    }

    /// `GET path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> Result<T, CallFailure> {
        let response = self.execute(OutgoingCall::get(operation, path)).await?;
        decode(response)
    }

    /// `POST path` with a JSON body and decode the JSON response
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<T, CallFailure> {
        let body = serde_json::to_value(body)
            .map_err(|err| CallFailure::new(None, Some(ENCODE_FAILURE_CODE), err.to_string()))?;
        let response = self.execute(OutgoingCall::post(operation, path).with_body(body)).await?;
        decode(response)
    }

    pub fn ledger(&self) -> &RetryLedger {
        self.retry.ledger()
    }
}

fn decode<T: DeserializeOwned>(response: CallResponse) -> Result<T, CallFailure> {
    let status = response.status;
    serde_json::from_value(response.body)
        .map_err(|err| CallFailure::new(Some(status), Some(DECODE_FAILURE_CODE), err.to_string()))
}
