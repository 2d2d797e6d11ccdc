//! Single-flight refresh coordinator
//!
//! At most one refresh exchange runs per process. Callers that arrive while
//! an exchange is in flight join it and receive the same outcome: either the
//! new access token, or the same rejection.
//!
//! The exchange runs on its own task so a caller that gives up (dropped
//! future, cancelled timer) never strands the in-flight slot. A failed
//! exchange is terminal: the session it was started for is ended and the
//! user is told once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use memberdesk_domain::LogoutReason;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::RefreshError;
use super::ports::{AuthApi, SessionNotifier};
use super::store::SessionStore;

type RefreshOutcome = Result<String, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    id: u64,
    outcome: SharedRefresh,
}

/// Everything the exchange task needs, detached from the coordinator
struct ExchangeContext {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    notifier: Arc<dyn SessionNotifier>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

/// Performs the refresh-token exchange, single-flight
pub struct RefreshCoordinator {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    notifier: Arc<dyn SessionNotifier>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: AtomicU64,
    last_attempt: Mutex<Option<Instant>>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn AuthApi>,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Self {
        Self {
            store,
            api,
            notifier,
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
            last_attempt: Mutex::new(None),
        }
    }

    /// Obtain a fresh access token
    ///
    /// Joins the in-flight exchange if there is one, otherwise starts it.
    ///
    /// # Errors
    /// - `NoRefreshToken` when no session exists
    /// - `InvalidRefreshToken` / `Transport` when the exchange failed (the
    ///   session has been ended)
    /// - `Superseded` when the session changed while the exchange ran
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let outcome = {
            let mut slot = self.in_flight.lock();
            if let Some(flight) = slot.as_ref() {
                debug!(flight = flight.id, "Joining in-flight refresh");
                Some(flight.outcome.clone())
            } else if let Some((generation, refresh_token)) = self.store.refresh_credential() {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                *self.last_attempt.lock() = Some(Instant::now());
                info!(flight = id, generation, "Starting refresh exchange");

                let context = ExchangeContext {
                    store: Arc::clone(&self.store),
                    api: Arc::clone(&self.api),
                    notifier: Arc::clone(&self.notifier),
                    in_flight: Arc::clone(&self.in_flight),
                };
                let task =
                    tokio::spawn(Self::exchange(context, id, generation, refresh_token));
                let outcome = async move {
                    task.await.unwrap_or_else(|err| Err(RefreshError::Aborted(err.to_string())))
                }
                .boxed()
                .shared();

                *slot = Some(InFlight { id, outcome: outcome.clone() });
                Some(outcome)
            } else {
                None
            }
        };

        match outcome {
            Some(outcome) => outcome.await,
            None => self.fail_without_token().await,
        }
    }

    async fn fail_without_token(&self) -> RefreshOutcome {
        warn!("Refresh requested without a refresh token");
        self.store.logout().await;
        Err(RefreshError::NoRefreshToken)
    }

    async fn exchange(
        context: ExchangeContext,
        id: u64,
        generation: u64,
        refresh_token: String,
    ) -> RefreshOutcome {
        let outcome = match context.api.refresh(&refresh_token).await {
            Ok(grant) => {
                let access_token = grant.access_token.clone();
                if context.store.update_tokens_if_current(generation, grant).await {
                    info!(flight = id, "Refresh exchange succeeded");
                    Ok(access_token)
                } else {
                    debug!(flight = id, "Session changed during refresh; discarding grant");
                    Err(RefreshError::Superseded)
                }
            }
            Err(err) => {
                warn!(flight = id, error = %err, "Refresh exchange failed; ending session");
                if context.store.end_session(generation).await {
                    context.notifier.session_ended(LogoutReason::RefreshFailed);
                }
                Err(err)
            }
        };

        let mut slot = context.in_flight.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
        outcome
    }

    /// Whether an exchange is currently in flight
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Whether an exchange was started less than `interval` ago
    pub fn attempted_within(&self, interval: Duration) -> bool {
        self.last_attempt.lock().is_some_and(|at| at.elapsed() < interval)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}
