//! Expiration prompt
//!
//! Polls the session expiry while a session exists. Inside the warning window
//! the user is offered "stay logged in" (dismiss; renewal happens elsewhere)
//! or "log out now". Once the token is past its expiry the session is ended
//! and attributed to absolute expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use memberdesk_domain::constants::{
    DEFAULT_EXPIRY_POLL_INTERVAL_SECS, DEFAULT_EXPIRY_WARNING_LEAD_SECS,
};
use memberdesk_domain::{LogoutReason, SessionConfig};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

use super::error::SchedulerResult;
use super::lifecycle::{follow_sessions, ComponentTask, SessionScope};
use super::ports::SessionNotifier;
use super::store::SessionStore;

/// Visibility of the expiry prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPrompt {
    Hidden,
    Visible { remaining: Duration },
}

/// Expiry prompt timings
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    pub warning_lead: Duration,
    pub poll_interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            warning_lead: Duration::from_secs(DEFAULT_EXPIRY_WARNING_LEAD_SECS),
            poll_interval: Duration::from_secs(DEFAULT_EXPIRY_POLL_INTERVAL_SECS),
        }
    }
}

impl From<&SessionConfig> for ExpiryConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            warning_lead: config.expiry_warning_lead(),
            poll_interval: config.expiry_poll_interval(),
        }
    }
}

struct ExpiryContext {
    store: Arc<SessionStore>,
    notifier: Arc<dyn SessionNotifier>,
    config: ExpiryConfig,
    prompt_tx: watch::Sender<ExpiryPrompt>,
    // Expiry the user already dismissed the prompt for
    dismissed_for: Mutex<Option<DateTime<Utc>>>,
}

/// Drives the "session about to expire" prompt
pub struct ExpirationNotifier {
    context: Arc<ExpiryContext>,
    task: ComponentTask,
}

impl ExpirationNotifier {
    pub fn new(
        store: Arc<SessionStore>,
        notifier: Arc<dyn SessionNotifier>,
        config: ExpiryConfig,
    ) -> Self {
        let (prompt_tx, _) = watch::channel(ExpiryPrompt::Hidden);
        Self {
            context: Arc::new(ExpiryContext {
                store,
                notifier,
                config,
                prompt_tx,
                dismissed_for: Mutex::new(None),
            }),
            task: ComponentTask::new("expiration-notifier"),
        }
    }

    /// Start polling
    ///
    /// # Errors
    ///
    /// Returns error if already running
    #[instrument(skip(self))]
    pub fn start(&self) -> SchedulerResult<()> {
        let context = Arc::clone(&self.context);
        self.task.start(move |cancel| async move {
            let store = Arc::clone(&context.store);
            follow_sessions(store, cancel, |scope| {
                let context = Arc::clone(&context);
                async move { context.run_session(scope).await }
            })
            .await;
        })
    }

    /// Stop polling and hide the prompt
    ///
    /// # Errors
    ///
    /// Returns error if not running
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        let result = self.task.stop().await;
        self.context.hide();
        result
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExpiryPrompt> {
        self.context.prompt_tx.subscribe()
    }

    pub fn prompt(&self) -> ExpiryPrompt {
        *self.context.prompt_tx.borrow()
    }

    /// "Stay logged in": dismiss the prompt for the current expiry
    pub fn stay_logged_in(&self) {
        *self.context.dismissed_for.lock() = self.context.store.expires_at();
        self.context.hide();
    }

    /// "Log out now": end the live session
    ///
    /// Returns `true` if this call ended the session.
    pub async fn logout_now(&self) -> bool {
        self.context.hide();
        let status = self.context.store.status();
        if !status.authenticated {
            return false;
        }
        let ended = self.context.store.end_session(status.generation).await;
        if ended {
            self.context.notifier.session_ended(LogoutReason::UserRequested);
        }
        ended
    }

    /// Evaluate the prompt immediately
    pub async fn check_now(&self) {
        let generation = self.context.store.status().generation;
        self.context.evaluate(generation).await;
    }
}

impl ExpiryContext {
    async fn run_session(&self, scope: SessionScope) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = scope.token.cancelled() => {
                    self.hide();
                    break;
                }
                _ = ticker.tick() => {
                    self.evaluate(scope.generation).await;
                }
            }
        }
    }

    async fn evaluate(&self, generation: u64) {
        let (Some(left), Some(expires_at)) =
            (self.store.time_until_expiry(), self.store.expires_at())
        else {
            self.hide();
            return;
        };

        if left <= chrono::Duration::zero() {
            self.hide();
            if self.store.end_session(generation).await {
                info!(generation, "Session ended at absolute expiry");
                self.notifier.session_ended(LogoutReason::Expired);
            }
            return;
        }

        let remaining = left.to_std().unwrap_or(Duration::ZERO);
        if remaining >= self.config.warning_lead {
            self.hide();
            return;
        }
        if *self.dismissed_for.lock() == Some(expires_at) {
            return;
        }
        self.show(remaining);
    }

    fn show(&self, remaining: Duration) {
        let was_hidden = *self.prompt_tx.borrow() == ExpiryPrompt::Hidden;
        self.prompt_tx.send_replace(ExpiryPrompt::Visible { remaining });
        if was_hidden {
            debug!(seconds_until_expiry = remaining.as_secs(), "Showing expiry prompt");
            self.notifier.show_expiry_prompt(remaining);
        }
    }

    fn hide(&self) {
        let previous = self.prompt_tx.send_replace(ExpiryPrompt::Hidden);
        if previous != ExpiryPrompt::Hidden {
            self.notifier.dismiss_expiry_prompt();
        }
    }
}
