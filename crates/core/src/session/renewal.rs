//! Proactive renewal scheduler
//!
//! Checks the access-token expiry on a fixed interval while a session exists
//! and refreshes before the token runs out, so ordinary calls rarely hit an
//! authorization failure.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use memberdesk_core::session::{
//!     ProactiveRenewalScheduler, RefreshCoordinator, RenewalConfig, SessionStore,
//! };
//!
//! # async fn example(store: Arc<SessionStore>, coordinator: Arc<RefreshCoordinator>) {
//! let scheduler = ProactiveRenewalScheduler::new(store, coordinator, RenewalConfig::default());
//! scheduler.start().unwrap();
//! // ... application runs ...
//! scheduler.stop().await.unwrap();
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use memberdesk_domain::constants::{DEFAULT_RENEWAL_CHECK_INTERVAL_SECS, DEFAULT_RENEWAL_LEAD_SECS};
use memberdesk_domain::SessionConfig;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::error::SchedulerResult;
use super::lifecycle::{follow_sessions, ComponentTask, SessionScope};
use super::refresh::RefreshCoordinator;
use super::store::SessionStore;

/// Configuration for proactive renewal
#[derive(Debug, Clone)]
pub struct RenewalConfig {
    /// Refresh when the token expires within this lead time
    pub lead: Duration,
    /// Check interval
    pub check_interval: Duration,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            lead: Duration::from_secs(DEFAULT_RENEWAL_LEAD_SECS),
            check_interval: Duration::from_secs(DEFAULT_RENEWAL_CHECK_INTERVAL_SECS),
        }
    }
}

impl From<&SessionConfig> for RenewalConfig {
    fn from(config: &SessionConfig) -> Self {
        Self { lead: config.renewal_lead(), check_interval: config.renewal_check_interval() }
    }
}

/// What a single check decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalCheck {
    /// No session
    Idle,
    /// Token has more than the lead time left
    NotDue,
    /// A refresh was attempted recently
    Debounced,
    /// Refresh triggered
    Renewed,
    /// Refresh triggered and failed
    Failed,
}

struct RenewalContext {
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    config: RenewalConfig,
}

/// Refreshes the session ahead of expiry
pub struct ProactiveRenewalScheduler {
    context: Arc<RenewalContext>,
    task: ComponentTask,
}

impl ProactiveRenewalScheduler {
    pub fn new(
        store: Arc<SessionStore>,
        coordinator: Arc<RefreshCoordinator>,
        config: RenewalConfig,
    ) -> Self {
        Self {
            context: Arc::new(RenewalContext { store, coordinator, config }),
            task: ComponentTask::new("renewal-scheduler"),
        }
    }

    /// Start the scheduler
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
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

    /// Stop the scheduler gracefully
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        self.task.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Run one check immediately
    pub async fn check_now(&self) -> RenewalCheck {
        self.context.check().await
    }
}

impl RenewalContext {
    async fn run_session(&self, scope: SessionScope) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = scope.token.cancelled() => {
                    debug!(generation = scope.generation, "Renewal loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
    }

    async fn check(&self) -> RenewalCheck {
        let Some(left) = self.store.time_until_expiry() else {
            return RenewalCheck::Idle;
        };

        let lead = chrono::Duration::from_std(self.config.lead)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if left >= lead {
            return RenewalCheck::NotDue;
        }
        if self.coordinator.attempted_within(self.config.check_interval) {
            debug!("Refresh attempted recently; skipping renewal check");
            return RenewalCheck::Debounced;
        }

        if left <= chrono::Duration::zero() {
            info!(
                seconds_overdue = -left.num_seconds(),
                "Access token already expired; refreshing now"
            );
        } else {
            info!(seconds_until_expiry = left.num_seconds(), "Access token near expiry; refreshing");
        }

        match self.coordinator.refresh().await {
            Ok(_) => RenewalCheck::Renewed,
            Err(err) => {
                warn!(error = %err, "Proactive renewal failed");
                RenewalCheck::Failed
            }
        }
    }
}
