//! Idle watchdog
//!
//! Logs the user out after a period without input activity. Per session the
//! watchdog moves `Active -> Warned -> LoggedOut`; any admitted activity
//! returns it to `Active` and reschedules both deadlines from that moment.
//!
//! Activity arrives through an [`ActivitySender`] handed to the UI layer.
//! Bursts are throttled: the first signal resets the deadlines at once,
//! further signals inside the debounce window are coalesced into one trailing
//! reset at the end of the window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memberdesk_common::time::ActivityThrottle;
use memberdesk_domain::constants::{
    DEFAULT_ACTIVITY_DEBOUNCE_MS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_IDLE_WARNING_LEAD_SECS,
};
use memberdesk_domain::{LogoutReason, SessionConfig};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, trace};

use super::error::SchedulerResult;
use super::lifecycle::{follow_sessions, ComponentTask, SessionScope};
use super::ports::SessionNotifier;
use super::store::SessionStore;

/// User-activity signals the watchdog listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Scroll,
    Touch,
    Click,
}

/// Observable watchdog state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Not running, or no session
    Disabled,
    Active,
    /// Idle warning is visible
    Warned,
    /// Idle timeout ended the session
    LoggedOut,
}

/// Idle timings
#[derive(Debug, Clone)]
pub struct IdleConfig {
    pub timeout: Duration,
    pub warning_lead: Duration,
    pub debounce: Duration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            warning_lead: Duration::from_secs(DEFAULT_IDLE_WARNING_LEAD_SECS),
            debounce: Duration::from_millis(DEFAULT_ACTIVITY_DEBOUNCE_MS),
        }
    }
}

impl From<&SessionConfig> for IdleConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            timeout: config.idle_timeout(),
            warning_lead: config.idle_warning_lead(),
            debounce: config.activity_debounce(),
        }
    }
}

/// Listener handle for user activity
///
/// Cheap to clone. Signals sent while no session is being watched are
/// dropped.
#[derive(Debug, Clone)]
pub struct ActivitySender {
    tx: mpsc::UnboundedSender<ActivityKind>,
    listening: Arc<AtomicBool>,
}

impl ActivitySender {
    pub fn record(&self, kind: ActivityKind) {
        if !self.listening.load(Ordering::Acquire) {
            return;
        }
        if self.tx.send(kind).is_err() {
            trace!(?kind, "Idle watchdog dropped; activity ignored");
        }
    }
}

struct IdleContext {
    store: Arc<SessionStore>,
    notifier: Arc<dyn SessionNotifier>,
    config: IdleConfig,
    activity_rx: Mutex<mpsc::UnboundedReceiver<ActivityKind>>,
    listening: Arc<AtomicBool>,
    state_tx: watch::Sender<WatchdogState>,
}

/// Inactivity logout
pub struct IdleWatchdog {
    context: Arc<IdleContext>,
    activity: ActivitySender,
    task: ComponentTask,
}

impl IdleWatchdog {
    pub fn new(
        store: Arc<SessionStore>,
        notifier: Arc<dyn SessionNotifier>,
        config: IdleConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listening = Arc::new(AtomicBool::new(false));
        let (state_tx, _) = watch::channel(WatchdogState::Disabled);

        Self {
            context: Arc::new(IdleContext {
                store,
                notifier,
                config,
                activity_rx: Mutex::new(rx),
                listening: Arc::clone(&listening),
                state_tx,
            }),
            activity: ActivitySender { tx, listening },
            task: ComponentTask::new("idle-watchdog"),
        }
    }

    /// Handle for the UI layer to report activity
    pub fn activity_sender(&self) -> ActivitySender {
        self.activity.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchdogState> {
        self.context.state_tx.subscribe()
    }

    pub fn state(&self) -> WatchdogState {
        *self.context.state_tx.borrow()
    }

    /// Enable the watchdog
    ///
    /// # Errors
    ///
    /// Returns error if the watchdog is already running
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

    /// Disable the watchdog, tearing down listeners and timers
    ///
    /// # Errors
    ///
    /// Returns error if the watchdog is not running
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        let result = self.task.stop().await;
        self.context.listening.store(false, Ordering::Release);
        if self.state() == WatchdogState::Warned {
            self.context.notifier.dismiss_idle_warning();
        }
        self.context.state_tx.send_replace(WatchdogState::Disabled);
        result
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

impl IdleContext {
    fn publish(&self, state: WatchdogState) {
        self.state_tx.send_replace(state);
    }

    async fn run_session(&self, scope: SessionScope) {
        let mut activity = self.activity_rx.lock().await;
        // Signals from before this session do not count
        while activity.try_recv().is_ok() {}
        self.listening.store(true, Ordering::Release);

        let timeout = self.config.timeout;
        let warn_after = timeout.saturating_sub(self.config.warning_lead);
        let mut throttle = ActivityThrottle::new(self.config.debounce);
        let mut last_activity = Instant::now();
        let mut warned = false;
        self.publish(WatchdogState::Active);
        debug!(
            generation = scope.generation,
            timeout_secs = timeout.as_secs(),
            "Idle watchdog armed"
        );

        loop {
            let warn_at = last_activity + warn_after;
            let logout_at = last_activity + timeout;
            let trailing = throttle.window_end();

            tokio::select! {
                biased;
                () = scope.token.cancelled() => {
                    self.listening.store(false, Ordering::Release);
                    if warned {
                        self.notifier.dismiss_idle_warning();
                    }
                    self.publish(WatchdogState::Disabled);
                    return;
                }
                Some(kind) = activity.recv() => {
                    let now = Instant::now();
                    if throttle.admit(now) {
                        trace!(?kind, "Activity admitted");
                        last_activity = now;
                        warned = self.reset(warned);
                    }
                }
                () = sleep_until(trailing.unwrap_or(logout_at)), if trailing.is_some() => {
                    let now = Instant::now();
                    if throttle.flush(now) {
                        last_activity = now;
                        warned = self.reset(warned);
                    }
                }
                () = sleep_until(warn_at), if !warned => {
                    warned = true;
                    info!(generation = scope.generation, "Idle warning shown");
                    self.notifier.show_idle_warning(self.config.warning_lead);
                    self.publish(WatchdogState::Warned);
                }
                () = sleep_until(logout_at) => {
                    self.listening.store(false, Ordering::Release);
                    self.publish(WatchdogState::LoggedOut);
                    if warned {
                        self.notifier.dismiss_idle_warning();
                    }
                    if self.store.end_session(scope.generation).await {
                        info!(generation = scope.generation, "Session ended after inactivity");
                        self.notifier.session_ended(LogoutReason::IdleTimeout);
                    }
                    return;
                }
            }
        }
    }

    /// Back to `Active`; returns the new `warned` flag
    fn reset(&self, warned: bool) -> bool {
        if warned {
            debug!("Activity during idle warning; dismissing");
            self.notifier.dismiss_idle_warning();
            self.publish(WatchdogState::Active);
        }
        false
    }
}
