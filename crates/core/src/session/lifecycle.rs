//! Per-session supervision for timer-driven components
//!
//! Background components follow [`SessionStatus`] and run one loop per live
//! session. The loop receives the session's cancellation scope and must stop
//! as soon as it is cancelled; a new loop starts only once the next session
//! has begun.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::{SchedulerError, SchedulerResult};
use super::store::{SessionStatus, SessionStore};

/// Cancellation scope of one live session
#[derive(Debug, Clone)]
pub struct SessionScope {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Drive `run` once per live session until `cancel` fires
pub async fn follow_sessions<F, Fut>(
    store: Arc<SessionStore>,
    cancel: CancellationToken,
    mut run: F,
)
where
    F: FnMut(SessionScope) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut status_rx = store.subscribe();
    let mut last_run: Option<u64> = None;

    loop {
        let SessionStatus { generation, authenticated } = *status_rx.borrow_and_update();

        if authenticated && last_run != Some(generation) {
            if let Some(token) = store.scope_for(generation) {
                last_run = Some(generation);
                debug!(generation, "Session loop starting");
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = run(SessionScope { generation, token }) => {
                        debug!(generation, "Session loop finished");
                    }
                }
                continue;
            }
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Mutex<Option<JoinHandle<()>>>;

/// Start/stop bookkeeping shared by the background components
pub(crate) struct ComponentTask {
    name: &'static str,
    cancellation_token: Mutex<CancellationToken>,
    task_handle: TaskHandle,
}

impl ComponentTask {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            cancellation_token: Mutex::new(CancellationToken::new()),
            task_handle: Mutex::new(None),
        }
    }

    /// Spawn the component loop with a fresh cancellation token
    pub(crate) fn start<F, Fut>(&self, body: F) -> SchedulerResult<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handle = self.task_handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(component = self.name, "Starting");

        // Fresh token so the component can be restarted after stop
        let cancel = CancellationToken::new();
        *self.cancellation_token.lock() = cancel.clone();
        *handle = Some(tokio::spawn(body(cancel)));

        Ok(())
    }

    /// Cancel the loop and wait for it to finish
    pub(crate) async fn stop(&self) -> SchedulerResult<()> {
        let handle = self.task_handle.lock().take();
        let Some(handle) = handle else {
            return Err(SchedulerError::NotRunning);
        };
        if handle.is_finished() {
            return Err(SchedulerError::NotRunning);
        }

        info!(component = self.name, "Stopping");
        self.cancellation_token.lock().cancel();

        let join_timeout = Duration::from_secs(5);
        let joined = tokio::time::timeout(join_timeout, handle).await;
        match joined {
            Ok(result) => result.map_err(SchedulerError::from),
            Err(_) => Err(SchedulerError::TaskJoinFailed(format!(
                "{} did not stop within {}s",
                self.name,
                join_timeout.as_secs()
            ))),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.task_handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}
