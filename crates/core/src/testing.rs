//! Test doubles for the session ports
//!
//! Available under `cfg(test)` and with the `test-utils` feature so the
//! infra and app crates can drive the core components without a server.

#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use memberdesk_common::Clock;
use memberdesk_domain::{
    LoginGrant, LogoutReason, MemberdeskError, PersistedSession, Result, Role, Session,
    TokenGrant, User,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::pipeline::{CallFailure, CallResponse, OutgoingCall, Transport};
use crate::session::{AuthApi, RefreshError, SessionNotifier, SessionPersistence};

const DEFAULT_GRANT_LIFETIME: Duration = Duration::from_secs(15 * 60);

fn expiry(clock: &(impl Clock + ?Sized), lifetime: Duration) -> chrono::DateTime<chrono::Utc> {
    clock.now() + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::zero())
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

/// Active, unverified standard user
pub fn sample_user() -> User {
    User {
        id: "u-1".to_string(),
        display_name: "Ada".to_string(),
        role: Role::Standard,
        active: true,
        email_verified: false,
        last_login_at: None,
    }
}

/// Session with tokens `access-0` / `refresh-0` expiring `lifetime` from now
pub fn sample_session(clock: &(impl Clock + ?Sized), lifetime: Duration) -> Session {
    Session {
        user: sample_user(),
        access_token: "access-0".to_string(),
        refresh_token: "refresh-0".to_string(),
        expires_at: expiry(clock, lifetime),
    }
}

/// Grant with tokens `access-{n}` / `refresh-{n}`
pub fn sample_grant(clock: &(impl Clock + ?Sized), lifetime: Duration, n: usize) -> TokenGrant {
    TokenGrant {
        access_token: format!("access-{n}"),
        refresh_token: format!("refresh-{n}"),
        expires_at: expiry(clock, lifetime),
    }
}

/// Login grant for [`sample_user`] with the `access-0` token pair
pub fn sample_login_grant(clock: &(impl Clock + ?Sized), lifetime: Duration) -> LoginGrant {
    let session = sample_session(clock, lifetime);
    LoginGrant {
        user: session.user,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        expires_at: session.expires_at,
    }
}

// ----------------------------------------------------------------------
// Persistence
// ----------------------------------------------------------------------

/// Session record held in memory
#[derive(Default)]
pub struct InMemorySessionPersistence {
    record: Mutex<Option<PersistedSession>>,
    fail_load: bool,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl InMemorySessionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `record` already stored
    pub fn with_record(record: PersistedSession) -> Self {
        Self { record: Mutex::new(Some(record)), ..Self::default() }
    }

    /// Every `load` fails as if the record were corrupt
    pub fn failing_load() -> Self {
        Self { fail_load: true, ..Self::default() }
    }

    pub fn record(&self) -> Option<PersistedSession> {
        self.record.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionPersistence for InMemorySessionPersistence {
    async fn load(&self) -> Result<Option<PersistedSession>> {
        if self.fail_load {
            return Err(MemberdeskError::Persistence("corrupt session record".to_string()));
        }
        Ok(self.record.lock().clone())
    }

    async fn save(&self, record: &PersistedSession) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.record.lock() = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.record.lock() = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Remote auth API
// ----------------------------------------------------------------------

/// [`AuthApi`] with scripted outcomes
///
/// Unscripted refreshes succeed with `access-{n}` / `refresh-{n}`, where `n`
/// is the 1-based refresh call count.
pub struct ScriptedAuthApi {
    clock: Arc<dyn Clock>,
    delay: Duration,
    grant_lifetime: Mutex<Duration>,
    login: Mutex<Option<Result<LoginGrant>>>,
    refreshes: Mutex<VecDeque<std::result::Result<TokenGrant, RefreshError>>>,
    seen_refresh_tokens: Mutex<Vec<String>>,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    fail_logout: AtomicBool,
}

impl ScriptedAuthApi {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            delay: Duration::ZERO,
            grant_lifetime: Mutex::new(DEFAULT_GRANT_LIFETIME),
            login: Mutex::new(None),
            refreshes: Mutex::new(VecDeque::new()),
            seen_refresh_tokens: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            fail_logout: AtomicBool::new(false),
        }
    }

    /// Every exchange takes `delay` of (tokio) time
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Lifetime of unscripted refresh grants
    pub fn set_grant_lifetime(&self, lifetime: Duration) {
        *self.grant_lifetime.lock() = lifetime;
    }

    pub fn set_login(&self, outcome: Result<LoginGrant>) {
        *self.login.lock() = Some(outcome);
    }

    /// Queue the outcome of the next refresh
    pub fn push_refresh(&self, outcome: std::result::Result<TokenGrant, RefreshError>) {
        self.refreshes.lock().push_back(outcome);
    }

    pub fn fail_logout(&self) {
        self.fail_logout.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().clone()
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn login(&self, _username: &str, _password: &str) -> Result<LoginGrant> {
        self.pause().await;
        let scripted = self.login.lock().clone();
        scripted.unwrap_or_else(|| {
            Ok(sample_login_grant(self.clock.as_ref(), *self.grant_lifetime.lock()))
        })
    }

    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenGrant, RefreshError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_refresh_tokens.lock().push(refresh_token.to_string());
        self.pause().await;

        let scripted = self.refreshes.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(sample_grant(self.clock.as_ref(), *self.grant_lifetime.lock(), n))
        })
    }

    async fn logout(&self) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(MemberdeskError::Network("logout endpoint unavailable".to_string()));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------

type Handler =
    Box<dyn Fn(&OutgoingCall) -> std::result::Result<CallResponse, CallFailure> + Send + Sync>;

/// [`Transport`] answering from a closure and recording every call
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<OutgoingCall>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&OutgoingCall) -> std::result::Result<CallResponse, CallFailure>
            + Send
            + Sync
            + 'static,
    {
        Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()) }
    }

    /// Answer every call with `200` and `body`
    pub fn ok(body: Value) -> Self {
        Self::new(move |_| Ok(CallResponse { status: 200, body: body.clone() }))
    }

    /// Calls as they were sent (after authorization)
    pub fn calls(&self) -> Vec<OutgoingCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, call: &OutgoingCall) -> std::result::Result<CallResponse, CallFailure> {
        self.calls.lock().push(call.clone());
        (self.handler)(call)
    }
}

// ----------------------------------------------------------------------
// Notifier
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    IdleWarningShown(Duration),
    IdleWarningDismissed,
    ExpiryPromptShown(Duration),
    ExpiryPromptDismissed,
    SessionEnded(LogoutReason),
}

/// [`SessionNotifier`] that records every notice
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().clone()
    }

    pub fn ended_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, NotifierEvent::SessionEnded(_)))
            .count()
    }

    fn push(&self, event: NotifierEvent) {
        self.events.lock().push(event);
    }
}

impl SessionNotifier for RecordingNotifier {
    fn show_idle_warning(&self, remaining: Duration) {
        self.push(NotifierEvent::IdleWarningShown(remaining));
    }

    fn dismiss_idle_warning(&self) {
        self.push(NotifierEvent::IdleWarningDismissed);
    }

    fn show_expiry_prompt(&self, remaining: Duration) {
        self.push(NotifierEvent::ExpiryPromptShown(remaining));
    }

    fn dismiss_expiry_prompt(&self) {
        self.push(NotifierEvent::ExpiryPromptDismissed);
    }

    fn session_ended(&self, reason: LogoutReason) {
        self.push(NotifierEvent::SessionEnded(reason));
    }
}
