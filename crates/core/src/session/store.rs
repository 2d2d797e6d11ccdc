//! Session store
//!
//! Holds the current session, persists every mutation, and publishes a
//! [`SessionStatus`] whenever a session begins or ends.
//!
//! One store exists per process; it is constructed once at startup (usually
//! through [`SessionStore::restore`]) and injected into every component that
//! needs it.
//!
//! Each live session owns a cancellation scope. Replacing or ending the
//! session cancels that scope synchronously, before the new state becomes
//! visible, so timers started for the old session can never act on the new
//! one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use memberdesk_common::time::Clock;
use memberdesk_domain::{PersistedSession, Session, TokenGrant, User};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::SessionPersistence;

/// Published on every session start and end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// Increments whenever a session begins or ends
    pub generation: u64,
    pub authenticated: bool,
}

struct StoreState {
    session: Option<Session>,
    generation: u64,
    scope: Option<CancellationToken>,
}

/// Process-wide session holder
pub struct SessionStore {
    state: RwLock<StoreState>,
    // Serializes mutations so persisted writes land in mutation order.
    persist_lock: Mutex<()>,
    persistence: Arc<dyn SessionPersistence>,
    clock: Arc<dyn Clock>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionStore {
    /// Create an empty (logged-out) store
    pub fn new(persistence: Arc<dyn SessionPersistence>, clock: Arc<dyn Clock>) -> Self {
        Self::with_session(persistence, clock, None)
    }

    fn with_session(
        persistence: Arc<dyn SessionPersistence>,
        clock: Arc<dyn Clock>,
        session: Option<Session>,
    ) -> Self {
        let authenticated = session.is_some();
        let generation = u64::from(authenticated);
        let scope = authenticated.then(CancellationToken::new);
        let (status_tx, _) = watch::channel(SessionStatus { generation, authenticated });

        Self {
            state: RwLock::new(StoreState { session, generation, scope }),
            persist_lock: Mutex::new(()),
            persistence,
            clock,
            status_tx,
        }
    }

    /// Restore the last persisted session
    ///
    /// A record that cannot be read or is incomplete is treated as "no
    /// session". An expired session is logged out before the store is
    /// returned, so no component ever observes its stale tokens.
    #[instrument(skip_all)]
    pub async fn restore(persistence: Arc<dyn SessionPersistence>, clock: Arc<dyn Clock>) -> Self {
        let session = match persistence.load().await {
            Ok(Some(record)) => {
                let session = record.into_session();
                if session.is_none() {
                    debug!("Persisted session record is empty or incomplete; ignoring it");
                }
                session
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "Failed to load persisted session; starting logged out");
                None
            }
        };

        let store = Self::with_session(persistence, clock, session);
        if store.is_authenticated() && store.is_expired() {
            info!("Restored session is expired; logging out");
            store.logout().await;
        } else if store.is_authenticated() {
            info!(
                seconds_until_expiry = store.time_until_expiry().map(|d| d.num_seconds()),
                "Restored persisted session"
            );
        }
        store
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Replace the whole session and start a new session scope
    #[instrument(skip_all, fields(user = %session.user.id))]
    pub async fn login(&self, session: Session) {
        let _persist = self.persist_lock.lock().await;
        let record = PersistedSession::from(&session);

        let status = {
            let mut state = self.state.write();
            if let Some(scope) = state.scope.take() {
                scope.cancel();
            }
            state.generation += 1;
            state.session = Some(session);
            state.scope = Some(CancellationToken::new());
            SessionStatus { generation: state.generation, authenticated: true }
        };
        self.status_tx.send_replace(status);
        info!(generation = status.generation, "Session started");

        self.save(&record).await;
    }

    /// Clear the session. Idempotent.
    pub async fn logout(&self) {
        self.clear(None).await;
    }

    /// End the session only if `generation` is still the live one
    ///
    /// Returns `true` when this call ended the session. Racing terminators
    /// (idle timeout, expiry, refresh failure) use the return value so that
    /// exactly one of them reports the end.
    pub async fn end_session(&self, generation: u64) -> bool {
        self.clear(Some(generation)).await
    }

    async fn clear(&self, expected_generation: Option<u64>) -> bool {
        let _persist = self.persist_lock.lock().await;

        let status = {
            let mut state = self.state.write();
            if state.session.is_none() {
                return false;
            }
            if expected_generation.is_some_and(|expected| expected != state.generation) {
                return false;
            }
            if let Some(scope) = state.scope.take() {
                scope.cancel();
            }
            state.session = None;
            state.generation += 1;
            SessionStatus { generation: state.generation, authenticated: false }
        };
        self.status_tx.send_replace(status);
        info!(generation = status.generation, "Session ended");

        if let Err(err) = self.persistence.clear().await {
            warn!(error = %err, "Failed to clear persisted session");
        }
        true
    }

    /// Replace the token fields of the live session
    ///
    /// No-op without a session. `expires_at` never moves backwards: if the
    /// grant carries an earlier expiry than the current one, the current one
    /// is kept.
    pub async fn update_tokens(&self, grant: TokenGrant) {
        self.apply_grant(None, grant).await;
    }

    /// [`Self::update_tokens`] restricted to the session with `generation`
    ///
    /// Returns `false` (and changes nothing) if that session is gone.
    pub async fn update_tokens_if_current(&self, generation: u64, grant: TokenGrant) -> bool {
        self.apply_grant(Some(generation), grant).await
    }

    async fn apply_grant(&self, expected_generation: Option<u64>, grant: TokenGrant) -> bool {
        let _persist = self.persist_lock.lock().await;

        let record = {
            let mut state = self.state.write();
            let generation = state.generation;
            if expected_generation.is_some_and(|expected| expected != generation) {
                debug!(generation, "Token update for a superseded session ignored");
                return false;
            }
            let Some(session) = state.session.as_mut() else {
                debug!("Token update without a session ignored");
                return false;
            };

            if grant.expires_at < session.expires_at {
                warn!(
                    current = %session.expires_at,
                    received = %grant.expires_at,
                    "Refreshed expiry is earlier than the current one; keeping the current expiry"
                );
            }
            session.access_token = grant.access_token;
            session.refresh_token = grant.refresh_token;
            session.expires_at = session.expires_at.max(grant.expires_at);
            debug!(generation, expires_at = %session.expires_at, "Session tokens updated");
            PersistedSession::from(&*session)
        };

        self.save(&record).await;
        true
    }

    /// Replace the user record of the live session. No-op without a session.
    pub async fn set_user(&self, user: User) {
        let _persist = self.persist_lock.lock().await;

        let record = {
            let mut state = self.state.write();
            let Some(session) = state.session.as_mut() else {
                debug!("User update without a session ignored");
                return;
            };
            session.user = user;
            PersistedSession::from(&*session)
        };

        self.save(&record).await;
    }

    async fn save(&self, record: &PersistedSession) {
        if let Err(err) = self.persistence.save(record).await {
            warn!(error = %err, "Failed to persist session");
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// `now >= expires_at`; `true` when there is no session
    pub fn is_expired(&self) -> bool {
        let now = self.clock.now();
        self.state.read().session.as_ref().map_or(true, |session| session.is_expired_at(now))
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().session.is_some()
    }

    /// Current access token, read fresh on every call
    pub fn access_token(&self) -> Option<String> {
        self.state.read().session.as_ref().map(|session| session.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().session.as_ref().map(|session| session.refresh_token.clone())
    }

    /// Refresh token together with the generation it belongs to
    pub fn refresh_credential(&self) -> Option<(u64, String)> {
        let state = self.state.read();
        state.session.as_ref().map(|session| (state.generation, session.refresh_token.clone()))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().session.as_ref().map(|session| session.expires_at)
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().session.as_ref().map(|session| session.user.clone())
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.state.read().session.clone()
    }

    /// Signed time left on the access token; negative once expired
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        let now = self.clock.now();
        self.state.read().session.as_ref().map(|session| session.time_until_expiry(now))
    }

    /// Time left as a std duration, zero once expired
    pub fn remaining(&self) -> Option<Duration> {
        self.time_until_expiry().map(|left| left.to_std().unwrap_or(Duration::ZERO))
    }

    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Cancellation scope of the session with `generation`, if it is live
    pub fn scope_for(&self, generation: u64) -> Option<CancellationToken> {
        let state = self.state.read();
        if state.generation != generation {
            return None;
        }
        state.scope.clone()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for session::store.
    use memberdesk_common::testing::MockClock;

    use super::*;
    use crate::testing::{sample_grant, sample_session, InMemorySessionPersistence};

    fn store() -> (SessionStore, Arc<InMemorySessionPersistence>, Arc<MockClock>) {
        let persistence = Arc::new(InMemorySessionPersistence::new());
        let clock = Arc::new(MockClock::new());
        let store = SessionStore::new(persistence.clone(), clock.clone());
        (store, persistence, clock)
    }

    /// Validates the all-or-nothing session invariant across login/logout.
    ///
    /// Assertions:
    /// - Every field is present after login.
    /// - Every field is absent after logout and the store reports expired.
    /// - The persisted record is cleared.
    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_every_field() {
        let (store, persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;

        assert!(store.is_authenticated());
        assert!(store.access_token().is_some());
        assert!(persistence.record().is_some_and(|r| r.is_authenticated));

        store.logout().await;

        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.expires_at().is_none());
        assert!(store.is_expired());
        assert!(persistence.record().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_is_idempotent() {
        let (store, persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;

        store.logout().await;
        let after_first = store.status();
        store.logout().await;

        assert_eq!(store.status(), after_first);
        assert_eq!(persistence.clear_count(), 1);
    }

    /// Validates that session replacement and end cancel the session scope.
    ///
    /// Assertions:
    /// - Replacing the session cancels the old scope and opens a new one.
    /// - Logout cancels the live scope.
    #[tokio::test(start_paused = true)]
    async fn test_scope_cancelled_on_replacement_and_logout() {
        let (store, _persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let first = store.status();
        let first_scope = store.scope_for(first.generation).unwrap();

        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let second = store.status();
        let second_scope = store.scope_for(second.generation).unwrap();

        assert!(first_scope.is_cancelled());
        assert!(!second_scope.is_cancelled());
        assert!(store.scope_for(first.generation).is_none());

        store.logout().await;
        assert!(second_scope.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_tokens_without_session_is_noop() {
        let (store, persistence, clock) = store();

        store.update_tokens(sample_grant(clock.as_ref(), Duration::from_secs(900), 1)).await;

        assert!(!store.is_authenticated());
        assert_eq!(persistence.save_count(), 0);
    }

    /// Validates that expiry never moves backwards across refreshes.
    ///
    /// Assertions:
    /// - Tokens are replaced even when the grant expires earlier.
    /// - `expires_at` keeps the later value.
    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_monotonic() {
        let (store, _persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let original = store.expires_at().unwrap();

        store.update_tokens(sample_grant(clock.as_ref(), Duration::from_secs(60), 1)).await;
        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.expires_at(), Some(original));

        store.update_tokens(sample_grant(clock.as_ref(), Duration::from_secs(1800), 2)).await;
        assert!(store.expires_at().unwrap() > original);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_for_superseded_generation_is_rejected() {
        let (store, _persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let stale = store.status().generation;
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;

        let applied = store
            .update_tokens_if_current(stale, sample_grant(clock.as_ref(), Duration::from_secs(900), 7))
            .await;

        assert!(!applied);
        assert_eq!(store.access_token().as_deref(), Some("access-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_only_ends_matching_generation() {
        let (store, _persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let generation = store.status().generation;

        assert!(!store.end_session(generation + 5).await);
        assert!(store.is_authenticated());
        assert!(store.end_session(generation).await);
        assert!(!store.end_session(generation).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_user_keeps_tokens() {
        let (store, _persistence, clock) = store();
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let mut user = store.user().unwrap();
        user.email_verified = true;
        user.display_name = "Ada L.".into();

        store.set_user(user.clone()).await;

        assert_eq!(store.user(), Some(user));
        assert_eq!(store.access_token().as_deref(), Some("access-0"));
    }

    /// Validates the expired-session-on-restore scenario.
    ///
    /// Assertions:
    /// - A record whose expiry is in the past restores as logged out.
    /// - The stale token is not readable from the store.
    /// - The persisted record is cleared.
    #[tokio::test(start_paused = true)]
    async fn test_restore_expired_session_logs_out() {
        let clock = Arc::new(MockClock::new());
        let expired = sample_session(clock.as_ref(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(120));
        let persistence =
            Arc::new(InMemorySessionPersistence::with_record(PersistedSession::from(&expired)));

        let store = SessionStore::restore(persistence.clone(), clock.clone()).await;

        assert!(!store.is_authenticated());
        assert!(store.access_token().is_none());
        assert!(!store.status().authenticated);
        assert!(persistence.record().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_valid_session() {
        let clock = Arc::new(MockClock::new());
        let session = sample_session(clock.as_ref(), Duration::from_secs(600));
        let persistence =
            Arc::new(InMemorySessionPersistence::with_record(PersistedSession::from(&session)));

        let store = SessionStore::restore(persistence, clock.clone()).await;

        assert_eq!(store.snapshot(), Some(session));
        let status = store.status();
        assert!(status.authenticated);
        assert!(store.scope_for(status.generation).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_tolerates_load_failure() {
        let persistence = Arc::new(InMemorySessionPersistence::failing_load());
        let store = SessionStore::restore(persistence, Arc::new(MockClock::new())).await;
        assert!(!store.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_published_to_subscribers() {
        let (store, _persistence, clock) = store();
        let mut rx = store.subscribe();

        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().authenticated);

        store.logout().await;
        let status = *rx.borrow_and_update();
        assert!(!status.authenticated);
        assert_eq!(status.generation, 2);
    }
}
