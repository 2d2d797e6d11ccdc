//! Port interfaces for the session lifecycle
//!
//! These traits define the boundaries between the session logic and the
//! infrastructure (durable storage, the remote auth API, the UI surface).

use std::time::Duration;

use async_trait::async_trait;
use memberdesk_domain::{LoginGrant, LogoutReason, PersistedSession, Result, TokenGrant};

use super::error::RefreshError;

/// Durable storage for the single session record
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Load the last persisted record, `None` when nothing was stored
    async fn load(&self) -> Result<Option<PersistedSession>>;

    /// Overwrite the stored record
    async fn save(&self, record: &PersistedSession) -> Result<()>;

    /// Remove the stored record
    async fn clear(&self) -> Result<()>;
}

/// Remote session operations
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a session
    ///
    /// # Errors
    /// `InvalidCredentials`, `AccountInactive`, or a transport error.
    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant>;

    /// Exchange a refresh token for new tokens
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenGrant, RefreshError>;

    /// Server-side logout (best effort)
    async fn logout(&self) -> Result<()>;
}

/// User-facing session notices
///
/// Implementations must be cheap and non-blocking; they are invoked from
/// timer tasks.
pub trait SessionNotifier: Send + Sync {
    /// Persistent dismiss-or-logout warning before an idle logout
    fn show_idle_warning(&self, remaining: Duration);

    fn dismiss_idle_warning(&self);

    /// "Stay logged in / log out now" prompt before token expiry
    fn show_expiry_prompt(&self, remaining: Duration);

    fn dismiss_expiry_prompt(&self);

    /// Short message plus navigation to the login surface
    ///
    /// Called exactly once per ended session.
    fn session_ended(&self, reason: LogoutReason);
}
