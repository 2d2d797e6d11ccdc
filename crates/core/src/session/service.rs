//! Session service - login, logout and profile use cases

use std::sync::Arc;

use memberdesk_domain::constants::{OP_CURRENT_USER, PATH_CURRENT_USER};
use memberdesk_domain::{LogoutReason, MemberdeskError, Result, User};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::ports::{AuthApi, SessionNotifier};
use super::store::{SessionStatus, SessionStore};
use crate::pipeline::retry::is_auth_failure;
use crate::pipeline::AuthorizedClient;

/// Facade used by the UI layer
pub struct SessionService {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    client: Arc<AuthorizedClient>,
    notifier: Arc<dyn SessionNotifier>,
}

impl SessionService {
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn AuthApi>,
        client: Arc<AuthorizedClient>,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Self {
        Self { store, api, client, notifier }
    }

    /// Authenticate and start a new session
    ///
    /// # Errors
    /// `InvalidCredentials`, `AccountInactive`, or a network error. The
    /// current session is left untouched on failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let grant = self.api.login(username, password).await?;
        if !grant.user.active {
            warn!(user = %grant.user.id, "Login rejected for inactive account");
            return Err(MemberdeskError::AccountInactive);
        }

        let user = grant.user.clone();
        self.store.login(grant.into_session()).await;
        info!(user = %user.id, role = ?user.role, "User logged in");
        Ok(user)
    }

    /// End the session
    ///
    /// The server-side logout is best effort; the local session always ends.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let status = self.store.status();
        if !status.authenticated {
            return;
        }

        if let Err(err) = self.api.logout().await {
            warn!(error = %err, "Server-side logout failed; continuing with local logout");
        }
        if self.store.end_session(status.generation).await {
            self.notifier.session_ended(LogoutReason::UserRequested);
        }
    }

    /// Reload the user record from the server without touching tokens
    ///
    /// # Errors
    /// `NotAuthenticated` when there is no session or the server rejects
    /// the credentials, `Network` for any other failure.
    #[instrument(skip(self))]
    pub async fn refetch_profile(&self) -> Result<User> {
        if !self.store.is_authenticated() {
            return Err(MemberdeskError::NotAuthenticated);
        }

        let user: User =
            self.client.get(OP_CURRENT_USER, PATH_CURRENT_USER).await.map_err(|failure| {
                if is_auth_failure(&failure) {
                    MemberdeskError::NotAuthenticated
                } else {
                    MemberdeskError::Network(failure.to_string())
                }
            })?;

        self.store.set_user(user.clone()).await;
        Ok(user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.store.user()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}
