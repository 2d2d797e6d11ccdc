//! Session exchanges over the call pipeline
//!
//! [`RemoteAuthApi`] sends login, refresh and logout through the
//! authorization interceptor and the transport directly. It never goes
//! through the retry interceptor, so a failed refresh can not trigger
//! another refresh.

use std::sync::Arc;

use async_trait::async_trait;
use memberdesk_domain::constants::{
    CODE_ACCOUNT_INACTIVE, CODE_INVALID_CREDENTIALS, CODE_INVALID_REFRESH_TOKEN, OP_LOGIN,
    OP_LOGOUT, OP_REFRESH, PATH_LOGIN, PATH_LOGOUT, PATH_REFRESH,
};
use memberdesk_domain::{LoginGrant, MemberdeskError, Result, TokenGrant};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use super::authorization::AuthorizationInterceptor;
use super::call::{CallFailure, CallResponse, OutgoingCall, Transport};
use crate::session::{AuthApi, RefreshError, SessionStore};

/// [`AuthApi`] backed by a [`Transport`]
pub struct RemoteAuthApi {
    transport: Arc<dyn Transport>,
    authorization: AuthorizationInterceptor,
}

impl RemoteAuthApi {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<SessionStore>) -> Self {
        Self { transport, authorization: AuthorizationInterceptor::new(store) }
    }

    async fn send(
        &self,
        mut call: OutgoingCall,
    ) -> std::result::Result<CallResponse, CallFailure> {
        self.authorization.authorize(&mut call);
        self.transport.send(&call).await
    }
}

fn has_code(failure: &CallFailure, code: &str) -> bool {
    failure.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(code))
}

fn login_error(failure: CallFailure) -> MemberdeskError {
    if failure.status == Some(401) || has_code(&failure, CODE_INVALID_CREDENTIALS) {
        MemberdeskError::InvalidCredentials
    } else if failure.status == Some(403) || has_code(&failure, CODE_ACCOUNT_INACTIVE) {
        MemberdeskError::AccountInactive
    } else {
        MemberdeskError::Network(failure.message)
    }
}

fn refresh_error(failure: CallFailure) -> RefreshError {
    let rejected = matches!(failure.status, Some(400 | 401 | 403))
        || has_code(&failure, CODE_INVALID_REFRESH_TOKEN);
    if rejected {
        RefreshError::InvalidRefreshToken(failure.message)
    } else {
        RefreshError::Transport(failure.message)
    }
}

fn decode<T: DeserializeOwned>(response: CallResponse) -> std::result::Result<T, String> {
    serde_json::from_value(response.body).map_err(|err| format!("malformed response: {err}"))
}

#[async_trait]
impl AuthApi for RemoteAuthApi {
    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant> {
        let call = OutgoingCall::post(OP_LOGIN, PATH_LOGIN)
            .with_body(json!({ "username": username, "password": password }));
        let response = self.send(call).await.map_err(login_error)?;
        decode(response).map_err(MemberdeskError::Auth)
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenGrant, RefreshError> {
        let call = OutgoingCall::post(OP_REFRESH, PATH_REFRESH)
            .with_body(json!({ "refreshToken": refresh_token }))
            .bypassing_auth();
        let response = self.send(call).await.map_err(refresh_error)?;
        decode(response).map_err(RefreshError::Transport)
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<()> {
        let call = OutgoingCall::post(OP_LOGOUT, PATH_LOGOUT);
        self.send(call).await.map_err(|failure| MemberdeskError::Network(failure.message))?;
        debug!("Server-side logout acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for pipeline::remote.
    use std::time::Duration;

    use memberdesk_common::testing::MockClock;
    use memberdesk_common::Clock;

    use super::*;
    use crate::testing::{
        sample_session, sample_user, InMemorySessionPersistence, ScriptedTransport,
    };

    async fn remote(
        transport: ScriptedTransport,
    ) -> (RemoteAuthApi, Arc<ScriptedTransport>, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let store =
            Arc::new(SessionStore::new(Arc::new(InMemorySessionPersistence::new()), clock.clone()));
        store.login(sample_session(clock.as_ref(), Duration::from_secs(900))).await;
        let transport = Arc::new(transport);
        (RemoteAuthApi::new(transport.clone(), store), transport, clock)
    }

    fn failing(status: Option<u16>, code: Option<&'static str>) -> ScriptedTransport {
        ScriptedTransport::new(move |_| {
            Err::<CallResponse, _>(CallFailure::new(status, code, "rejected"))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_decodes_grant_without_bearer() {
        let clock = MockClock::new();
        let expires_at = clock.now() + chrono::Duration::minutes(15);
        let body = json!({
            "user": serde_json::to_value(sample_user()).unwrap(),
            "accessToken": "access-9",
            "refreshToken": "refresh-9",
            "expiresAt": expires_at,
        });
        let (api, transport, _clock) = remote(ScriptedTransport::ok(body)).await;

        let grant = api.login("ada", "secret").await.unwrap();

        assert_eq!(grant.access_token, "access-9");
        assert_eq!(grant.user, sample_user());
        let calls = transport.calls();
        assert_eq!(calls[0].path, PATH_LOGIN);
        assert!(calls[0].header_value("Authorization").is_none());
        assert_eq!(calls[0].body, Some(json!({ "username": "ada", "password": "secret" })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_error_mapping() {
        let (api, _, _) = remote(failing(Some(401), None)).await;
        assert_eq!(api.login("ada", "x").await.unwrap_err(), MemberdeskError::InvalidCredentials);

        let (api, _, _) = remote(failing(Some(400), Some("INVALID_CREDENTIALS"))).await;
        assert_eq!(api.login("ada", "x").await.unwrap_err(), MemberdeskError::InvalidCredentials);

        let (api, _, _) = remote(failing(Some(403), None)).await;
        assert_eq!(api.login("ada", "x").await.unwrap_err(), MemberdeskError::AccountInactive);

        let (api, _, _) = remote(failing(None, None)).await;
        assert!(matches!(api.login("ada", "x").await, Err(MemberdeskError::Network(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_bypasses_authorization() {
        let clock = MockClock::new();
        let body = json!({
            "accessToken": "access-2",
            "refreshToken": "refresh-2",
            "expiresAt": clock.now() + chrono::Duration::minutes(15),
        });
        let (api, transport, _clock) = remote(ScriptedTransport::ok(body)).await;

        let grant = api.refresh("refresh-0").await.unwrap();

        assert_eq!(grant.refresh_token, "refresh-2");
        let calls = transport.calls();
        assert!(calls[0].bypass_auth);
        assert!(calls[0].header_value("Authorization").is_none());
        assert_eq!(calls[0].body, Some(json!({ "refreshToken": "refresh-0" })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_mapping() {
        for status in [400, 401, 403] {
            let (api, _, _) = remote(failing(Some(status), None)).await;
            assert!(matches!(
                api.refresh("refresh-0").await,
                Err(RefreshError::InvalidRefreshToken(_))
            ));
        }

        let (api, _, _) = remote(failing(Some(200), Some("INVALID_REFRESH_TOKEN"))).await;
        assert!(matches!(api.refresh("r").await, Err(RefreshError::InvalidRefreshToken(_))));

        let (api, _, _) = remote(failing(Some(502), None)).await;
        assert!(matches!(api.refresh("r").await, Err(RefreshError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_carries_bearer() {
        let (api, transport, _clock) = remote(ScriptedTransport::ok(json!({}))).await;

        api.logout().await.unwrap();

        assert_eq!(transport.calls()[0].header_value("Authorization"), Some("Bearer access-0"));
    }
}
