//! Integration tests for the call pipeline over real HTTP
//!
//! Wires `HttpTransport`, `RemoteAuthApi`, `RefreshCoordinator` and
//! `AuthorizedClient` against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use memberdesk_common::SystemClock;
use memberdesk_core::testing::{InMemorySessionPersistence, RecordingNotifier};
use memberdesk_core::{
    AuthorizedClient, OutgoingCall, RefreshCoordinator, RemoteAuthApi, SessionService,
    SessionStore,
};
use memberdesk_domain::{LogoutReason, MemberdeskError};
use memberdesk_infra::HttpTransport;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    store: Arc<SessionStore>,
    persistence: Arc<InMemorySessionPersistence>,
    notifier: Arc<RecordingNotifier>,
    client: Arc<AuthorizedClient>,
    service: SessionService,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let persistence = Arc::new(InMemorySessionPersistence::new());
    let store = Arc::new(SessionStore::new(persistence.clone(), Arc::new(SystemClock)));
    let notifier = Arc::new(RecordingNotifier::new());

    let transport = Arc::new(
        HttpTransport::builder(format!("{}/api", server.uri()))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("http transport"),
    );
    let api = Arc::new(RemoteAuthApi::new(transport.clone(), store.clone()));
    let coordinator =
        Arc::new(RefreshCoordinator::new(store.clone(), api.clone(), notifier.clone()));
    let client = Arc::new(AuthorizedClient::new(
        transport,
        store.clone(),
        coordinator,
        Duration::from_secs(60),
    ));
    let service = SessionService::new(store.clone(), api, client.clone(), notifier.clone());

    Harness { server, store, persistence, notifier, client, service }
}

fn token_body(n: u32) -> Value {
    json!({
        "accessToken": format!("access-{n}"),
        "refreshToken": format!("refresh-{n}"),
        "expiresAt": chrono::Utc::now() + chrono::Duration::minutes(15),
    })
}

fn login_body() -> Value {
    let mut body = token_body(1);
    body["user"] = json!({
        "id": "u-42",
        "displayName": "Ada Lovelace",
        "role": "admin",
        "active": true,
        "emailVerified": true,
    });
    body
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "ada", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_persists_session() {
    let h = harness().await;
    mount_login(&h.server).await;

    let user = h.service.login("ada", "secret").await.expect("login");

    assert_eq!(user.id, "u-42");
    assert!(user.is_admin());
    assert_eq!(h.store.access_token().as_deref(), Some("access-1"));
    let record = h.persistence.record().expect("persisted record");
    assert!(record.is_authenticated);
    assert_eq!(record.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_login_with_bad_credentials() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "code": "INVALID_CREDENTIALS", "message": "Bad login" })),
        )
        .mount(&h.server)
        .await;

    let err = h.service.login("ada", "wrong").await.unwrap_err();

    assert_eq!(err, MemberdeskError::InvalidCredentials);
    assert!(!h.store.is_authenticated());
}

/// Validates recovery from an expired access token over HTTP.
///
/// Assertions:
/// - The rejected call triggers one refresh with the stored refresh token.
/// - The call is replayed with the new access token and succeeds.
/// - The rotated tokens are persisted.
#[tokio::test]
async fn test_expired_token_is_refreshed_and_call_replayed() {
    let h = harness().await;
    mount_login(&h.server).await;
    h.service.login("ada", "secret").await.expect("login");

    Mock::given(method("GET"))
        .and(path("/api/members"))
        .and(header("Authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "members": [] })))
        .with_priority(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/members"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "code": "UNAUTHENTICATED", "message": "Token expired" })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(2)))
        .expect(1)
        .mount(&h.server)
        .await;

    let response =
        h.client.execute(OutgoingCall::get("members", "/members")).await.expect("replayed call");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({ "members": [] }));
    assert_eq!(h.store.access_token().as_deref(), Some("access-2"));
    let record = h.persistence.record().expect("persisted record");
    assert_eq!(record.refresh_token.as_deref(), Some("refresh-2"));
    assert!(h.client.ledger().is_empty());
}

/// Validates the logout cascade when the refresh token is revoked.
///
/// Assertions:
/// - The caller sees the original authorization failure.
/// - The session is cleared and one `RefreshFailed` notice is emitted.
#[tokio::test]
async fn test_revoked_refresh_token_ends_session() {
    let h = harness().await;
    mount_login(&h.server).await;
    h.service.login("ada", "secret").await.expect("login");

    Mock::given(method("GET"))
        .and(path("/api/members"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Unauthorized" })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(
                json!({ "code": "INVALID_REFRESH_TOKEN", "message": "Refresh token revoked" }),
            ),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let failure = h.client.execute(OutgoingCall::get("members", "/members")).await.unwrap_err();

    assert_eq!(failure.status, Some(401));
    assert_eq!(failure.message, "Unauthorized");
    assert!(!h.store.is_authenticated());
    assert_eq!(h.notifier.ended_count(), 1);
    assert_eq!(
        h.notifier.events().last().cloned(),
        Some(memberdesk_core::testing::NotifierEvent::SessionEnded(LogoutReason::RefreshFailed))
    );
}

#[tokio::test]
async fn test_refetch_profile_over_http() {
    let h = harness().await;
    mount_login(&h.server).await;
    h.service.login("ada", "secret").await.expect("login");

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-42",
            "displayName": "Ada King",
            "role": "admin",
            "active": true,
            "emailVerified": true,
        })))
        .mount(&h.server)
        .await;

    let user = h.service.refetch_profile().await.expect("profile");

    assert_eq!(user.display_name, "Ada King");
    assert_eq!(h.store.user().map(|u| u.display_name).as_deref(), Some("Ada King"));
    assert_eq!(h.store.access_token().as_deref(), Some("access-1"));
}
