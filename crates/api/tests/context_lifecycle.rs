//! Integration tests for AppContext lifecycle
//!
//! Tests verify that AppContext restores the persisted session, starts the
//! timer-driven components, and shuts them down gracefully.

use std::sync::Arc;
use std::time::Duration;

use memberdesk_common::testing::MockClock;
use memberdesk_core::testing::{
    sample_session, InMemorySessionPersistence, RecordingNotifier, ScriptedTransport,
};
use memberdesk_core::{CallResponse, OutgoingCall};
use memberdesk_domain::{Config, PersistedSession, PersistenceBackend, PersistenceConfig};
use memberdesk_lib::context::AppContext;
use serde_json::json;

/// Helper wiring a context from in-memory adapters
async fn create_test_context(
    config: Config,
    persistence: Arc<InMemorySessionPersistence>,
    transport: ScriptedTransport,
    clock: Arc<MockClock>,
) -> memberdesk_domain::Result<AppContext> {
    AppContext::assemble(
        config,
        persistence,
        Arc::new(transport),
        Arc::new(RecordingNotifier::new()),
        clock,
    )
    .await
}

fn persisted(clock: &MockClock, lifetime: Duration) -> PersistedSession {
    PersistedSession::from(&sample_session(clock, lifetime))
}

/// Test that a fresh context starts every component
///
/// This test verifies:
/// - No session is restored from empty persistence
/// - Renewal, expiry and idle components are running
/// - Shutdown stops all of them and is idempotent
#[tokio::test(start_paused = true)]
async fn test_context_creation_starts_components() {
    let clock = Arc::new(MockClock::new());
    let ctx = create_test_context(
        Config::default(),
        Arc::new(InMemorySessionPersistence::new()),
        ScriptedTransport::ok(json!({})),
        clock,
    )
    .await
    .expect("context should assemble");

    assert!(!ctx.store.is_authenticated());
    assert!(ctx.renewal.is_running());
    assert!(ctx.expiry.is_running());
    assert!(ctx.idle.is_running());

    ctx.shutdown().await.expect("first shutdown");
    assert!(!ctx.renewal.is_running());
    assert!(!ctx.expiry.is_running());
    assert!(!ctx.idle.is_running());

    ctx.shutdown().await.expect("second shutdown is a no-op");
}

#[tokio::test(start_paused = true)]
async fn test_idle_watchdog_can_be_disabled() {
    let mut config = Config::default();
    config.session.idle_enabled = false;
    let ctx = create_test_context(
        config,
        Arc::new(InMemorySessionPersistence::new()),
        ScriptedTransport::ok(json!({})),
        Arc::new(MockClock::new()),
    )
    .await
    .expect("context should assemble");

    assert!(!ctx.idle.is_running());
    assert!(ctx.renewal.is_running());

    ctx.shutdown().await.expect("shutdown");
}

/// Test that a valid persisted session is restored
///
/// This test verifies:
/// - The stored tokens become the live session
/// - Authorized calls carry the restored access token
#[tokio::test(start_paused = true)]
async fn test_context_restores_persisted_session() {
    let clock = Arc::new(MockClock::new());
    let record = persisted(&clock, Duration::from_secs(30 * 60));
    let transport = ScriptedTransport::new(|call| {
        let auth = call.header_value("Authorization");
        Ok(CallResponse { status: 200, body: json!({ "auth": auth }) })
    });
    let ctx = create_test_context(
        Config::default(),
        Arc::new(InMemorySessionPersistence::with_record(record)),
        transport,
        clock,
    )
    .await
    .expect("context should assemble");

    assert!(ctx.session.is_authenticated());
    assert_eq!(ctx.store.access_token().as_deref(), Some("access-0"));
    let response =
        ctx.client.execute(OutgoingCall::get("members", "/members")).await.expect("call");
    assert_eq!(response.body, json!({ "auth": "Bearer access-0" }));

    ctx.shutdown().await.expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_context_discards_expired_session() {
    let clock = Arc::new(MockClock::new());
    let record = persisted(&clock, Duration::from_secs(60));
    clock.advance(Duration::from_secs(120));
    let persistence = Arc::new(InMemorySessionPersistence::with_record(record));

    let ctx = create_test_context(
        Config::default(),
        persistence.clone(),
        ScriptedTransport::ok(json!({})),
        clock,
    )
    .await
    .expect("context should assemble");

    assert!(!ctx.store.is_authenticated());
    assert!(persistence.record().map_or(true, |record| !record.is_authenticated));

    ctx.shutdown().await.expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_record_starts_logged_out() {
    let ctx = create_test_context(
        Config::default(),
        Arc::new(InMemorySessionPersistence::failing_load()),
        ScriptedTransport::ok(json!({})),
        Arc::new(MockClock::new()),
    )
    .await
    .expect("a corrupt record must not prevent startup");

    assert!(!ctx.store.is_authenticated());

    ctx.shutdown().await.expect("shutdown");
}

/// Test the production constructor with the file backend
///
/// No network traffic happens at startup, so an unreachable API is fine.
#[tokio::test]
async fn test_new_with_file_backend() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = Config::default();
    config.api.base_url = "http://127.0.0.1:9".to_string();
    config.persistence = PersistenceConfig {
        backend: PersistenceBackend::File,
        path: dir.path().join("session.json").to_string_lossy().to_string(),
        ..PersistenceConfig::default()
    };

    let ctx = AppContext::new(config).await.expect("context should start");

    assert!(!ctx.session.is_authenticated());
    assert!(ctx.renewal.is_running());

    ctx.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = Config::default();
    config.session.idle_warning_lead_secs = config.session.idle_timeout_secs;

    let result = AppContext::new(config).await;

    assert!(matches!(result, Err(memberdesk_domain::MemberdeskError::Config(_))));
}
