//! # Memberdesk Core
//!
//! Session lifecycle and authorized-call pipeline. Pure logic, no HTTP or
//! filesystem code.
//!
//! This crate contains:
//! - `session`: the session store, single-flight refresh coordinator, and the
//!   timer-driven components (proactive renewal, idle watchdog, expiration
//!   prompt)
//! - `pipeline`: the outgoing call model, authorization and retry
//!   interceptors, and the authorized client
//!
//! ## Architecture Principles
//! - Only depends on `memberdesk-common` and `memberdesk-domain`
//! - All external dependencies via traits (ports)
//! - One `SessionStore` per process, injected into every component

pub mod pipeline;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use pipeline::{
    AuthorizationInterceptor, AuthorizedClient, CallFailure, CallId, CallMethod, CallResponse,
    OutgoingCall, RemoteAuthApi, RetryDecision, RetryLedger, RetryOnAuthFailureInterceptor,
    Transport,
};
pub use session::{
    ActivityKind, ActivitySender, AuthApi, ExpirationNotifier, ExpiryPrompt, IdleWatchdog,
    ProactiveRenewalScheduler, RefreshCoordinator, RefreshError, SchedulerError, SchedulerResult,
    SessionNotifier, SessionPersistence, SessionService, SessionStatus, SessionStore,
    WatchdogState,
};
