//! Authorized-call pipeline
//!
//! ```text
//! OutgoingCall ─▶ AuthorizationInterceptor ─▶ Transport ─┬─▶ response
//!                        ▲                               │
//!                        └── replay once ◀── RetryOnAuthFailureInterceptor
//!                                              (RefreshCoordinator)
//! ```

pub mod authorization;
pub mod call;
pub mod client;
pub mod remote;
pub mod retry;

pub use authorization::{is_public_operation, Authorization, AuthorizationInterceptor};
pub use call::{CallFailure, CallId, CallMethod, CallResponse, OutgoingCall, Transport};
pub use client::AuthorizedClient;
pub use remote::RemoteAuthApi;
pub use retry::{
    is_auth_failure, is_retryable_operation, RetryDecision, RetryLedger,
    RetryOnAuthFailureInterceptor,
};
