//! Session lifecycle
//!
//! [`SessionStore`] is the single shared mutable resource. Every other
//! component reads it and mutates it only through its operations.

pub mod error;
pub mod expiration;
pub mod idle;
pub mod lifecycle;
pub mod ports;
pub mod refresh;
pub mod renewal;
pub mod service;
pub mod store;

pub use error::{RefreshError, SchedulerError, SchedulerResult};
pub use expiration::{ExpirationNotifier, ExpiryConfig, ExpiryPrompt};
pub use idle::{ActivityKind, ActivitySender, IdleConfig, IdleWatchdog, WatchdogState};
pub use lifecycle::SessionScope;
pub use ports::{AuthApi, SessionNotifier, SessionPersistence};
pub use refresh::RefreshCoordinator;
pub use renewal::{ProactiveRenewalScheduler, RenewalCheck, RenewalConfig};
pub use service::SessionService;
pub use store::{SessionStatus, SessionStore};
