//! Session error types

use memberdesk_domain::MemberdeskError;
use thiserror::Error;

/// Outcome of a failed refresh exchange
///
/// `Clone` so one outcome can be handed to every caller waiting on the same
/// in-flight exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No refresh token available (not authenticated)
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Server rejected the refresh token
    #[error("Refresh token rejected: {0}")]
    InvalidRefreshToken(String),

    /// Exchange could not be completed
    #[error("Refresh exchange failed: {0}")]
    Transport(String),

    /// Session was replaced or ended while the exchange was in flight
    #[error("Session changed while refreshing")]
    Superseded,

    /// Exchange task did not complete
    #[error("Refresh task aborted: {0}")]
    Aborted(String),
}

impl From<RefreshError> for MemberdeskError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NoRefreshToken
            | RefreshError::InvalidRefreshToken(_)
            | RefreshError::Superseded => Self::NotAuthenticated,
            RefreshError::Transport(msg) => Self::Network(msg),
            RefreshError::Aborted(msg) => Self::Internal(msg),
        }
    }
}

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoinFailed(err.to_string())
    }
}

impl From<SchedulerError> for MemberdeskError {
    fn from(err: SchedulerError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
