//! Session and credential types
//!
//! A [`Session`] always carries every field; there is no partially populated
//! session value. The persisted form ([`PersistedSession`]) keeps the flat
//! record layout and converts back only when every field is present.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use super::user::User;

/// Live authenticated session
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the access token is expired at `now` (`now >= expires_at`)
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Signed time left on the access token; negative once expired
    #[must_use]
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at - now
    }
}

// Tokens never reach logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful refresh exchange
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant").field("expires_at", &self.expires_at).finish_non_exhaustive()
    }
}

/// Result of a successful login exchange
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl LoginGrant {
    #[must_use]
    pub fn into_session(self) -> Session {
        Session {
            user: self.user,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("user", &self.user.id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Durable session record
///
/// Layout: `{ user, accessToken, refreshToken, expiresAt, isAuthenticated }`.
/// An empty record (`isAuthenticated = false`, everything else absent) is
/// what a logged-out process persists.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl PersistedSession {
    /// Record for a logged-out process
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuild a live session
    ///
    /// Returns `None` unless the record is marked authenticated and every
    /// field is present, so a damaged record can never yield a partial
    /// session.
    #[must_use]
    pub fn into_session(self) -> Option<Session> {
        if !self.is_authenticated {
            return None;
        }
        Some(Session {
            user: self.user?,
            access_token: self.access_token.filter(|t| !t.is_empty())?,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty())?,
            expires_at: self.expires_at?,
        })
    }
}

impl fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |token: &Option<String>| token.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("PersistedSession")
            .field("user", &self.user.as_ref().map(|user| &user.id))
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("is_authenticated", &self.is_authenticated)
            .finish()
    }
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            user: Some(session.user.clone()),
            access_token: Some(session.access_token.clone()),
            refresh_token: Some(session.refresh_token.clone()),
            expires_at: Some(session.expires_at),
            is_authenticated: true,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    UserRequested,
    IdleTimeout,
    Expired,
    RefreshFailed,
}

impl LogoutReason {
    /// Short message shown once when the session ends
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::UserRequested => "You have been logged out.",
            Self::IdleTimeout => "Your session ended due to inactivity. Please log in again.",
            Self::Expired => "Your session has expired. Please log in again.",
            Self::RefreshFailed => "Your session could not be renewed. Please log in again.",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserRequested => "user_requested",
            Self::IdleTimeout => "idle_timeout",
            Self::Expired => "expired",
            Self::RefreshFailed => "refresh_failed",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::user::Role;

    fn session() -> Session {
        Session {
            user: User {
                id: "u-1".into(),
                display_name: "Ada".into(),
                role: Role::Standard,
                active: true,
                email_verified: true,
                last_login_at: None,
            },
            access_token: "access-secret".into(),
            refresh_token: "refresh-secret".into(),
            expires_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_expiry_boundary_counts_as_expired() {
        let session = session();
        assert!(session.is_expired_at(session.expires_at));
        assert!(!session.is_expired_at(session.expires_at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", session());
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_persisted_record_debug_redacts_tokens() {
        let rendered = format!("{:?}", PersistedSession::from(&session()));
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));
        assert!(rendered.contains("[REDACTED]"));

        let rendered = format!("{:?}", PersistedSession::empty());
        assert!(rendered.contains("access_token: None"));
    }

    #[test]
    fn test_persisted_record_layout() {
        let record = PersistedSession::from(&session());
        let json = serde_json::to_value(&record).unwrap();

        for key in ["user", "accessToken", "refreshToken", "expiresAt", "isAuthenticated"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(record.into_session(), Some(session()));
    }

    #[test]
    fn test_partial_record_never_yields_session() {
        let mut record = PersistedSession::from(&session());
        record.refresh_token = None;
        assert!(record.into_session().is_none());

        let mut record = PersistedSession::from(&session());
        record.is_authenticated = false;
        assert!(record.into_session().is_none());

        assert!(PersistedSession::empty().into_session().is_none());
    }

    #[test]
    fn test_empty_record_deserializes_from_bare_flag() {
        let record: PersistedSession =
            serde_json::from_str(r#"{"isAuthenticated":false}"#).unwrap();
        assert_eq!(record, PersistedSession::empty());
    }
}
