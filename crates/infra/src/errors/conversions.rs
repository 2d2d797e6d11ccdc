//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use memberdesk_domain::MemberdeskError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MemberdeskError);

impl From<InfraError> for MemberdeskError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MemberdeskError> for InfraError {
    fn from(value: MemberdeskError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoMemberdeskError {
    fn into_memberdesk(self) -> MemberdeskError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → MemberdeskError */
/* -------------------------------------------------------------------------- */

impl IntoMemberdeskError for KeyringError {
    fn into_memberdesk(self) -> MemberdeskError {
        use KeyringError::{
            Ambiguous, BadEncoding, Invalid, NoEntry, NoStorageAccess, PlatformFailure, TooLong,
        };

        let description = self.to_string();

        match self {
            NoEntry => MemberdeskError::Persistence("keychain entry not found".into()),
            BadEncoding(_) => {
                MemberdeskError::Persistence("session in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => MemberdeskError::Persistence(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => MemberdeskError::Persistence(format!(
                "keychain attribute '{attr}' is invalid: {reason}"
            )),
            Ambiguous(entries) => MemberdeskError::Persistence(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => {
                MemberdeskError::Persistence(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                MemberdeskError::Persistence(format!("unable to access secure storage: {err}"))
            }
            _ => MemberdeskError::Persistence(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_memberdesk())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MemberdeskError */
/* -------------------------------------------------------------------------- */

impl IntoMemberdeskError for HttpError {
    fn into_memberdesk(self) -> MemberdeskError {
        if self.is_timeout() {
            return MemberdeskError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return MemberdeskError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 => MemberdeskError::NotAuthenticated,
                403 => MemberdeskError::Auth(message),
                _ => MemberdeskError::Network(message),
            };
        }

        MemberdeskError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_memberdesk())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → MemberdeskError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(MemberdeskError::Persistence(format!("I/O failure: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(MemberdeskError::Persistence(format!("malformed session record: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
