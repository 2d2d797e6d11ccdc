//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ACTIVITY_DEBOUNCE_MS, DEFAULT_API_TIMEOUT_SECS, DEFAULT_EXPIRY_POLL_INTERVAL_SECS,
    DEFAULT_EXPIRY_WARNING_LEAD_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_IDLE_WARNING_LEAD_SECS,
    DEFAULT_KEYCHAIN_ACCOUNT, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_RENEWAL_CHECK_INTERVAL_SECS,
    DEFAULT_RENEWAL_LEAD_SECS, DEFAULT_RETRY_LEDGER_TTL_SECS, DEFAULT_SESSION_FILE,
};
use crate::errors::{MemberdeskError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns `MemberdeskError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(MemberdeskError::Config("api.base_url must not be empty".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(MemberdeskError::Config("api.timeout_secs must be positive".into()));
        }
        self.session.validate()
    }
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

const fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

/// Session lifecycle timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity period after which the user is logged out
    pub idle_timeout_secs: u64,
    /// How long before the idle logout the warning appears
    pub idle_warning_lead_secs: u64,
    /// Whether the idle watchdog runs at all
    pub idle_enabled: bool,
    /// Activity signals are coalesced to at most one per this many millis
    pub activity_debounce_ms: u64,
    /// Renew when the access token expires within this lead time
    pub renewal_lead_secs: u64,
    /// How often the proactive renewal check runs
    pub renewal_check_interval_secs: u64,
    /// Show the "stay logged in" prompt this long before expiry
    pub expiry_warning_lead_secs: u64,
    /// How often the expiry prompt is re-evaluated
    pub expiry_poll_interval_secs: u64,
    /// How long a retry-ledger entry may outlive an unsettled call
    pub retry_ledger_ttl_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub const fn idle_warning_lead(&self) -> Duration {
        Duration::from_secs(self.idle_warning_lead_secs)
    }

    #[must_use]
    pub const fn activity_debounce(&self) -> Duration {
        Duration::from_millis(self.activity_debounce_ms)
    }

    #[must_use]
    pub const fn renewal_lead(&self) -> Duration {
        Duration::from_secs(self.renewal_lead_secs)
    }

    #[must_use]
    pub const fn renewal_check_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_check_interval_secs)
    }

    #[must_use]
    pub const fn expiry_warning_lead(&self) -> Duration {
        Duration::from_secs(self.expiry_warning_lead_secs)
    }

    #[must_use]
    pub const fn expiry_poll_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_poll_interval_secs)
    }

    #[must_use]
    pub const fn retry_ledger_ttl(&self) -> Duration {
        Duration::from_secs(self.retry_ledger_ttl_secs)
    }

    /// Check timing constraints
    ///
    /// # Errors
    /// Returns `MemberdeskError::Config` when an interval is zero or the idle
    /// warning would not precede the idle logout.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("renewal_check_interval_secs", self.renewal_check_interval_secs),
            ("expiry_poll_interval_secs", self.expiry_poll_interval_secs),
            ("retry_ledger_ttl_secs", self.retry_ledger_ttl_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(MemberdeskError::Config(format!("session.{name} must be positive")));
        }
        if self.idle_warning_lead_secs >= self.idle_timeout_secs {
            return Err(MemberdeskError::Config(format!(
                "session.idle_warning_lead_secs ({}) must be smaller than idle_timeout_secs ({})",
                self.idle_warning_lead_secs, self.idle_timeout_secs
            )));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            idle_warning_lead_secs: DEFAULT_IDLE_WARNING_LEAD_SECS,
            idle_enabled: true,
            activity_debounce_ms: DEFAULT_ACTIVITY_DEBOUNCE_MS,
            renewal_lead_secs: DEFAULT_RENEWAL_LEAD_SECS,
            renewal_check_interval_secs: DEFAULT_RENEWAL_CHECK_INTERVAL_SECS,
            expiry_warning_lead_secs: DEFAULT_EXPIRY_WARNING_LEAD_SECS,
            expiry_poll_interval_secs: DEFAULT_EXPIRY_POLL_INTERVAL_SECS,
            retry_ledger_ttl_secs: DEFAULT_RETRY_LEDGER_TTL_SECS,
        }
    }
}

/// Where the session record is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    File,
    Keychain,
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    /// Record path for the `file` backend
    pub path: String,
    pub keychain_service: String,
    pub keychain_account: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::File,
            path: DEFAULT_SESSION_FILE.to_string(),
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            keychain_account: DEFAULT_KEYCHAIN_ACCOUNT.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}
