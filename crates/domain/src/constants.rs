//! Application constants
//!
//! Centralized location for operation names, wire paths and timing defaults
//! used by the session runtime.

// Operation names
pub const OP_LOGIN: &str = "login";
pub const OP_REGISTER: &str = "register";
pub const OP_PASSWORD_RESET_REQUEST: &str = "requestPasswordReset";
pub const OP_PASSWORD_RESET_CONFIRM: &str = "resetPassword";
pub const OP_VERIFY_EMAIL: &str = "verifyEmail";
pub const OP_RESEND_VERIFICATION: &str = "resendVerificationEmail";
pub const OP_REFRESH: &str = "refreshToken";
pub const OP_LOGOUT: &str = "logout";
pub const OP_CURRENT_USER: &str = "me";

/// Operations sent without a bearer credential
pub const PUBLIC_OPERATIONS: &[&str] = &[
    OP_LOGIN,
    OP_REGISTER,
    OP_PASSWORD_RESET_REQUEST,
    OP_PASSWORD_RESET_CONFIRM,
    OP_VERIFY_EMAIL,
    OP_RESEND_VERIFICATION,
    OP_REFRESH,
];

/// Operations whose authorization failures are never refreshed and replayed
pub const NO_RETRY_OPERATIONS: &[&str] = &[
    OP_LOGIN,
    OP_REGISTER,
    OP_REFRESH,
    OP_PASSWORD_RESET_REQUEST,
    OP_PASSWORD_RESET_CONFIRM,
    OP_VERIFY_EMAIL,
];

/// Server error codes that mean "unauthenticated/unauthorized"
pub const AUTH_FAILURE_CODES: &[&str] = &["UNAUTHENTICATED", "UNAUTHORIZED"];

// Server error codes for the session exchanges
pub const CODE_INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
pub const CODE_ACCOUNT_INACTIVE: &str = "ACCOUNT_INACTIVE";
pub const CODE_INVALID_REFRESH_TOKEN: &str = "INVALID_REFRESH_TOKEN";

// Wire paths
pub const PATH_LOGIN: &str = "/auth/login";
pub const PATH_REFRESH: &str = "/auth/refresh";
pub const PATH_LOGOUT: &str = "/auth/logout";
pub const PATH_CURRENT_USER: &str = "/auth/me";

// Headers
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";

// Timing defaults (seconds unless noted)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_IDLE_WARNING_LEAD_SECS: u64 = 60;
pub const DEFAULT_ACTIVITY_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_RENEWAL_LEAD_SECS: u64 = 5 * 60;
pub const DEFAULT_RENEWAL_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_EXPIRY_WARNING_LEAD_SECS: u64 = 2 * 60;
pub const DEFAULT_EXPIRY_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_RETRY_LEDGER_TTL_SECS: u64 = 60;
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

// Persistence defaults
pub const DEFAULT_SESSION_FILE: &str = "memberdesk-session.json";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Memberdesk.session";
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "main";
