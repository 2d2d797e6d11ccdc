//! Session notices written to the log

use std::time::Duration;

use memberdesk_core::SessionNotifier;
use memberdesk_domain::LogoutReason;
use tracing::{info, warn};

/// [`SessionNotifier`] for headless hosts
///
/// Each notice becomes one structured log event carrying the user-facing
/// message.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl SessionNotifier for TracingNotifier {
    fn show_idle_warning(&self, remaining: Duration) {
        warn!(
            remaining_secs = remaining.as_secs(),
            "You will be logged out soon due to inactivity"
        );
    }

    fn dismiss_idle_warning(&self) {
        info!("Inactivity warning dismissed");
    }

    fn show_expiry_prompt(&self, remaining: Duration) {
        warn!(remaining_secs = remaining.as_secs(), "Your session is about to expire");
    }

    fn dismiss_expiry_prompt(&self) {
        info!("Session expiry prompt dismissed");
    }

    fn session_ended(&self, reason: LogoutReason) {
        info!(reason = %reason, "{}", reason.user_message());
    }
}
