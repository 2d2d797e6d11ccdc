//! Wall-clock abstraction for testability
//!
//! Session expiry is an absolute UTC timestamp handed out by the server, so
//! the runtime compares it against wall-clock time rather than a monotonic
//! instant. Routing every "now" through [`Clock`] lets tests substitute
//! [`MockClock`](crate::testing::MockClock), which follows the paused tokio
//! clock.
//!
//! # Examples
//!
//! ```
//! use memberdesk_common::time::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! let now = clock.now();
//! assert!(now.timestamp() > 0);
//! ```

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + 'static {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
