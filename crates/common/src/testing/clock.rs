//! Deterministic wall clock for tests
//!
//! [`MockClock`] derives its wall time from `tokio::time::Instant`, so in a
//! test running with a paused runtime (`#[tokio::test(start_paused = true)]`)
//! the wall clock and every tokio timer advance together. [`MockClock::advance`]
//! adds an extra jump that timers do not see, which models a device that was
//! asleep.

#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::time::Clock;

/// Mock clock for deterministic testing
#[derive(Debug, Clone)]
pub struct MockClock {
    base: DateTime<Utc>,
    start: Instant,
    offset: Arc<Mutex<chrono::Duration>>,
}

impl MockClock {
    /// Create a mock clock anchored at a fixed, readable timestamp
    #[must_use]
    pub fn new() -> Self {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);
        Self::starting_at(base)
    }

    /// Create a mock clock anchored at `base`
    #[must_use]
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self { base, start: Instant::now(), offset: Arc::new(Mutex::new(chrono::Duration::zero())) }
    }

    /// Jump the wall clock forward without moving the tokio clock
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += to_chrono(duration);
    }

    /// Wall time `duration` from now
    #[must_use]
    pub fn after(&self, duration: Duration) -> DateTime<Utc> {
        self.now() + to_chrono(duration)
    }

    /// Wall time `duration` ago
    #[must_use]
    pub fn before(&self, duration: Duration) -> DateTime<Utc> {
        self.now() - to_chrono(duration)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.start);
        let elapsed =
            chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed + *self.offset.lock()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}
