//! Leading-edge throttle
//!
//! Admits the first event immediately, then suppresses further events until
//! the window has elapsed. Suppressed events are remembered so the caller can
//! schedule one trailing action at [`ActivityThrottle::window_end`].

use std::time::Duration;

use tokio::time::Instant;

/// Coalesces bursts of events to at most one per window
#[derive(Debug, Clone)]
pub struct ActivityThrottle {
    window: Duration,
    last_admitted: Option<Instant>,
    suppressed: bool,
}

impl ActivityThrottle {
    /// Create a throttle with the given window
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, last_admitted: None, suppressed: false }
    }

    /// Offer an event observed at `now`
    ///
    /// Returns `true` when the event should be acted on. A `false` return
    /// marks a trailing event as pending.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.saturating_duration_since(last) < self.window => {
                self.suppressed = true;
                false
            }
            _ => {
                self.last_admitted = Some(now);
                self.suppressed = false;
                true
            }
        }
    }

    /// Deadline for the pending trailing event, if any
    #[must_use]
    pub fn window_end(&self) -> Option<Instant> {
        if !self.suppressed {
            return None;
        }
        self.last_admitted.map(|last| last + self.window)
    }

    /// Consume the pending trailing event at `now`
    ///
    /// Returns `true` if an event had been suppressed and is now admitted.
    pub fn flush(&mut self, now: Instant) -> bool {
        if !self.suppressed {
            return false;
        }
        self.suppressed = false;
        self.last_admitted = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_is_admitted() {
        let mut throttle = ActivityThrottle::new(Duration::from_secs(1));
        assert!(throttle.admit(Instant::now()));
        assert!(throttle.window_end().is_none());
    }

    #[test]
    fn events_inside_window_are_suppressed_and_marked_trailing() {
        let start = Instant::now();
        let mut throttle = ActivityThrottle::new(Duration::from_secs(1));

        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_millis(200)));
        assert!(!throttle.admit(start + Duration::from_millis(900)));
        assert_eq!(throttle.window_end(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn event_after_window_is_admitted_and_clears_trailing() {
        let start = Instant::now();
        let mut throttle = ActivityThrottle::new(Duration::from_secs(1));

        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_millis(500)));
        assert!(throttle.admit(start + Duration::from_millis(1500)));
        assert!(throttle.window_end().is_none());
    }

    #[test]
    fn flush_only_fires_when_something_was_suppressed() {
        let start = Instant::now();
        let mut throttle = ActivityThrottle::new(Duration::from_secs(1));

        assert!(!throttle.flush(start));
        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_millis(10)));
        assert!(throttle.flush(start + Duration::from_secs(1)));
        assert!(!throttle.flush(start + Duration::from_secs(1)));
    }
}
