//! Testing utilities and helpers
//!
//! - **[`clock`]**: [`MockClock`], a wall clock that follows the tokio clock
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use memberdesk_common::testing::MockClock;
//! use memberdesk_common::Clock;
//!
//! let clock = MockClock::new();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!((clock.now() - before).num_seconds(), 5);
//! ```

pub mod clock;

// Re-export commonly used items
pub use clock::MockClock;
