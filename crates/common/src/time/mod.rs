//! Time utilities and abstractions
//!
//! - **[`clock`]**: wall-clock abstraction used for expiry arithmetic
//! - **[`throttle`]**: leading-edge throttle for coalescing bursts of events
//!
//! Timers themselves are plain `tokio::time` sleeps and intervals so that
//! tests can drive them with a paused runtime clock.

pub mod clock;
pub mod throttle;

// Re-export commonly used items
pub use clock::{Clock, SystemClock};
pub use throttle::ActivityThrottle;
