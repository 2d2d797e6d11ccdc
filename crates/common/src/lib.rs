//! Modular common utilities shared across Memberdesk crates.
//!
//! # Feature Tiers
//!
//! - default: time abstractions used by the session runtime ([`time`])
//! - `test-utils`: deterministic clock for tests ([`testing`])

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use time::{ActivityThrottle, Clock, SystemClock};
