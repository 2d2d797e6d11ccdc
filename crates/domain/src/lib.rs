//! # Memberdesk Domain
//!
//! Session domain types and models for Memberdesk.
//!
//! This crate contains:
//! - Identity and session types (`User`, `Session`, token grants)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Operation names and timing defaults
//!
//! ## Architecture
//! - No dependencies on other Memberdesk crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
