//! # Memberdesk App
//!
//! Application layer - dependency wiring and main entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Main entry point and setup
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires the session ports to their infrastructure adapters

pub mod context;

pub use context::AppContext;
