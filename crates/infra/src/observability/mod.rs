//! Logging setup and the log-backed session notifier
//!
//! `tracing` is used throughout the workspace; this module installs the
//! subscriber for the binary and provides a [`SessionNotifier`] for hosts
//! without a UI.
//!
//! [`SessionNotifier`]: memberdesk_core::SessionNotifier

pub mod logging;
pub mod notifier;

pub use logging::init_logging;
pub use notifier::TracingNotifier;
