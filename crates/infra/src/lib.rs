//! # Memberdesk Infrastructure
//!
//! Infrastructure implementations of the core session ports.
//!
//! This crate contains:
//! - Configuration loading (environment variables, TOML/JSON files)
//! - HTTP transport for the call pipeline (`reqwest`)
//! - Session persistence (JSON file, platform keychain)
//! - Logging setup and the log-backed session notifier
//!
//! ## Architecture
//! - Implements traits defined in `memberdesk-core`
//! - Contains all "impure" code (I/O, network, keychain)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod persistence;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpTransport, HttpTransportBuilder};
pub use observability::{init_logging, TracingNotifier};
pub use persistence::{JsonFileSessionPersistence, KeychainSessionPersistence};
