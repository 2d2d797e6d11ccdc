//! HTTP transport for the call pipeline

pub mod transport;

pub use transport::{HttpTransport, HttpTransportBuilder};
