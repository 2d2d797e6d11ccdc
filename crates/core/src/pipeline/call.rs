//! Outgoing call model
//!
//! Every request to the remote API is an [`OutgoingCall`] carrying a stable
//! [`CallId`], generated once when the call is built and kept across the
//! retry path.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Stable per-call identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// HTTP-style method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl CallMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// A request to the remote API
#[derive(Debug, Clone)]
pub struct OutgoingCall {
    pub id: CallId,
    /// Operation name used for the public and no-retry lists
    pub operation: String,
    pub method: CallMethod,
    /// Path relative to the API base URL
    pub path: String,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Skip authorization entirely (refresh exchange only)
    pub bypass_auth: bool,
}

impl OutgoingCall {
    pub fn new(operation: impl Into<String>, method: CallMethod, path: impl Into<String>) -> Self {
        Self {
            id: CallId::new(),
            operation: operation.into(),
            method,
            path: path.into(),
            body: None,
            headers: BTreeMap::new(),
            bypass_auth: false,
        }
    }

    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, CallMethod::Get, path)
    }

    pub fn post(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, CallMethod::Post, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn bypassing_auth(mut self) -> Self {
        self.bypass_auth = true;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub status: u16,
    pub body: Value,
}

/// Failed call as seen by the caller
///
/// `status` is absent for failures that never reached the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallFailure {
    pub status: Option<u16>,
    /// Server-reported error code, if any
    pub code: Option<String>,
    pub message: String,
}

impl CallFailure {
    pub fn new(status: Option<u16>, code: Option<&str>, message: impl Into<String>) -> Self {
        Self { status, code: code.map(str::to_string), message: message.into() }
    }

    /// Failure that never reached the server
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(None, None, message)
    }
}

/// Sends calls to the remote API
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: &OutgoingCall) -> Result<CallResponse, CallFailure>;
}
