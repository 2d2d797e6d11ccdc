//! reqwest-backed [`Transport`]
//!
//! Maps an [`OutgoingCall`] onto an HTTP request against the configured base
//! URL and turns every non-success outcome into a [`CallFailure`]. Error
//! bodies are read for a server code and message in any of these shapes:
//!
//! ```text
//! { "code": "...", "message": "..." }
//! { "error": { "code": "...", "message": "..." } }   or   { "error": "..." }
//! { "errors": [ { "message": "...", "extensions": { "code": "..." } } ] }
//! ```
//!
//! The last shape is also honored on a `200` response, where GraphQL-style
//! servers report resolver errors.
//!
//! The transport never retries; recovery from rejected credentials happens
//! in the pipeline above it.

use std::time::Duration;

use async_trait::async_trait;
use memberdesk_core::{CallFailure, CallMethod, CallResponse, OutgoingCall, Transport};
use memberdesk_domain::{ApiConfig, MemberdeskError, Result};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::errors::InfraError;

/// HTTP implementation of the call transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    /// Start building a transport for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    /// Transport configured from the `[api]` section.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::builder(config.base_url.clone()).timeout(config.timeout()).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: &OutgoingCall) -> std::result::Result<CallResponse, CallFailure> {
        let method = to_method(call.method);
        let url = self.url_for(&call.path);

        let mut request = self.client.request(method.clone(), &url);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        debug!(call_id = %call.id, operation = %call.operation, %method, %url, "sending call");

        let response = request.send().await.map_err(network_failure)?;
        let status = response.status();
        let text = response.text().await.map_err(network_failure)?;
        let body = parse_body(text);

        debug!(call_id = %call.id, operation = %call.operation, %status, "received response");

        if status.is_success() {
            if let Some(failure) = graphql_failure(status, &body) {
                return Err(failure);
            }
            return Ok(CallResponse { status: status.as_u16(), body });
        }

        Err(failure_from_body(status, &body))
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
}

impl HttpTransportBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(MemberdeskError::Config("api base URL must not be empty".into()));
        }

        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| MemberdeskError::from(InfraError::from(err)))?;

        Ok(HttpTransport { client, base_url })
    }
}

fn to_method(method: CallMethod) -> Method {
    match method {
        CallMethod::Get => Method::GET,
        CallMethod::Post => Method::POST,
        CallMethod::Put => Method::PUT,
        CallMethod::Patch => Method::PATCH,
        CallMethod::Delete => Method::DELETE,
    }
}

fn network_failure(err: reqwest::Error) -> CallFailure {
    let mapped = MemberdeskError::from(InfraError::from(err));
    CallFailure::network(mapped.to_string())
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// First entry of a non-empty GraphQL `errors` array
fn first_graphql_error(body: &Value) -> Option<&Value> {
    body.get("errors").and_then(Value::as_array).and_then(|errors| errors.first())
}

fn graphql_failure(status: StatusCode, body: &Value) -> Option<CallFailure> {
    let error = first_graphql_error(body)?;
    let code = error.get("extensions").and_then(|ext| str_field(ext, "code"));
    let message = str_field(error, "message").unwrap_or("request failed");
    Some(CallFailure::new(Some(status.as_u16()), code, message))
}

fn failure_from_body(status: StatusCode, body: &Value) -> CallFailure {
    if let Some(failure) = graphql_failure(status, body) {
        return failure;
    }

    let fallback = status.canonical_reason().unwrap_or("request failed");
    let (code, message) = match body.get("error") {
        Some(Value::Object(_)) => {
            let error = &body["error"];
            (str_field(error, "code"), str_field(error, "message"))
        }
        Some(Value::String(message)) => (str_field(body, "code"), Some(message.as_str())),
        _ => (str_field(body, "code"), str_field(body, "message")),
    };
    let message = match (message, body) {
        (Some(message), _) => message.to_string(),
        (None, Value::String(text)) => text.clone(),
        (None, _) => fallback.to_string(),
    };

    CallFailure::new(Some(status.as_u16()), code, message)
}
