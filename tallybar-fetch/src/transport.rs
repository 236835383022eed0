//! Request transport.
//!
//! [`Transport`] is the boundary every platform request crosses:
//!
//! - [`HttpTransport`] - the privileged side, performs the actual network call
//! - [`MessageTransport`] - the UI side, forwards requests as `FETCH` messages

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::message::{FETCH_MESSAGE, FetchEnvelope, Message, MessageChannel};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent string for `TallyBar`.
const USER_AGENT: &str = concat!("TallyBar/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Request / Payload
// ============================================================================

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET.
    #[default]
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request as it crosses the transport boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Absolute URL including query string.
    pub url: String,
    /// HTTP method.
    #[serde(default)]
    pub method: Method,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Timeout in milliseconds.
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl FetchRequest {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the effective timeout.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis)
    }

    /// Removes the `Cookie` header (any casing) and returns its value.
    pub fn take_cookie(&mut self) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case("cookie"))
            .cloned()?;
        self.headers.remove(&key)
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON.
    Json(Value),
    /// Raw text.
    Text(String),
}

impl Payload {
    /// Wraps a JSON value; plain strings are treated as text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Json(other),
        }
    }

    /// Converts back into a JSON value.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Returns the body as JSON, parsing text bodies.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Json`] if a text body is not JSON.
    pub fn into_json(self) -> Result<Value, FetchError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }

    /// Deserializes the body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Json`] if the body doesn't match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, FetchError> {
        Ok(serde_json::from_value(self.into_json()?)?)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Performs one request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`.
    ///
    /// # Errors
    ///
    /// Non-2xx responses become [`FetchError::Transport`]; an expired timeout
    /// becomes [`FetchError::Timeout`].
    async fn send(&self, request: FetchRequest) -> Result<Payload, FetchError>;
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Network transport backed by reqwest, with a cookie jar.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Creates a transport.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the client cannot be built (broken TLS
    /// configuration).
    pub fn new() -> Result<Self, FetchError> {
        let jar = Arc::new(Jar::default());
        let inner = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::clone(&jar))
            .build()?;
        Ok(Self { inner, jar })
    }

    /// Installs `cookie` (a `k=v; k2=v2` header value) for the origin of `url`.
    fn install_cookie(&self, cookie: &str, url: &Url) {
        for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(pair, url);
        }
    }

    fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidRequest(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidRequest(format!("header {name}: {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    async fn dispatch(&self, url: Url, request: FetchRequest) -> Result<Payload, FetchError> {
        let headers = Self::build_headers(&request.headers)?;
        let mut builder = self
            .inner
            .request(request.method.into(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(status = %response.status(), "Response received");
        read_response(response).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn send(&self, mut request: FetchRequest) -> Result<Payload, FetchError> {
        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidRequest(format!("{}: {e}", request.url)))?;

        // Cookie headers go through the jar, scoped to the target origin.
        if let Some(cookie) = request.take_cookie() {
            self.install_cookie(&cookie, &url);
        }

        let timeout = request.effective_timeout();
        tokio::time::timeout(timeout, self.dispatch(url, request))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }
}

async fn read_response(response: Response) -> Result<Payload, FetchError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    let text = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::Transport {
            status: Some(status.as_u16()),
            message: error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("HTTP error").to_string()),
            body: Some(text),
        });
    }

    if is_json {
        Ok(Payload::Json(serde_json::from_str(&text)?))
    } else {
        Ok(Payload::Text(text))
    }
}

/// Extracts a non-empty `message` field from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

// ============================================================================
// Message Transport
// ============================================================================

/// Transport that forwards requests to the privileged side as `FETCH`
/// messages.
#[derive(Clone)]
pub struct MessageTransport {
    channel: Arc<dyn MessageChannel>,
}

impl MessageTransport {
    /// Creates a transport over `channel`.
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self { channel }
    }
}

impl std::fmt::Debug for MessageTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for MessageTransport {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn send(&self, request: FetchRequest) -> Result<Payload, FetchError> {
        let timeout = request.effective_timeout();
        let message = Message::new(FETCH_MESSAGE, serde_json::to_value(&request)?);

        // The privileged side enforces the same timeout; this bounds the
        // message round trip as well.
        let response = tokio::time::timeout(timeout, self.channel.request(message))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
            .ok_or_else(|| FetchError::Transport {
                status: None,
                message: "no handler for FETCH".to_string(),
                body: None,
            })?;

        let envelope: FetchEnvelope = serde_json::from_value(response)?;
        envelope.into_result()
    }
}

// ============================================================================
// Tests
// ============================================================================
