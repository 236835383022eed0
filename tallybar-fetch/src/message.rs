//! Cross-context message envelopes.
//!
//! The UI side never talks to platforms directly. It sends a typed message
//! (`{type, payload}`) to the privileged side, which answers with a JSON
//! value. `FETCH` messages carry a [`FetchRequest`](crate::FetchRequest) and
//! are answered with a [`FetchEnvelope`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;
use crate::transport::Payload;

/// Message type for proxied requests.
pub const FETCH_MESSAGE: &str = "FETCH";

/// An inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message type, e.g. `FETCH`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    /// Creates a message.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Something that delivers a message and returns the handler's answer.
///
/// `None` means no handler claimed the message type.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Delivers `message` and waits for the response.
    async fn request(&self, message: Message) -> Option<Value>;
}

/// Response to a `FETCH` message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchEnvelope {
    /// Whether the request succeeded.
    pub success: bool,
    /// Response body on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status on failure, when a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl FetchEnvelope {
    /// Builds the envelope for a transport result.
    pub fn from_result(result: Result<Payload, FetchError>) -> Self {
        match result {
            Ok(payload) => Self {
                success: true,
                data: Some(payload.into_value()),
                ..Default::default()
            },
            Err(err) => Self {
                success: false,
                data: None,
                status: err.status(),
                error: Some(match err.root() {
                    FetchError::Transport { message, .. } => message.clone(),
                    other => other.to_string(),
                }),
            },
        }
    }

    /// Converts the envelope back into a transport result.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] carrying the envelope's status and
    /// error message when `success` is false.
    pub fn into_result(self) -> Result<Payload, FetchError> {
        if self.success {
            return Ok(Payload::from_value(self.data.unwrap_or(Value::Null)));
        }
        Err(FetchError::Transport {
            status: self.status,
            message: self.error.unwrap_or_else(|| "request failed".to_string()),
            body: None,
        })
    }
}
