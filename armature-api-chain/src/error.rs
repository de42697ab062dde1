//! API chain error types.

use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;

/// Result type for API chain operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error returned by `after_success`/`after_error` hooks.
///
/// Hook failures are logged and never routed through the HTTP failure path.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// API chain errors.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("Request failed with status code {status}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Decoded response body.
        data: Value,
    },

    /// The request was issued but no response arrived in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The error interceptor kept replaying until the bound was hit.
    #[error("reached MAX_REPLAY_TIMES = {0}")]
    MaxReplayReached(u32),

    /// Connection error (refused, DNS, reset before any response).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// Request body or query could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// Response body could not be read.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Check if this error reached the API and may be handed to the error interceptor.
    ///
    /// Everything else is a local fault: it is logged and surfaced as-is.
    pub fn is_replayable(&self) -> bool {
        matches!(self, Self::Response { .. } | Self::Timeout(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is the synthetic replay-exhaustion error.
    pub fn is_max_replay(&self) -> bool {
        matches!(self, Self::MaxReplayReached(_))
    }

    /// Get the HTTP status code if this is a response error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the decoded response body if this is a response error.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Response { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Apply `f` to the response body, leaving other variants untouched.
    pub(crate) fn map_data(self, f: impl FnOnce(Value) -> Value) -> Self {
        match self {
            Self::Response { status, data } => Self::Response {
                status,
                data: f(data),
            },
            other => other,
        }
    }

    /// Render the error as a JSON payload.
    ///
    /// Response errors expose `status` and `data`, and mirror the body under
    /// `response.body` for consumers reading the older payload shape.
    pub fn to_value(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("message".into(), Value::String(self.to_string()));
        if let Self::Response { status, data } = self {
            payload.insert("status".into(), json!(status));
            payload.insert("data".into(), data.clone());
            payload.insert("response".into(), json!({ "body": data }));
        }
        Value::Object(payload)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::RequestBuild(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
