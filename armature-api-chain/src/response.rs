//! Transport response wrapper.

use crate::{ApiError, Result};
use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;

/// Response returned by a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Bytes,
}

impl ApiResponse {
    /// Create a response from raw parts.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a response carrying a JSON body.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Create a response from a reqwest response.
    pub(crate) async fn from_reqwest(
        response: reqwest::Response,
    ) -> std::result::Result<Self, reqwest::Error> {
        let status = response.status();
        let body = response.bytes().await?;

        Ok(Self { status, body })
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Decode the body as JSON.
    ///
    /// An empty body is `null`; a body that is not JSON is returned as a string.
    pub fn body_value(&self) -> Value {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }

    /// Turn a non-2xx response into [`ApiError::Response`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Response {
                status: self.status.as_u16(),
                data: self.body_value(),
            })
        }
    }
}
