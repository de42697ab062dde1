//! HTTP transport.
//!
//! The executor only needs something that turns an [`OutgoingRequest`] into an
//! [`ApiResponse`]. [`ReqwestTransport`] is the default; tests and hosts with
//! their own client plug in via the [`Transport`] trait.

use crate::encoding::RequestBody;
use crate::{ApiError, ApiResponse, Result};
use async_trait::async_trait;
use http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tracing::debug;

/// Fully encoded request for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL, without the query string.
    pub url: String,
    /// Header pairs.
    pub headers: Vec<(String, String)>,
    /// Query pairs.
    pub query: Vec<(String, String)>,
    /// Body, absent for GET.
    pub body: Option<RequestBody>,
    /// Send ambient credentials.
    pub with_credentials: bool,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl OutgoingRequest {
    /// Look up a header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Issues HTTP requests.
///
/// Implementations return `Err(ApiError::Response)` for non-2xx answers and
/// `Err(ApiError::Timeout)` when no answer arrived in time; any other error
/// is treated as a local fault.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and wait for the response.
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse>;
}

/// Transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with its own connection pool.
    pub fn new(user_agent: &str) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { inner })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    fn build(&self, request: &OutgoingRequest) -> Result<reqwest::Request> {
        let url = url::Url::parse(&request.url)?;
        let mut builder = self
            .inner
            .request(request.method.clone(), url)
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ApiError::RequestBuild(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ApiError::RequestBuild(format!("header value for {name}: {e}")))?;
            builder = builder.header(name, value);
        }

        builder = match &request.body {
            Some(RequestBody::Json(body)) => builder.json(body),
            Some(RequestBody::Form(encoded)) => builder.body(encoded.clone()),
            None => builder,
        };

        Ok(builder.build()?)
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse> {
        let built = self.build(&request)?;

        debug!(
            method = %request.method,
            url = %built.url(),
            with_credentials = request.with_credentials,
            "Sending API request"
        );

        let timeout = request.timeout;
        let response = self
            .inner
            .execute(built)
            .await
            .map_err(|e| classify(e, timeout))?;
        let response = ApiResponse::from_reqwest(response)
            .await
            .map_err(|e| classify(e, timeout))
            .and_then(ApiResponse::error_for_status);

        if let Ok(response) = &response {
            debug!(status = %response.status(), "Received API response");
        }
        response
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(timeout)
    } else {
        err.into()
    }
}
