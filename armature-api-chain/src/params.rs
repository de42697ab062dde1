//! Call descriptor resolution.

use crate::action::{AfterError, AfterSuccess, CallDescriptor, Revalidate};
use http::Method;
use serde_json::{Map, Value};

/// Normalized parameters for one call, derived from a descriptor and the base URL.
pub struct ResolvedParams<S> {
    /// HTTP method.
    pub method: Method,
    /// Effective URL.
    pub url: String,
    /// Call-specific query object.
    pub query: Option<Map<String, Value>>,
    /// Call-specific body object.
    pub body: Option<Map<String, Value>>,
    /// Call-specific headers.
    pub headers: Option<Map<String, Value>>,
    /// Action type dispatched on success.
    pub success_type: Option<String>,
    /// Action type dispatched before every attempt.
    pub sending_type: Option<String>,
    /// Action type dispatched on terminal failure.
    pub error_type: Option<String>,
    /// Success hook.
    pub after_success: Option<AfterSuccess<S>>,
    /// Failure hook.
    pub after_error: Option<AfterError<S>>,
    /// Camel-case response keys.
    pub camelize_response: bool,
    /// Snake-case request keys.
    pub decamelize_request: bool,
    /// Send credentials.
    pub with_credentials: bool,
    /// Revalidation policy.
    pub revalidate: Option<Revalidate>,
}

/// Turns call descriptors into [`ResolvedParams`].
///
/// Resolution is pure: no validation happens here, malformed methods or URLs
/// fail later at the transport.
#[derive(Debug, Clone)]
pub struct ParamsResolver {
    base_url: String,
}

impl ParamsResolver {
    /// Create a resolver for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Base URL prefixed to relative paths.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a descriptor.
    pub fn resolve<S>(&self, call: &CallDescriptor<S>) -> ResolvedParams<S> {
        let url = match &call.url {
            Some(url) => url.clone(),
            None => format!("{}{}", self.base_url, call.path.as_deref().unwrap_or_default()),
        };

        ResolvedParams {
            method: call.method.clone(),
            url,
            query: call.query.clone(),
            body: call.body.clone(),
            headers: call.headers.clone(),
            success_type: call.success_type.clone(),
            sending_type: call.sending_type.clone(),
            error_type: call.error_type.clone(),
            after_success: call.after_success.clone(),
            after_error: call.after_error.clone(),
            camelize_response: call.camelize_response.unwrap_or(true),
            decamelize_request: call.decamelize_request.unwrap_or(true),
            with_credentials: call.with_credentials.unwrap_or(true),
            revalidate: call.revalidate,
        }
    }
}
