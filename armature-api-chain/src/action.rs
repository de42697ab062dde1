//! Actions and call descriptors.
//!
//! An [`Action`] is what flows through the store's dispatch pipeline. Only the
//! [`Action::Call`] and [`Action::Chain`] variants are handled by the API
//! middleware; everything else is forwarded untouched.

use crate::error::{ApiError, HookError};
use http::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Hook invoked after a call succeeds, with the store and the (shaped) response body.
pub type AfterSuccess<S> = Arc<dyn Fn(&S, &Value) -> Result<(), HookError> + Send + Sync>;

/// Hook invoked after a call fails terminally, with the store and the error.
pub type AfterError<S> = Arc<dyn Fn(&S, &ApiError) -> Result<(), HookError> + Send + Sync>;

/// Constructor for one link of a chain; receives the previous link's body.
pub type Link<S> = Arc<dyn Fn(Option<&Value>) -> CallAction<S> + Send + Sync>;

/// Action flowing through the dispatch pipeline.
pub enum Action<S> {
    /// Ordinary action, including lifecycle actions emitted by the middleware.
    Plain(PlainAction),
    /// A single API call.
    Call(CallAction<S>),
    /// An ordered chain of dependent API calls.
    Chain(ChainAction<S>),
}

impl<S> Action<S> {
    /// Get the plain action, if this is one.
    pub fn as_plain(&self) -> Option<&PlainAction> {
        match self {
            Self::Plain(action) => Some(action),
            _ => None,
        }
    }

    /// Get the chain action, if this is one.
    pub fn as_chain(&self) -> Option<&ChainAction<S>> {
        match self {
            Self::Chain(chain) => Some(chain),
            _ => None,
        }
    }
}

impl<S> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(action) => Self::Plain(action.clone()),
            Self::Call(action) => Self::Call(action.clone()),
            Self::Chain(chain) => Self::Chain(chain.clone()),
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(action) => f.debug_tuple("Plain").field(action).finish(),
            Self::Call(action) => f.debug_tuple("Call").field(action).finish(),
            Self::Chain(chain) => f.debug_tuple("Chain").field(chain).finish(),
        }
    }
}

impl<S> From<PlainAction> for Action<S> {
    fn from(action: PlainAction) -> Self {
        Self::Plain(action)
    }
}

impl<S> From<CallAction<S>> for Action<S> {
    fn from(action: CallAction<S>) -> Self {
        Self::Call(action)
    }
}

impl<S> From<ChainAction<S>> for Action<S> {
    fn from(chain: ChainAction<S>) -> Self {
        Self::Chain(chain)
    }
}

/// Ordinary action with a type label and free-form fields.
#[derive(Debug, Clone, Default)]
pub struct PlainAction {
    /// Action type.
    pub kind: String,
    /// Extra fields.
    pub fields: Map<String, Value>,
    /// Response body, set on success lifecycle actions.
    pub response: Option<Value>,
    /// Terminal error, set on error lifecycle actions.
    pub error: Option<ApiError>,
}

impl PlainAction {
    /// Create a plain action of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Add an extra field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Lifecycle action for `source`: its extra fields plus the given type.
    pub(crate) fn lifecycle<S>(source: &CallAction<S>, kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            fields: source.fields.clone(),
            response: None,
            error: None,
        }
    }

    /// Render as a flat JSON object: fields, then `type`, `response` and `error`.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("type".into(), Value::String(self.kind.clone()));
        if let Some(response) = &self.response {
            object.insert("response".into(), response.clone());
        }
        if let Some(error) = &self.error {
            object.insert("error".into(), error.to_value());
        }
        Value::Object(object)
    }
}

/// Revalidation policy for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    /// Issue the call once per process; later identical calls are skipped.
    Never,
    /// Skip identical calls made within this many seconds of the last one.
    Seconds(u64),
}

/// Declarative description of one HTTP call.
pub struct CallDescriptor<S> {
    pub(crate) method: Method,
    pub(crate) path: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) query: Option<Map<String, Value>>,
    pub(crate) body: Option<Map<String, Value>>,
    pub(crate) headers: Option<Map<String, Value>>,
    pub(crate) success_type: Option<String>,
    pub(crate) sending_type: Option<String>,
    pub(crate) error_type: Option<String>,
    pub(crate) after_success: Option<AfterSuccess<S>>,
    pub(crate) after_error: Option<AfterError<S>>,
    pub(crate) camelize_response: Option<bool>,
    pub(crate) decamelize_request: Option<bool>,
    pub(crate) with_credentials: Option<bool>,
    pub(crate) revalidate: Option<Revalidate>,
}

impl<S> CallDescriptor<S> {
    /// Create a descriptor for `method` on a path relative to the base URL.
    pub fn request(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: Some(path.into()),
            url: None,
            query: None,
            body: None,
            headers: None,
            success_type: None,
            sending_type: None,
            error_type: None,
            after_success: None,
            after_error: None,
            camelize_response: None,
            decamelize_request: None,
            with_credentials: None,
            revalidate: None,
        }
    }

    /// Create a GET descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self::request(Method::GET, path)
    }

    /// Create a POST descriptor.
    pub fn post(path: impl Into<String>) -> Self {
        Self::request(Method::POST, path)
    }

    /// Create a PUT descriptor.
    pub fn put(path: impl Into<String>) -> Self {
        Self::request(Method::PUT, path)
    }

    /// Create a PATCH descriptor.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::request(Method::PATCH, path)
    }

    /// Create a DELETE descriptor.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::request(Method::DELETE, path)
    }

    /// Target an absolute URL instead of the base URL + path.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the query object.
    pub fn query(mut self, query: Value) -> Self {
        self.query = into_object("query", query);
        self
    }

    /// Set the body object.
    pub fn body(mut self, body: Value) -> Self {
        self.body = into_object("body", body);
        self
    }

    /// Set the header object.
    pub fn headers(mut self, headers: Value) -> Self {
        self.headers = into_object("headers", headers);
        self
    }

    /// Add a single header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Map::new)
            .insert(name.into(), Value::String(value.into()));
        self
    }

    /// Action type dispatched on success.
    pub fn success_type(mut self, kind: impl Into<String>) -> Self {
        self.success_type = Some(kind.into());
        self
    }

    /// Action type dispatched before every attempt.
    pub fn sending_type(mut self, kind: impl Into<String>) -> Self {
        self.sending_type = Some(kind.into());
        self
    }

    /// Action type dispatched on terminal failure.
    pub fn error_type(mut self, kind: impl Into<String>) -> Self {
        self.error_type = Some(kind.into());
        self
    }

    /// Hook run after the success action is dispatched.
    pub fn after_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S, &Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_success = Some(Arc::new(hook));
        self
    }

    /// Hook run after the error action is dispatched.
    pub fn after_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S, &ApiError) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_error = Some(Arc::new(hook));
        self
    }

    /// Camel-case response keys (default `true`).
    pub fn camelize_response(mut self, enable: bool) -> Self {
        self.camelize_response = Some(enable);
        self
    }

    /// Snake-case query and body keys before sending (default `true`).
    pub fn decamelize_request(mut self, enable: bool) -> Self {
        self.decamelize_request = Some(enable);
        self
    }

    /// Send credentials with the request (default `true`).
    pub fn with_credentials(mut self, enable: bool) -> Self {
        self.with_credentials = Some(enable);
        self
    }

    /// Skip the call when an identical one ran recently.
    pub fn revalidate(mut self, policy: Revalidate) -> Self {
        self.revalidate = Some(policy);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the base URL.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Absolute URL override.
    pub fn url_override(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Query object, if any.
    pub fn query_object(&self) -> Option<&Map<String, Value>> {
        self.query.as_ref()
    }

    /// Body object, if any.
    pub fn body_object(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref()
    }

    /// Header object, if any.
    pub fn header_object(&self) -> Option<&Map<String, Value>> {
        self.headers.as_ref()
    }
}

fn into_object(what: &str, value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            tracing::warn!(field = what, value = %other, "Ignoring non-object value");
            None
        }
    }
}

impl<S> Clone for CallDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            path: self.path.clone(),
            url: self.url.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            headers: self.headers.clone(),
            success_type: self.success_type.clone(),
            sending_type: self.sending_type.clone(),
            error_type: self.error_type.clone(),
            after_success: self.after_success.clone(),
            after_error: self.after_error.clone(),
            camelize_response: self.camelize_response,
            decamelize_request: self.decamelize_request,
            with_credentials: self.with_credentials,
            revalidate: self.revalidate,
        }
    }
}

impl<S> fmt::Debug for CallDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("success_type", &self.success_type)
            .field("sending_type", &self.sending_type)
            .field("error_type", &self.error_type)
            .field("after_success", &self.after_success.is_some())
            .field("after_error", &self.after_error.is_some())
            .field("camelize_response", &self.camelize_response)
            .field("decamelize_request", &self.decamelize_request)
            .field("with_credentials", &self.with_credentials)
            .field("revalidate", &self.revalidate)
            .finish()
    }
}

/// A single API call plus the extra fields merged into its lifecycle actions.
pub struct CallAction<S> {
    /// Extra fields copied into every lifecycle action.
    pub fields: Map<String, Value>,
    /// The call itself.
    pub call: CallDescriptor<S>,
}

impl<S> CallAction<S> {
    /// Wrap a descriptor with no extra fields.
    pub fn new(call: CallDescriptor<S>) -> Self {
        Self {
            fields: Map::new(),
            call,
        }
    }

    /// Add an extra field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl<S> From<CallDescriptor<S>> for CallAction<S> {
    fn from(call: CallDescriptor<S>) -> Self {
        Self::new(call)
    }
}

impl<S> Clone for CallAction<S> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            call: self.call.clone(),
        }
    }
}

impl<S> fmt::Debug for CallAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallAction")
            .field("fields", &self.fields)
            .field("call", &self.call)
            .finish()
    }
}

/// Ordered chain of dependent calls.
pub struct ChainAction<S> {
    links: Vec<Link<S>>,
}

impl<S: 'static> ChainAction<S> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Chain of one link that always yields `action`.
    pub fn single(action: CallAction<S>) -> Self {
        Self::new().then_action(move |_| action.clone())
    }

    /// Append a link built from the previous link's response body.
    ///
    /// The previous body is `None` for the first link and after a link the
    /// revalidation gate skipped.
    pub fn then<F>(self, link: F) -> Self
    where
        F: Fn(Option<&Value>) -> CallDescriptor<S> + Send + Sync + 'static,
    {
        self.then_action(move |prev: Option<&Value>| CallAction::new(link(prev)))
    }

    /// Like [`then`](Self::then), for links that carry extra action fields.
    pub fn then_action<F>(mut self, link: F) -> Self
    where
        F: Fn(Option<&Value>) -> CallAction<S> + Send + Sync + 'static,
    {
        self.links.push(Arc::new(link));
        self
    }
}

impl<S: 'static> Default for ChainAction<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ChainAction<S> {
    /// The link constructors, in execution order.
    pub fn links(&self) -> &[Link<S>] {
        &self.links
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check if the chain has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(crate) fn into_links(self) -> Vec<Link<S>> {
        self.links
    }
}

impl<S> Clone for ChainAction<S> {
    fn clone(&self) -> Self {
        Self {
            links: self.links.clone(),
        }
    }
}

impl<S> fmt::Debug for ChainAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainAction")
            .field("links", &self.links.len())
            .finish()
    }
}
