//! Request encoding: default merging, key casing, and body serialization.

use crate::error::{ApiError, Result};
use crate::params::ResolvedParams;
use http::Method;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Content type that switches the body to `key=value&...` encoding.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

// Key casing patterns
static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_\s]+(.)?").unwrap());
static UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").unwrap());

/// Default query, body and headers merged beneath every call.
///
/// Produced per attempt by the configured default-params generator, so a
/// replay picks up state changes (e.g. a refreshed token).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultParams {
    /// Default headers.
    pub headers: Map<String, Value>,
    /// Default body fields.
    pub body: Map<String, Value>,
    /// Default query parameters.
    pub query: Map<String, Value>,
}

impl DefaultParams {
    /// Create empty defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Add a default body field.
    pub fn body_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Add a default query parameter.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// Serialized request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured body, sent as JSON.
    Json(Value),
    /// `application/x-www-form-urlencoded` string.
    Form(String),
}

/// Final query, headers and body for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRequest {
    /// Flattened query pairs.
    pub query: Vec<(String, String)>,
    /// Header pairs.
    pub headers: Vec<(String, String)>,
    /// Body, absent for GET.
    pub body: Option<RequestBody>,
}

/// Merge defaults, call params and interceptor headers, then encode.
///
/// Later layers win on key collisions. Query and body keys are snake-cased
/// when `decamelize_request` is set.
pub fn encode_request<S>(
    params: &ResolvedParams<S>,
    defaults: &DefaultParams,
    interceptor_headers: &Map<String, Value>,
) -> Result<EncodedRequest> {
    let mut query = merge(&defaults.query, params.query.as_ref());
    let mut body = merge(&defaults.body, params.body.as_ref());
    let mut headers = merge(&defaults.headers, params.headers.as_ref());
    headers.extend(interceptor_headers.clone());

    if params.decamelize_request {
        query = decamelize_object(query);
        body = decamelize_object(body);
    }

    tracing::trace!(
        query = ?query,
        body = ?body,
        headers = headers.len(),
        "Merged request parameters"
    );

    let body = if params.method == Method::GET {
        None
    } else if is_form_urlencoded(&headers) {
        Some(RequestBody::Form(encode_form(&body)?))
    } else {
        Some(RequestBody::Json(Value::Object(body)))
    };

    Ok(EncodedRequest {
        query: flatten(&query),
        headers: headers
            .into_iter()
            .map(|(name, value)| (name, header_value(value)))
            .collect(),
        body,
    })
}

fn merge(base: &Map<String, Value>, overlay: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut merged = base.clone();
    if let Some(overlay) = overlay {
        merged.extend(overlay.clone());
    }
    merged
}

fn header_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Check whether the `content-type` header (any casing) is exactly form-urlencoded.
pub fn is_form_urlencoded(headers: &Map<String, Value>) -> bool {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .is_some_and(|(_, value)| value.as_str() == Some(FORM_URLENCODED))
}

/// Encode an object as `key=value&key=value`.
///
/// Nested objects and arrays use bracket notation (`a[b]=c`, `a[0]=x`); a
/// null leaf encodes as an empty value (`a=`).
pub fn encode_form(object: &Map<String, Value>) -> Result<String> {
    serde_urlencoded::to_string(flatten_with(object, NullLeaf::Empty))
        .map_err(|e| ApiError::Encode(e.to_string()))
}

/// Flatten an object into query pairs using bracket notation.
///
/// Null leaves are left out of the query.
pub fn flatten(object: &Map<String, Value>) -> Vec<(String, String)> {
    flatten_with(object, NullLeaf::Skip)
}

#[derive(Clone, Copy)]
enum NullLeaf {
    Skip,
    Empty,
}

fn flatten_with(object: &Map<String, Value>, nulls: NullLeaf) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in object {
        flatten_into(key.clone(), value, nulls, &mut pairs);
    }
    pairs
}

fn flatten_into(prefix: String, value: &Value, nulls: NullLeaf, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(format!("{prefix}[{key}]"), nested, nulls, pairs);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(format!("{prefix}[{index}]"), nested, nulls, pairs);
            }
        }
        Value::Null => {
            if let NullLeaf::Empty = nulls {
                pairs.push((prefix, String::new()));
            }
        }
        Value::String(s) => pairs.push((prefix, s.clone())),
        other => pairs.push((prefix, other.to_string())),
    }
}

/// Camel-case every object key, recursively.
///
/// Runs of `-`, `_` and whitespace are removed and the following character
/// upper-cased; the first character is lower-cased. Every other character is
/// kept, and numeric keys are left alone.
pub fn camelize_keys(value: Value) -> Value {
    transform_keys(value, &camelize)
}

/// Snake-case every object key, recursively.
///
/// An `_` goes before each ASCII upper-case letter (except a leading one) and
/// the key is lower-cased. Every other character is kept, and numeric keys
/// are left alone.
pub fn decamelize_keys(value: Value) -> Value {
    transform_keys(value, &decamelize)
}

fn camelize(key: &str) -> String {
    if is_numerical(key) {
        return key.to_string();
    }
    let joined = SEPARATOR_RUN.replace_all(key, |caps: &Captures| {
        caps.get(1)
            .map(|next| next.as_str().to_uppercase())
            .unwrap_or_default()
    });
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decamelize(key: &str) -> String {
    if is_numerical(key) {
        return key.to_string();
    }
    UPPERCASE
        .replace_all(key, |caps: &Captures| match caps.get(0) {
            Some(upper) if upper.start() > 0 => format!("_{}", upper.as_str()),
            Some(upper) => upper.as_str().to_string(),
            None => String::new(),
        })
        .to_lowercase()
}

// Keys that read as numbers (including blank ones) are never re-cased.
fn is_numerical(key: &str) -> bool {
    let trimmed = key.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().is_ok_and(|n| !n.is_nan())
}

fn decamelize_object(object: Map<String, Value>) -> Map<String, Value> {
    match decamelize_keys(Value::Object(object)) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn transform_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, nested)| (rename(&key), transform_keys(nested, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|nested| transform_keys(nested, rename))
                .collect(),
        ),
        other => other,
    }
}
