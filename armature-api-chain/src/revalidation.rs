//! Revalidation gate.
//!
//! Remembers when each distinct call last went out and skips identical calls
//! inside the configured window. Purely in-process and best-effort: it is not
//! a response cache.
//!
//! Entries live in a bounded LRU, so the least recently admitted keys are
//! forgotten once `capacity` distinct calls have been seen.

use crate::action::Revalidate;
use crate::params::ResolvedParams;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default number of distinct calls remembered.
pub const DEFAULT_REVALIDATION_CAPACITY: usize = 1024;

/// Last-executed timestamps keyed by call identity.
pub struct RevalidationStore {
    entries: Mutex<LruCache<String, Instant>>,
}

impl RevalidationStore {
    /// Create a store remembering at most `capacity` calls.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        debug!(capacity = capacity.get(), "Creating revalidation store");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Decide whether a call with `key` may go out now.
    ///
    /// Admission records the current time; the check and the update happen
    /// under one lock.
    pub fn admit(&self, key: &str, policy: Revalidate) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let allowed = match (policy, entries.get(key).copied()) {
            (_, None) => true,
            (Revalidate::Never, Some(_)) => false,
            (Revalidate::Seconds(window), Some(last)) => {
                now.duration_since(last) >= Duration::from_secs(window)
            }
        };

        if allowed {
            entries.put(key.to_string(), now);
        }
        trace!(key = %key, policy = ?policy, allowed = allowed, "Revalidation check");
        allowed
    }

    /// Number of remembered calls.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget every recorded call.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for RevalidationStore {
    fn default() -> Self {
        Self::new(DEFAULT_REVALIDATION_CAPACITY)
    }
}

/// Identity of a call: method, effective URL, query and body.
///
/// Keys are sorted recursively so equal calls always produce equal strings.
/// Headers and configured defaults are not part of the identity.
pub fn revalidation_key<S>(params: &ResolvedParams<S>) -> String {
    let mut identity = Map::new();
    identity.insert("method".into(), Value::String(params.method.to_string()));
    identity.insert("url".into(), Value::String(params.url.clone()));
    identity.insert(
        "query".into(),
        params.query.clone().map(Value::Object).unwrap_or(Value::Null),
    );
    identity.insert(
        "body".into(),
        params.body.clone().map(Value::Object).unwrap_or(Value::Null),
    );
    canonicalize(Value::Object(identity)).to_string()
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, nested)| (key, canonicalize(nested)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
