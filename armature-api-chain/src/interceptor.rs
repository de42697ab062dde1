//! Error interceptors.
//!
//! An interceptor sees every API error (the server answered, or the request
//! timed out) before it becomes terminal, and decides whether to give up or
//! replay the call. Replays are bounded by `max_replay_times`.

use crate::error::ApiError;
use crate::middleware::Store;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

/// Context handed to an [`ErrorInterceptor`].
pub struct InterceptContext<'a, S> {
    /// The API error, with its body camelized when the call asks for it.
    pub error: &'a ApiError,
    /// The store, for reading state or dispatching.
    pub store: &'a S,
    /// Replays already granted for this call, including this one.
    pub replay_times: u32,
    /// Configured replay bound.
    pub max_replay_times: u32,
}

/// Extra parameters applied to a replayed attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayParams {
    /// Headers layered over the default and call headers.
    pub headers: Map<String, Value>,
}

impl ReplayParams {
    /// Create empty replay params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header for the replayed attempt.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }
}

/// Interceptor decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Fail the call with the original error.
    Proceed,
    /// Issue the call again.
    Replay(ReplayParams),
}

impl Recovery {
    /// Replay with no extra parameters.
    pub fn replay() -> Self {
        Self::Replay(ReplayParams::default())
    }
}

/// Decides what happens to an API error.
#[async_trait]
pub trait ErrorInterceptor<S: Store>: Send + Sync {
    /// Inspect the error and pick a [`Recovery`].
    async fn intercept(&self, ctx: InterceptContext<'_, S>) -> Recovery;
}

/// Interceptor that never replays.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProceedInterceptor;

#[async_trait]
impl<S: Store> ErrorInterceptor<S> for ProceedInterceptor {
    async fn intercept(&self, _ctx: InterceptContext<'_, S>) -> Recovery {
        Recovery::Proceed
    }
}

/// Interceptor backed by a closure returning a boxed future.
pub struct FnInterceptor<F> {
    f: F,
}

/// Build an interceptor from a closure.
///
/// The closure reads what it needs from the context up front; the returned
/// future owns its data.
///
/// ```rust,ignore
/// let interceptor = interceptor_fn(
///     |ctx: InterceptContext<'_, MyStore>| -> BoxFuture<'static, Recovery> {
///         let expired = ctx.error.status_code() == Some(401);
///         Box::pin(async move {
///             if expired { Recovery::replay() } else { Recovery::Proceed }
///         })
///     },
/// );
/// ```
pub fn interceptor_fn<F>(f: F) -> FnInterceptor<F> {
    FnInterceptor { f }
}

#[async_trait]
impl<S, F> ErrorInterceptor<S> for FnInterceptor<F>
where
    S: Store,
    F: Fn(InterceptContext<'_, S>) -> BoxFuture<'static, Recovery> + Send + Sync,
{
    async fn intercept(&self, ctx: InterceptContext<'_, S>) -> Recovery {
        (self.f)(ctx).await
    }
}

/// Interceptor that logs every API error before deferring to an inner one.
pub struct LoggingInterceptor<I> {
    inner: I,
}

impl<I> LoggingInterceptor<I> {
    /// Wrap an interceptor.
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S, I> ErrorInterceptor<S> for LoggingInterceptor<I>
where
    S: Store,
    I: ErrorInterceptor<S>,
{
    async fn intercept(&self, ctx: InterceptContext<'_, S>) -> Recovery {
        tracing::warn!(
            error = %ctx.error,
            status = ?ctx.error.status_code(),
            replay_times = ctx.replay_times,
            max_replay_times = ctx.max_replay_times,
            "API call failed"
        );
        let recovery = self.inner.intercept(ctx).await;
        tracing::debug!(recovery = ?recovery, "Interceptor decision");
        recovery
    }
}
