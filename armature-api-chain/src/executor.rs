//! Single-call execution.
//!
//! One call runs through: sending action, encode, send, then either the
//! success path or the error path. API errors go to the configured
//! interceptor, which may replay the call up to `max_replay_times` times.
//! Local faults skip the interceptor and surface directly.

use crate::action::{Action, CallAction, PlainAction};
use crate::config::ApiChainConfig;
use crate::encoding::{camelize_keys, encode_request};
use crate::interceptor::{InterceptContext, Recovery, ReplayParams};
use crate::middleware::Store;
use crate::params::ResolvedParams;
use crate::transport::{OutgoingRequest, Transport};
use crate::{ApiError, ApiResponse, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Executes one call to completion.
pub struct CallExecutor<S: Store> {
    config: ApiChainConfig<S>,
    transport: Arc<dyn Transport>,
}

impl<S: Store> CallExecutor<S> {
    /// Create an executor.
    pub fn new(config: ApiChainConfig<S>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ApiChainConfig<S> {
        &self.config
    }

    /// Run the call described by `action`/`params`.
    ///
    /// Resolves with the (shaped) response body, or with the terminal error
    /// after the error action and hook have run. Local faults are returned
    /// without dispatching anything.
    pub async fn execute(
        &self,
        store: &S,
        action: &CallAction<S>,
        params: &ResolvedParams<S>,
    ) -> Result<Value> {
        let max_replay_times = self.config.max_replay_times;
        let mut replay_times = 0;
        let mut replay = ReplayParams::default();

        loop {
            if let Some(kind) = &params.sending_type {
                store.dispatch(Action::Plain(PlainAction::lifecycle(action, kind)));
            }

            let request = match self.prepare(store, params, &replay) {
                Ok(request) => request,
                Err(err) => return Err(local_fault(params, err)),
            };

            let err = match self.transport.send(request).await {
                Ok(response) => return Ok(self.succeed(store, action, params, response)),
                Err(err) if err.is_replayable() => err,
                Err(err) => return Err(local_fault(params, err)),
            };

            let err = if params.camelize_response {
                err.map_data(camelize_keys)
            } else {
                err
            };

            if replay_times >= max_replay_times {
                let exhausted = ApiError::MaxReplayReached(max_replay_times);
                return Err(self.fail(store, action, params, exhausted));
            }
            replay_times += 1;

            let ctx = InterceptContext {
                error: &err,
                store,
                replay_times,
                max_replay_times,
            };
            let recovery = self.config.error_interceptor.intercept(ctx).await;
            match recovery {
                Recovery::Proceed => return Err(self.fail(store, action, params, err)),
                Recovery::Replay(next) => {
                    debug!(
                        method = %params.method,
                        url = %params.url,
                        replay_times = replay_times,
                        "Replaying API call"
                    );
                    replay = next;
                }
            }
        }
    }

    fn prepare(
        &self,
        store: &S,
        params: &ResolvedParams<S>,
        replay: &ReplayParams,
    ) -> Result<OutgoingRequest> {
        let defaults = (self.config.default_params)(store);
        let encoded = encode_request(params, &defaults, &replay.headers)?;

        Ok(OutgoingRequest {
            method: params.method.clone(),
            url: params.url.clone(),
            headers: encoded.headers,
            query: encoded.query,
            body: encoded.body,
            with_credentials: params.with_credentials,
            timeout: self.config.timeout,
        })
    }

    fn succeed(
        &self,
        store: &S,
        action: &CallAction<S>,
        params: &ResolvedParams<S>,
        response: ApiResponse,
    ) -> Value {
        let body = response.body_value();
        let body = if params.camelize_response {
            camelize_keys(body)
        } else {
            body
        };

        if let Some(kind) = &params.success_type {
            let mut success = PlainAction::lifecycle(action, kind);
            success.response = Some(body.clone());
            store.dispatch(Action::Plain(success));
        }

        if let Some(hook) = &params.after_success
            && let Err(e) = hook(store, &body)
        {
            error!(url = %params.url, error = %e, "after_success hook failed");
        }

        body
    }

    fn fail(
        &self,
        store: &S,
        action: &CallAction<S>,
        params: &ResolvedParams<S>,
        err: ApiError,
    ) -> ApiError {
        debug!(method = %params.method, url = %params.url, error = %err, "API call failed");

        if let Some(kind) = &params.error_type {
            let mut failure = PlainAction::lifecycle(action, kind);
            failure.error = Some(err.clone());
            store.dispatch(Action::Plain(failure));
        }

        if let Some(hook) = &params.after_error
            && let Err(e) = hook(store, &err)
        {
            error!(url = %params.url, error = %e, "after_error hook failed");
        }

        err
    }
}

fn local_fault<S>(params: &ResolvedParams<S>, err: ApiError) -> ApiError {
    error!(method = %params.method, url = %params.url, error = %err, "API call could not be completed");
    err
}
