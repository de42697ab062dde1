//! In-memory store and transport fakes for unit tests.

use crate::action::{Action, ChainAction, PlainAction};
use crate::middleware::{ApiMiddleware, Store};
use crate::transport::{OutgoingRequest, Transport};
use crate::{ApiError, ApiResponse, Result};
use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Store that records every dispatched action.
///
/// Chains are recorded too, unless the store was routed to a middleware, in
/// which case they run through it.
pub(crate) struct RecordingStore {
    actions: Mutex<Vec<Action<RecordingStore>>>,
    state: Mutex<String>,
    router: Mutex<Option<Arc<ApiMiddleware<RecordingStore>>>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            state: Mutex::new(String::new()),
            router: Mutex::new(None),
        }
    }

    pub(crate) fn route_to(&self, middleware: Arc<ApiMiddleware<RecordingStore>>) {
        *self.router.lock() = Some(middleware);
    }

    pub(crate) fn set_state(&self, state: &str) {
        *self.state.lock() = state.to_string();
    }

    pub(crate) fn actions(&self) -> Vec<Action<RecordingStore>> {
        self.actions.lock().clone()
    }

    pub(crate) fn plain_actions(&self) -> Vec<PlainAction> {
        self.actions
            .lock()
            .iter()
            .filter_map(Action::as_plain)
            .cloned()
            .collect()
    }

    pub(crate) fn plain_values(&self) -> Vec<Value> {
        self.plain_actions().iter().map(PlainAction::to_value).collect()
    }

    pub(crate) fn kinds(&self) -> Vec<String> {
        self.plain_actions().into_iter().map(|a| a.kind).collect()
    }
}

#[async_trait]
impl Store for RecordingStore {
    type State = String;

    fn dispatch(&self, action: Action<Self>) {
        self.actions.lock().push(action);
    }

    async fn dispatch_chain(&self, chain: ChainAction<Self>) {
        let router = self.router.lock().clone();
        match router {
            Some(middleware) => middleware.run_chain(self, chain).await,
            None => self.dispatch(Action::Chain(chain)),
        }
    }

    fn get_state(&self) -> String {
        self.state.lock().clone()
    }
}

/// Transport answering from a queue, falling back to `200 {}`.
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse>>>,
    requests: Mutex<Vec<OutgoingRequest>>,
    events: Mutex<Vec<String>>,
    fallback: Result<ApiResponse>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            fallback: Ok(ApiResponse::json(StatusCode::OK, &json!({}))),
            latency: None,
        }
    }

    /// Transport failing every request with `err`.
    pub(crate) fn failing(err: ApiError) -> Self {
        Self {
            fallback: Err(err),
            ..Self::new()
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn push_ok(&self, status: StatusCode, body: Value) {
        self.responses
            .lock()
            .push_back(Ok(ApiResponse::json(status, &body)));
    }

    pub(crate) fn push_err(&self, err: ApiError) {
        self.responses.lock().push_back(Err(err));
    }

    pub(crate) fn requests(&self) -> Vec<OutgoingRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse> {
        let path = request
            .url
            .strip_prefix("http://localhost:3000")
            .unwrap_or(&request.url)
            .to_string();
        self.events.lock().push(format!("start {path}"));
        self.requests.lock().push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.responses.lock().pop_front();
        self.events.lock().push(format!("end {path}"));
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
