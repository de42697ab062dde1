//! Dispatch-pipeline middleware.
//!
//! [`ApiMiddleware`] sits in front of a store's dispatch. Plain actions pass
//! through to `next`. A single call is re-dispatched as a one-link chain and
//! awaited until that chain settles. A chain runs its links one at a time,
//! each link built from the body the previous one produced.

use crate::action::{Action, CallAction, ChainAction};
use crate::config::ApiChainConfig;
use crate::executor::CallExecutor;
use crate::params::ParamsResolver;
use crate::revalidation::{RevalidationStore, revalidation_key};
use crate::transport::{ReqwestTransport, Transport};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// The store the middleware dispatches into.
#[async_trait]
pub trait Store: Send + Sync + Sized + 'static {
    /// Snapshot of the store's state.
    type State;

    /// Send an action through the full dispatch pipeline, middleware included.
    fn dispatch(&self, action: Action<Self>);

    /// Send a chain through the full dispatch pipeline and wait until it settles.
    ///
    /// Stores wired to an [`ApiMiddleware`] route the chain back into
    /// [`ApiMiddleware::handle`] or [`ApiMiddleware::run_chain`].
    async fn dispatch_chain(&self, chain: ChainAction<Self>);

    /// Read the current state.
    fn get_state(&self) -> Self::State;
}

/// What the middleware did with an action.
#[derive(Debug)]
pub enum Handled<R> {
    /// Not an API action; `next` ran and returned this.
    Forwarded(R),
    /// A single call was wrapped into a chain, dispatched again and settled.
    Redispatched,
    /// A chain ran to completion or halted.
    Settled,
}

impl<R> Handled<R> {
    /// Get the downstream result, if the action was forwarded.
    pub fn into_forwarded(self) -> Option<R> {
        match self {
            Self::Forwarded(result) => Some(result),
            _ => None,
        }
    }
}

/// Outcome of one chain link.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    /// The call succeeded with this body.
    Completed(Value),
    /// The revalidation gate suppressed the call.
    Skipped,
}

/// Middleware turning call and chain actions into HTTP traffic.
pub struct ApiMiddleware<S: Store> {
    resolver: ParamsResolver,
    executor: CallExecutor<S>,
    revalidation: Arc<RevalidationStore>,
}

impl<S: Store> ApiMiddleware<S> {
    /// Create a middleware using the reqwest transport.
    pub fn new(config: ApiChainConfig<S>) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a middleware with a custom transport.
    pub fn with_transport(config: ApiChainConfig<S>, transport: Arc<dyn Transport>) -> Self {
        info!(
            base_url = %config.base_url,
            max_replay_times = config.max_replay_times,
            timeout = ?config.timeout,
            "Creating API chain middleware"
        );
        Self {
            resolver: ParamsResolver::new(config.base_url.clone()),
            revalidation: Arc::new(RevalidationStore::new(config.revalidation_capacity)),
            executor: CallExecutor::new(config, transport),
        }
    }

    /// Share a revalidation store with other middleware instances.
    pub fn with_revalidation_store(mut self, store: Arc<RevalidationStore>) -> Self {
        self.revalidation = store;
        self
    }

    /// Get the revalidation store.
    pub fn revalidation_store(&self) -> &Arc<RevalidationStore> {
        &self.revalidation
    }

    /// Get the configuration.
    pub fn config(&self) -> &ApiChainConfig<S> {
        self.executor.config()
    }

    /// Handle one dispatched action.
    ///
    /// Only plain actions reach `next`.
    pub async fn handle<N, R>(&self, store: &S, action: Action<S>, next: N) -> Handled<R>
    where
        N: FnOnce(Action<S>) -> R,
    {
        match action {
            Action::Call(call) => {
                debug!(method = %call.call.method(), "Wrapping call into a single-link chain");
                store.dispatch_chain(ChainAction::single(call)).await;
                Handled::Redispatched
            }
            Action::Chain(chain) => {
                self.run_chain(store, chain).await;
                Handled::Settled
            }
            plain @ Action::Plain(_) => Handled::Forwarded(next(plain)),
        }
    }

    /// Run a chain's links strictly in order.
    ///
    /// A skipped link hands `None` to the next one. The first failing link
    /// halts the chain; the failure has already been dispatched and hooked, so
    /// nothing is returned.
    pub async fn run_chain(&self, store: &S, chain: ChainAction<S>) {
        let total = chain.len();
        let mut prev: Option<Value> = None;

        for (index, link) in chain.into_links().into_iter().enumerate() {
            let action = link(prev.as_ref());
            match self.run_link(store, &action).await {
                Ok(LinkOutcome::Completed(body)) => prev = Some(body),
                Ok(LinkOutcome::Skipped) => prev = None,
                Err(e) => {
                    debug!(link = index, links = total, error = %e, "Chain halted");
                    return;
                }
            }
        }
        debug!(links = total, "Chain completed");
    }

    /// Run a single link: resolve, gate, execute.
    pub async fn run_link(&self, store: &S, action: &CallAction<S>) -> Result<LinkOutcome> {
        let params = self.resolver.resolve(&action.call);

        if let Some(policy) = params.revalidate {
            let key = revalidation_key(&params);
            if !self.revalidation.admit(&key, policy) {
                debug!(method = %params.method, url = %params.url, "Skipping call within revalidation window");
                return Ok(LinkOutcome::Skipped);
            }
        }

        self.executor
            .execute(store, action, &params)
            .await
            .map(LinkOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiError;
    use crate::action::{CallDescriptor, PlainAction, Revalidate};
    use crate::test_support::{RecordingStore, ScriptedTransport};
    use http::StatusCode;
    use serde_json::json;

    fn middleware(transport: &Arc<ScriptedTransport>) -> ApiMiddleware<RecordingStore> {
        ApiMiddleware::with_transport(
            ApiChainConfig::new("http://localhost:3000"),
            transport.clone(),
        )
    }

    #[tokio::test]
    async fn test_plain_action_is_forwarded() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = RecordingStore::new();
        let mw = middleware(&transport);

        let handled = mw
            .handle(&store, PlainAction::new("SOMETHING").into(), |action| {
                action.as_plain().map(|p| p.kind.clone())
            })
            .await;

        assert_eq!(handled.into_forwarded(), Some(Some("SOMETHING".to_string())));
        assert!(transport.requests().is_empty());
        assert!(store.actions().is_empty());
    }

    #[tokio::test]
    async fn test_call_is_redispatched_as_single_chain() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = RecordingStore::new();
        let mw = middleware(&transport);

        let call = CallAction::new(CallDescriptor::get("/a")).field("extra", 1);
        let handled = mw.handle(&store, call.into(), |_| ()).await;

        assert!(matches!(handled, Handled::Redispatched));
        assert!(transport.requests().is_empty());

        let actions = store.actions();
        assert_eq!(actions.len(), 1);
        let chain = actions[0].as_chain().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!((chain.links()[0])(None).fields["extra"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redispatched_call_settles_before_handle_returns() {
        let transport = Arc::new(
            ScriptedTransport::new().with_latency(std::time::Duration::from_millis(250)),
        );
        transport.push_ok(StatusCode::OK, json!({ "id": 7 }));
        let store = RecordingStore::new();
        let mw = Arc::new(middleware(&transport));
        store.route_to(mw.clone());

        let call = CallAction::new(CallDescriptor::get("/a").success_type("A_OK"));
        let handled = mw.handle(&store, call.into(), |_| ()).await;

        assert!(matches!(handled, Handled::Redispatched));
        assert_eq!(transport.events(), vec!["start /a", "end /a"]);
        assert_eq!(store.kinds(), vec!["A_OK"]);
        assert_eq!(store.plain_actions()[0].response, Some(json!({ "id": 7 })));
    }

    #[tokio::test]
    async fn test_chain_passes_previous_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(StatusCode::OK, json!({ "id": "the-id-1" }));
        transport.push_ok(StatusCode::OK, json!({ "done": true }));
        let store = RecordingStore::new();
        let mw = middleware(&transport);

        let chain = ChainAction::new()
            .then(|_| CallDescriptor::post("/the-url/path-1").success_type("FIRST"))
            .then(|prev: Option<&Value>| {
                let id = prev.and_then(|body| body["id"].as_str()).unwrap_or("none");
                CallDescriptor::get(format!("/the-url/{id}")).success_type("SECOND")
            });

        let handled = mw.handle(&store, chain.into(), |_| ()).await;

        assert!(matches!(handled, Handled::Settled));
        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:3000/the-url/path-1",
                "http://localhost:3000/the-url/the-id-1",
            ]
        );
        assert_eq!(store.kinds(), vec!["FIRST", "SECOND"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_links_run_sequentially() {
        let transport = Arc::new(ScriptedTransport::new().with_latency(std::time::Duration::from_millis(100)));
        let store = RecordingStore::new();
        let mw = middleware(&transport);

        let chain = ChainAction::new()
            .then(|_| CallDescriptor::get("/one"))
            .then(|_| CallDescriptor::get("/two"))
            .then(|_| CallDescriptor::get("/three"));
        mw.run_chain(&store, chain).await;

        assert_eq!(
            transport.events(),
            vec![
                "start /one",
                "end /one",
                "start /two",
                "end /two",
                "start /three",
                "end /three",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_halts_chain() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_err(ApiError::Response {
            status: 500,
            data: Value::Null,
        });
        let store = RecordingStore::new();
        let mw = middleware(&transport);

        let chain = ChainAction::new()
            .then(|_| CallDescriptor::get("/one").error_type("ONE_FAILED"))
            .then(|_| CallDescriptor::get("/two").success_type("TWO_OK"));
        mw.run_chain(&store, chain).await;

        assert_eq!(transport.requests().len(), 1);
        assert_eq!(store.kinds(), vec!["ONE_FAILED"]);
    }

    #[tokio::test]
    async fn test_skipped_link_hands_none_forward() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = RecordingStore::new();
        let mw = middleware(&transport);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = seen.clone();
            let chain = ChainAction::new()
                .then(|_| CallDescriptor::get("/cached").revalidate(Revalidate::Never))
                .then(move |prev: Option<&Value>| {
                    seen.lock().push(prev.cloned());
                    CallDescriptor::get("/after")
                });
            mw.run_chain(&store, chain).await;
        }

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:3000/cached",
                "http://localhost:3000/after",
                "http://localhost:3000/after",
            ]
        );
        assert_eq!(*seen.lock(), vec![Some(json!({})), None]);
    }

    #[tokio::test]
    async fn test_shared_revalidation_store() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = RecordingStore::new();
        let shared = Arc::new(RevalidationStore::default());
        let first = middleware(&transport).with_revalidation_store(shared.clone());
        let second = middleware(&transport).with_revalidation_store(shared.clone());

        let call = || CallAction::new(CallDescriptor::get("/once").revalidate(Revalidate::Never));
        assert!(matches!(
            first.run_link(&store, &call()).await,
            Ok(LinkOutcome::Completed(_))
        ));
        assert!(matches!(
            second.run_link(&store, &call()).await,
            Ok(LinkOutcome::Skipped)
        ));
        assert_eq!(shared.len(), 1);
        assert_eq!(transport.requests().len(), 1);
    }
}
