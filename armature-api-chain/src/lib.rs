//! # Armature API Chain
//!
//! Dispatch-pipeline middleware for declarative API calls and ordered chains
//! of dependent calls.
//!
//! ## Features
//!
//! - **Call Descriptors**: Method, path, query, body, headers and lifecycle action types
//! - **Chains**: Links run strictly in order, each built from the previous response body
//! - **Lifecycle Actions**: Sending, success and error actions dispatched into your store
//! - **Error Interception**: Replay failed calls (token refresh etc.) up to a bound
//! - **Key Shaping**: Snake-case requests and camel-case responses by default
//! - **Revalidation**: Skip identical calls inside a time window
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use armature_api_chain::prelude::*;
//! use async_trait::async_trait;
//!
//! struct AppStore {
//!     api: ApiMiddleware<AppStore>,
//! }
//!
//! #[async_trait]
//! impl Store for AppStore {
//!     type State = ();
//!
//!     fn dispatch(&self, action: Action<Self>) {
//!         println!("{action:?}");
//!     }
//!
//!     async fn dispatch_chain(&self, chain: ChainAction<Self>) {
//!         self.api.run_chain(self, chain).await;
//!     }
//!
//!     fn get_state(&self) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = AppStore {
//!         api: ApiMiddleware::new(ApiChainConfig::new("https://api.example.com"))?,
//!     };
//!
//!     let chain = ChainAction::new()
//!         .then(|_| CallDescriptor::post("/sessions").success_type("SESSION_CREATED"))
//!         .then(|session: Option<&serde_json::Value>| {
//!             let id = session.and_then(|s| s["id"].as_str()).unwrap_or_default();
//!             CallDescriptor::get(format!("/sessions/{id}/profile")).success_type("PROFILE_LOADED")
//!         });
//!
//!     store.dispatch_chain(chain).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Replaying Failed Calls
//!
//! ```rust,no_run
//! use armature_api_chain::prelude::*;
//! use futures::future::BoxFuture;
//!
//! # struct AppStore;
//! # #[async_trait::async_trait]
//! # impl Store for AppStore {
//! #     type State = ();
//! #     fn dispatch(&self, _action: Action<Self>) {}
//! #     async fn dispatch_chain(&self, _chain: ChainAction<Self>) {}
//! #     fn get_state(&self) {}
//! # }
//! let config = ApiChainConfig::<AppStore>::builder("https://api.example.com")
//!     .max_replay_times(1)
//!     .error_interceptor(interceptor_fn(
//!         |ctx: InterceptContext<'_, AppStore>| -> BoxFuture<'static, Recovery> {
//!             let expired = ctx.error.status_code() == Some(401);
//!             Box::pin(async move {
//!                 if expired {
//!                     Recovery::Replay(ReplayParams::new().header("Authorization", "Bearer fresh"))
//!                 } else {
//!                     Recovery::Proceed
//!                 }
//!             })
//!         },
//!     ))
//!     .build();
//! ```

mod action;
mod config;
mod encoding;
mod error;
mod executor;
mod interceptor;
mod middleware;
mod params;
mod response;
mod revalidation;
mod transport;

#[cfg(test)]
mod test_support;

pub use action::{
    Action, AfterError, AfterSuccess, CallAction, CallDescriptor, ChainAction, Link, PlainAction,
    Revalidate,
};
pub use config::{
    ApiChainConfig, ApiChainConfigBuilder, DEFAULT_TIMEOUT, DefaultParamsFn, MAX_REPLAY_TIMES,
};
pub use encoding::{
    DefaultParams, EncodedRequest, FORM_URLENCODED, RequestBody, camelize_keys, decamelize_keys,
    encode_request,
};
pub use error::{ApiError, HookError, Result};
pub use executor::CallExecutor;
pub use interceptor::{
    ErrorInterceptor, FnInterceptor, InterceptContext, LoggingInterceptor, ProceedInterceptor,
    Recovery, ReplayParams, interceptor_fn,
};
pub use middleware::{ApiMiddleware, Handled, LinkOutcome, Store};
pub use params::{ParamsResolver, ResolvedParams};
pub use response::ApiResponse;
pub use revalidation::{DEFAULT_REVALIDATION_CAPACITY, RevalidationStore, revalidation_key};
pub use transport::{OutgoingRequest, ReqwestTransport, Transport};

// Re-export common types
pub use http::{Method, StatusCode};

/// Prelude for common imports.
///
/// ```
/// use armature_api_chain::prelude::*;
/// ```
pub mod prelude {
    pub use crate::action::{Action, CallAction, CallDescriptor, ChainAction, PlainAction, Revalidate};
    pub use crate::config::{ApiChainConfig, ApiChainConfigBuilder, MAX_REPLAY_TIMES};
    pub use crate::encoding::DefaultParams;
    pub use crate::error::{ApiError, Result};
    pub use crate::interceptor::{
        ErrorInterceptor, InterceptContext, Recovery, ReplayParams, interceptor_fn,
    };
    pub use crate::middleware::{ApiMiddleware, Handled, Store};
    pub use crate::transport::Transport;
    pub use http::{Method, StatusCode};
}
