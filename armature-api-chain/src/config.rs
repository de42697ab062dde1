//! API chain configuration.

use crate::encoding::DefaultParams;
use crate::interceptor::{ErrorInterceptor, ProceedInterceptor};
use crate::middleware::Store;
use crate::revalidation::DEFAULT_REVALIDATION_CAPACITY;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on interceptor-driven replays per call.
pub const MAX_REPLAY_TIMES: u32 = 2;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Generator for per-attempt default params.
pub type DefaultParamsFn<S> = Arc<dyn Fn(&S) -> DefaultParams + Send + Sync>;

/// API chain configuration.
pub struct ApiChainConfig<S: Store> {
    /// Prefix for descriptor paths.
    pub base_url: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Maximum replays per call before it fails with `MaxReplayReached`.
    pub max_replay_times: u32,
    /// Decides between failing and replaying on API errors.
    pub error_interceptor: Arc<dyn ErrorInterceptor<S>>,
    /// Default headers, body and query, evaluated before every attempt.
    pub default_params: DefaultParamsFn<S>,
    /// Number of distinct calls the revalidation gate remembers.
    pub revalidation_capacity: usize,
    /// User agent string for the default transport.
    pub user_agent: String,
}

impl<S: Store> ApiChainConfig<S> {
    /// Create a configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_replay_times: MAX_REPLAY_TIMES,
            error_interceptor: Arc::new(ProceedInterceptor),
            default_params: Arc::new(|_: &S| DefaultParams::default()),
            revalidation_capacity: DEFAULT_REVALIDATION_CAPACITY,
            user_agent: format!("armature-api-chain/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Create a new configuration builder.
    pub fn builder(base_url: impl Into<String>) -> ApiChainConfigBuilder<S> {
        ApiChainConfigBuilder {
            config: Self::new(base_url),
        }
    }
}

impl<S: Store> Clone for ApiChainConfig<S> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            max_replay_times: self.max_replay_times,
            error_interceptor: Arc::clone(&self.error_interceptor),
            default_params: Arc::clone(&self.default_params),
            revalidation_capacity: self.revalidation_capacity,
            user_agent: self.user_agent.clone(),
        }
    }
}

impl<S: Store> fmt::Debug for ApiChainConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiChainConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_replay_times", &self.max_replay_times)
            .field("revalidation_capacity", &self.revalidation_capacity)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Builder for API chain configuration.
pub struct ApiChainConfigBuilder<S: Store> {
    config: ApiChainConfig<S>,
}

impl<S: Store> ApiChainConfigBuilder<S> {
    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the replay bound.
    pub fn max_replay_times(mut self, max: u32) -> Self {
        self.config.max_replay_times = max;
        self
    }

    /// Set the error interceptor.
    pub fn error_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: ErrorInterceptor<S> + 'static,
    {
        self.config.error_interceptor = Arc::new(interceptor);
        self
    }

    /// Set the default-params generator.
    pub fn default_params<F>(mut self, generate: F) -> Self
    where
        F: Fn(&S) -> DefaultParams + Send + Sync + 'static,
    {
        self.config.default_params = Arc::new(generate);
        self
    }

    /// Set how many distinct calls the revalidation gate remembers.
    pub fn revalidation_capacity(mut self, capacity: usize) -> Self {
        self.config.revalidation_capacity = capacity;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ApiChainConfig<S> {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingStore;

    #[test]
    fn test_default_config() {
        let config: ApiChainConfig<RecordingStore> = ApiChainConfig::new("http://localhost:3000");
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.max_replay_times, MAX_REPLAY_TIMES);
        assert_eq!(config.revalidation_capacity, DEFAULT_REVALIDATION_CAPACITY);
        assert!(config.user_agent.starts_with("armature-api-chain/"));
        assert_eq!(
            (config.default_params)(&RecordingStore::new()),
            DefaultParams::default()
        );
    }

    #[test]
    fn test_config_builder() {
        let config = ApiChainConfig::<RecordingStore>::builder("http://api.test")
            .timeout(Duration::from_secs(5))
            .max_replay_times(6)
            .revalidation_capacity(16)
            .user_agent("my-app/1.0")
            .default_params(|_| DefaultParams::new().header("X-App", "test"))
            .build();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_replay_times, 6);
        assert_eq!(config.revalidation_capacity, 16);
        assert_eq!(config.user_agent, "my-app/1.0");

        let cloned = config.clone();
        let defaults = (cloned.default_params)(&RecordingStore::new());
        assert_eq!(defaults.headers["X-App"], "test");
    }
}
