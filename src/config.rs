use std::{str::FromStr, sync::Arc, time::Duration};

use crate::{
    clock::{Clock, SystemClock},
    decoder::{Decoder, JsonDecoder},
    transport::Transport,
    Error, FeatureBoardClient, Result,
};

/// How the client keeps its feature definitions fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// A background thread refreshes every `max_age`.
    #[default]
    Polling,
    /// [`FeatureBoardClient::request`] refreshes when the definitions are older than `max_age`.
    OnDemand,
    /// Only [`FeatureBoardClient::refresh`] refreshes.
    Manual,
}

impl FromStr for UpdateStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "polling" => Ok(UpdateStrategy::Polling),
            "on-demand" | "on-request" => Ok(UpdateStrategy::OnDemand),
            "manual" => Ok(UpdateStrategy::Manual),
            other => Err(Error::InvalidUpdateStrategy(other.to_owned())),
        }
    }
}

/// Configuration for [`FeatureBoardClient`].
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) max_age: Duration,
    pub(crate) update_strategy: UpdateStrategy,
    pub(crate) request_timeout: Duration,
    pub(crate) poll_jitter: Duration,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) decoder: Arc<dyn Decoder>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ClientConfig {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://client.featureboard.app";
    /// Default value for [`ClientConfig::max_age`].
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30);
    /// Smallest accepted `max_age`. Lower values are raised to it.
    pub const MIN_MAX_AGE: Duration = Duration::from_secs(1);
    /// Default value for [`ClientConfig::request_timeout`].
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a default configuration using the specified environment API key.
    ///
    /// ```
    /// # use featureboard::ClientConfig;
    /// ClientConfig::from_api_key("api-key");
    /// ```
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            max_age: ClientConfig::DEFAULT_MAX_AGE,
            update_strategy: UpdateStrategy::default(),
            request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
            poll_jitter: Duration::ZERO,
            transport: None,
            decoder: Arc::new(JsonDecoder),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Polling interval and on-demand staleness threshold. Values below one second are raised to
    /// [`ClientConfig::MIN_MAX_AGE`].
    ///
    /// ```
    /// # use std::time::Duration;
    /// # use featureboard::ClientConfig;
    /// let config = ClientConfig::from_api_key("api-key").max_age(Duration::from_millis(10));
    /// assert_eq!(config.get_max_age(), Duration::from_secs(1));
    /// ```
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age.max(ClientConfig::MIN_MAX_AGE);
        self
    }

    pub fn get_max_age(&self) -> Duration {
        self.max_age
    }

    pub fn update_strategy(mut self, update_strategy: UpdateStrategy) -> Self {
        self.update_strategy = update_strategy;
        self
    }

    /// Upper bound for a single fetch. A request that takes longer counts as failed.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Random amount (up to `jitter`) subtracted from each polling interval. It is capped at half
    /// of `max_age` when polling starts.
    pub fn poll_jitter(mut self, jitter: Duration) -> Self {
        self.poll_jitter = jitter;
        self
    }

    /// Replace the HTTP transport. `base_url`, the API key and `request_timeout` are then up to
    /// the supplied transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Create a [`FeatureBoardClient`] and load the initial feature definitions.
    ///
    /// This blocks until the first refresh attempt finishes. A failed attempt is logged and the
    /// client starts with an empty store, serving caller defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`] if `base_url` cannot be parsed.
    /// - [`Error::Io`] if the poller thread cannot be started.
    pub fn start(self) -> Result<FeatureBoardClient> {
        FeatureBoardClient::start(self)
    }
}
