use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
};

use crate::{
    audience::AudienceSource,
    config::{ClientConfig, UpdateStrategy},
    eval::{self, EvaluationDetails, FeatureValue},
    poller::{PollerThread, PollerThreadConfig},
    refresh::{RefreshCoordinator, RefreshOutcome},
    store::{FeatureSnapshot, FeatureStore},
    throttle::OnDemandThrottler,
    transport::{HttpTransport, Transport},
    Result,
};

/// A client for the FeatureBoard service.
///
/// The client owns the feature store and keeps it fresh according to the configured
/// [`UpdateStrategy`]. Feature values are read through an [`EvaluationScope`] obtained from
/// [`FeatureBoardClient::request`].
///
/// # Examples
/// ```no_run
/// # use featureboard::ClientConfig;
/// let client = ClientConfig::from_api_key("api-key").start()?;
///
/// let scope = client.request(["beta-testers"]);
/// if scope.get_bool("new-checkout", false) {
///     // ...
/// }
/// # Ok::<(), featureboard::Error>(())
/// ```
pub struct FeatureBoardClient {
    store: Arc<FeatureStore>,
    coordinator: Arc<RefreshCoordinator>,
    /// Present for [`UpdateStrategy::OnDemand`].
    throttler: Option<OnDemandThrottler>,
    /// Present for [`UpdateStrategy::Polling`].
    poller: Option<PollerThread>,
}

impl FeatureBoardClient {
    pub(crate) fn start(config: ClientConfig) -> Result<FeatureBoardClient> {
        let transport: Arc<dyn Transport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                &config.base_url,
                config.api_key,
                config.request_timeout,
            )?),
        };

        let store = Arc::new(FeatureStore::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            transport,
            config.decoder,
            config.max_age,
        ));

        let mut client = FeatureBoardClient {
            store,
            coordinator,
            throttler: None,
            poller: None,
        };

        log::debug!(target: "featureboard",
                    strategy:? = config.update_strategy,
                    max_age_ms = config.max_age.as_millis() as u64;
                    "starting feature board client");

        match config.update_strategy {
            UpdateStrategy::Polling => {
                let poller = PollerThread::start(
                    client.coordinator.clone(),
                    PollerThreadConfig::new(config.max_age).with_jitter(config.poll_jitter),
                )?;
                if let Err(err) = poller.wait_for_configuration() {
                    log::warn!(target: "featureboard", "initial feature definitions are not available: {:?}", err);
                }
                client.poller = Some(poller);
            }
            UpdateStrategy::OnDemand => {
                let throttler = OnDemandThrottler::new(config.clock, config.max_age);
                // On failure `last_checked_at` stays unset, so the first request retries.
                if client.coordinator.refresh().is_success() {
                    throttler.mark_checked();
                }
                client.throttler = Some(throttler);
            }
            UpdateStrategy::Manual => {
                client.coordinator.refresh();
            }
        }

        Ok(client)
    }

    /// Open an evaluation scope for one unit of work (typically an inbound request) with the
    /// given audience keys.
    ///
    /// With [`UpdateStrategy::OnDemand`] this is where stale definitions get refreshed. Only one
    /// of many concurrent callers performs the refresh; the rest proceed immediately with the
    /// current definitions.
    pub fn request<I>(&self, audience: I) -> EvaluationScope
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        if let Some(throttler) = &self.throttler {
            throttler.maybe_refresh(&self.coordinator);
        }

        EvaluationScope::new(
            self.store.clone(),
            audience.into_iter().map(Into::into).collect(),
        )
    }

    /// Same as [`FeatureBoardClient::request`], reading the audience from `source`.
    pub fn request_for(&self, source: &impl AudienceSource) -> EvaluationScope {
        self.request(source.audience_keys())
    }

    /// Refresh now, regardless of the update strategy.
    ///
    /// Returns [`RefreshOutcome::AlreadyInProgress`] without waiting if another refresh is
    /// running.
    pub fn refresh(&self) -> RefreshOutcome {
        self.coordinator.refresh()
    }

    /// The store's current snapshot.
    pub fn snapshot(&self) -> Arc<FeatureSnapshot> {
        self.store.snapshot()
    }

    /// Stop background polling and wait for the poller thread to exit.
    ///
    /// A fetch already in flight runs to completion or times out.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`](crate::Error::PollerThreadPanicked)
    pub fn shutdown(self) -> Result<()> {
        match self.poller {
            Some(poller) => poller.shutdown(),
            None => Ok(()),
        }
    }
}

/// Feature evaluation bound to a single snapshot.
///
/// The snapshot is captured on the first read (or an explicit
/// [`EvaluationScope::bind_snapshot`]) and kept for the lifetime of the scope, so every value read
/// through one scope comes from the same set of definitions even if the store is refreshed in
/// between.
pub struct EvaluationScope {
    store: Arc<FeatureStore>,
    audience: HashSet<String>,
    snapshot: OnceLock<Arc<FeatureSnapshot>>,
}

impl EvaluationScope {
    pub fn new(store: Arc<FeatureStore>, audience: HashSet<String>) -> EvaluationScope {
        EvaluationScope {
            store,
            audience,
            snapshot: OnceLock::new(),
        }
    }

    /// Bind the store's latest snapshot to this scope, if none is bound yet, and return the bound
    /// snapshot.
    pub fn bind_snapshot(&self) -> &Arc<FeatureSnapshot> {
        self.snapshot.get_or_init(|| self.store.snapshot())
    }

    pub fn audience(&self) -> &HashSet<String> {
        &self.audience
    }

    /// Resolve a feature to any [`FeatureValue`] type.
    pub fn get_value<T: FeatureValue>(&self, feature_key: &str, default: T) -> T {
        eval::resolve(self.bind_snapshot(), feature_key, &self.audience, default)
    }

    pub fn get_details<T: FeatureValue>(
        &self,
        feature_key: &str,
        default: T,
    ) -> EvaluationDetails<T> {
        eval::resolve_details(self.bind_snapshot(), feature_key, &self.audience, default)
    }

    pub fn get_bool(&self, feature_key: &str, default: bool) -> bool {
        self.get_value(feature_key, default)
    }

    pub fn get_number(&self, feature_key: &str, default: f64) -> f64 {
        self.get_value(feature_key, default)
    }

    pub fn get_string(&self, feature_key: &str, default: impl Into<String>) -> String {
        self.get_value(feature_key, default.into())
    }

    /// Resolve an enumerated feature. See [`eval::resolve_enum`].
    pub fn get_enum<T: Clone>(&self, feature_key: &str, variants: &[(&str, T)], default: T) -> T {
        eval::resolve_enum(
            self.bind_snapshot(),
            feature_key,
            &self.audience,
            variants,
            default,
        )
    }
}
