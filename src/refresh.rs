//! Single-flight "fetch + decode + replace store" unit.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use crate::{
    decoder::Decoder,
    store::FeatureStore,
    transport::{Transport, ALL_FEATURES_PATH},
    validator::ValidatorCache,
    Error, Result,
};

/// Result of a [`RefreshCoordinator::refresh`] call.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// New definitions were fetched and applied to the store.
    Updated,
    /// The server answered 304. The store is unchanged.
    Unchanged,
    /// Another refresh was in flight. Nothing was fetched; the caller should keep using its
    /// current snapshot.
    AlreadyInProgress,
    /// The fetch or decode failed. The store and validator are unchanged.
    Failed(Error),
}

impl RefreshOutcome {
    /// `true` if the server was reached and answered with usable data (200 or 304).
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Updated | RefreshOutcome::Unchanged)
    }
}

/// Coordinates refreshes of a [`FeatureStore`] so that at most one fetch is in flight at any
/// time.
///
/// Acquiring the in-flight flag never blocks: a caller that loses gets
/// [`RefreshOutcome::AlreadyInProgress`] immediately.
pub struct RefreshCoordinator {
    store: Arc<FeatureStore>,
    transport: Box<dyn Transport>,
    decoder: Box<dyn Decoder>,
    validator: ValidatorCache,
    in_flight: AtomicBool,
    /// Time of the last refresh that reached the server and got 200 or 304.
    last_success: RwLock<Option<DateTime<Utc>>>,
    /// Used to report when a failing refresh leaves the store serving stale definitions.
    max_age: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<FeatureStore>,
        transport: impl Transport + 'static,
        decoder: impl Decoder + 'static,
        max_age: Duration,
    ) -> RefreshCoordinator {
        RefreshCoordinator {
            store,
            transport: Box::new(transport),
            decoder: Box::new(decoder),
            validator: ValidatorCache::new(),
            in_flight: AtomicBool::new(false),
            last_success: RwLock::new(None),
            max_age,
        }
    }

    pub fn store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    /// Time the definitions were last confirmed current, either by new data or by a 304.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self
            .last_success
            .read()
            .expect("thread holding last_success lock should not panic")
    }

    /// `true` if no refresh has confirmed the definitions within `max_age`.
    pub fn is_stale(&self) -> bool {
        self.age().map_or(true, |age| age >= self.max_age)
    }

    fn age(&self) -> Option<Duration> {
        let last_success = self.last_success()?;
        Some((Utc::now() - last_success).to_std().unwrap_or_default())
    }

    /// Validator of the last applied response.
    pub fn validator(&self) -> Option<String> {
        self.validator.get()
    }

    /// Fetch the latest definitions and replace the store with them.
    ///
    /// Failures are logged and reported through the returned outcome; the last known-good
    /// definitions stay in place.
    pub fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            log::debug!(target: "featureboard", "refresh already in progress, skipping");
            return RefreshOutcome::AlreadyInProgress;
        };

        match self.fetch_and_apply() {
            Ok(outcome) => {
                *self
                    .last_success
                    .write()
                    .expect("thread holding last_success lock should not panic") = Some(Utc::now());
                outcome
            }
            Err(err) => {
                log::warn!(target: "featureboard", "failed to refresh feature definitions: {:?}", err);
                self.report_staleness();
                RefreshOutcome::Failed(err)
            }
        }
    }

    fn fetch_and_apply(&self) -> Result<RefreshOutcome> {
        let validator = self.validator.get();

        log::debug!(target: "featureboard", etag = validator.as_deref(); "fetching feature definitions");
        let response = self
            .transport
            .conditional_get(ALL_FEATURES_PATH, validator.as_deref())?;

        match response.status {
            StatusCode::NOT_MODIFIED => {
                log::debug!(target: "featureboard", "feature definitions not modified");
                Ok(RefreshOutcome::Unchanged)
            }
            StatusCode::OK => {
                let definitions = self.decoder.decode(&response.body)?;
                let count = definitions.len();

                self.store.apply(definitions);
                self.validator.update(response.validator);

                let etag = self.validator.get();
                log::debug!(target: "featureboard",
                            count,
                            etag = etag.as_deref();
                            "applied feature definitions");
                Ok(RefreshOutcome::Updated)
            }
            status => Err(Error::UnexpectedStatus(status)),
        }
    }

    fn report_staleness(&self) {
        let Some(age) = self.age() else {
            log::warn!(target: "featureboard", "no feature definitions loaded, serving defaults");
            return;
        };

        if age >= self.max_age {
            log::warn!(target: "featureboard",
                       age_secs = age.as_secs(),
                       max_age_secs = self.max_age.as_secs();
                       "serving stale feature definitions");
        }
    }
}

/// Holds the in-flight flag and clears it on drop, including on unwind.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<InFlightGuard<'a>> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| InFlightGuard { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{mpsc, Arc},
        time::Duration,
    };

    use reqwest::StatusCode;

    use super::{RefreshCoordinator, RefreshOutcome};
    use crate::{
        decoder::JsonDecoder, models::Value, store::FeatureStore, test_utils::FakeTransport, Error,
    };

    const MAX_AGE: Duration = Duration::from_secs(30);

    fn coordinator(transport: Arc<FakeTransport>) -> RefreshCoordinator {
        RefreshCoordinator::new(Arc::new(FeatureStore::new()), transport, JsonDecoder, MAX_AGE)
    }

    #[test]
    fn updates_store_and_validator_on_200() {
        let transport = Arc::new(FakeTransport::new().ok(
            r#"[{"featureKey": "a", "defaultValue": true, "audienceExceptions": []}]"#,
            Some("\"v1\""),
        ));
        let coordinator = coordinator(transport.clone());

        assert!(matches!(coordinator.refresh(), RefreshOutcome::Updated));

        let snapshot = coordinator.store().snapshot();
        assert_eq!(snapshot.get("a").unwrap().default_value, Value::Boolean(true));
        assert_eq!(coordinator.validator().as_deref(), Some("\"v1\""));
    }

    #[test]
    fn sends_previous_validator() {
        let transport = Arc::new(FakeTransport::new().ok("[]", Some("\"v1\"")));
        let coordinator = coordinator(transport.clone());

        coordinator.refresh();
        coordinator.refresh();

        assert_eq!(
            transport.validators(),
            vec![None, Some("\"v1\"".to_owned())]
        );
    }

    #[test]
    fn not_modified_leaves_store_untouched() {
        let transport = Arc::new(
            FakeTransport::new()
                .ok(
                    r#"[{"featureKey": "a", "defaultValue": "x", "audienceExceptions": []}]"#,
                    Some("\"v1\""),
                )
                .status(StatusCode::NOT_MODIFIED),
        );
        let coordinator = coordinator(transport);
        coordinator.refresh();
        let before = coordinator.store().snapshot();

        assert!(matches!(coordinator.refresh(), RefreshOutcome::Unchanged));

        let after = coordinator.store().snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(coordinator.validator().as_deref(), Some("\"v1\""));
    }

    #[test]
    fn failures_preserve_last_known_good_state() {
        let transport = Arc::new(
            FakeTransport::new()
                .ok(
                    r#"[{"featureKey": "a", "defaultValue": 1, "audienceExceptions": []}]"#,
                    Some("\"v1\""),
                )
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .ok("not json", Some("\"v2\""))
                .error(Error::from(io::Error::new(io::ErrorKind::TimedOut, "timed out"))),
        );
        let coordinator = coordinator(transport);
        coordinator.refresh();
        let before = coordinator.store().snapshot();

        assert!(matches!(
            coordinator.refresh(),
            RefreshOutcome::Failed(Error::UnexpectedStatus(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert!(matches!(
            coordinator.refresh(),
            RefreshOutcome::Failed(Error::Decode(_))
        ));
        assert!(matches!(coordinator.refresh(), RefreshOutcome::Failed(_)));

        assert!(Arc::ptr_eq(&before, &coordinator.store().snapshot()));
        assert_eq!(coordinator.validator().as_deref(), Some("\"v1\""));
    }

    #[test]
    fn not_modified_resets_staleness() {
        let transport = Arc::new(
            FakeTransport::new()
                .ok("[]", Some("\"v1\""))
                .status(StatusCode::NOT_MODIFIED)
                .status(StatusCode::INTERNAL_SERVER_ERROR),
        );
        let coordinator = RefreshCoordinator::new(
            Arc::new(FeatureStore::new()),
            transport,
            JsonDecoder,
            Duration::from_millis(50),
        );
        assert!(coordinator.is_stale());

        coordinator.refresh();
        let first_success = coordinator.last_success().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(coordinator.is_stale());

        assert!(matches!(coordinator.refresh(), RefreshOutcome::Unchanged));
        assert!(coordinator.last_success().unwrap() > first_success);

        assert!(matches!(coordinator.refresh(), RefreshOutcome::Failed(_)));
        assert!(!coordinator.is_stale());
    }

    #[test]
    fn failure_does_not_advance_last_success() {
        let transport = Arc::new(FakeTransport::new().status(StatusCode::BAD_GATEWAY));
        let coordinator = coordinator(transport);

        assert!(matches!(coordinator.refresh(), RefreshOutcome::Failed(_)));

        assert!(coordinator.last_success().is_none());
        assert!(coordinator.is_stale());
    }

    #[test]
    fn flag_is_released_after_failure() {
        let transport = Arc::new(
            FakeTransport::new()
                .status(StatusCode::UNAUTHORIZED)
                .ok("[]", None),
        );
        let coordinator = coordinator(transport.clone());

        assert!(matches!(coordinator.refresh(), RefreshOutcome::Failed(_)));
        assert!(matches!(coordinator.refresh(), RefreshOutcome::Updated));
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn concurrent_refreshes_fetch_once() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let transport = Arc::new(FakeTransport::gated(entered_tx, release_rx).ok("[]", None));
        let coordinator = Arc::new(coordinator(transport.clone()));

        let leader = {
            let coordinator = coordinator.clone();
            std::thread::spawn(move || coordinator.refresh())
        };
        entered_rx.recv().unwrap();

        // The leader is parked inside the transport; everyone else must bail out without waiting.
        let followers: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                std::thread::spawn(move || coordinator.refresh())
            })
            .collect();
        for follower in followers {
            assert!(matches!(
                follower.join().unwrap(),
                RefreshOutcome::AlreadyInProgress
            ));
        }

        release_tx.send(()).unwrap();
        assert!(matches!(leader.join().unwrap(), RefreshOutcome::Updated));
        assert_eq!(transport.calls(), 1);
    }
}
