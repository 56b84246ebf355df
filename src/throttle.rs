//! On-demand refresh throttling.
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    clock::{saturating_millis, Clock},
    refresh::{RefreshCoordinator, RefreshOutcome},
};

/// `last_checked_at` value before the first check.
const NEVER: u64 = u64::MAX;

/// Decides, per evaluation scope, whether the store is stale enough to warrant a refresh.
///
/// `last_checked_at` is only ever advanced with a compare-and-set against the value observed
/// when staleness was computed, so among many callers seeing the same stale timestamp exactly one
/// wins and triggers the refresh. The timestamp is taken before the refresh starts so fetch
/// latency does not stretch the interval.
pub struct OnDemandThrottler {
    clock: Arc<dyn Clock>,
    max_age: Duration,
    /// Milliseconds on `clock`, or [`NEVER`].
    last_checked_at: AtomicU64,
}

impl OnDemandThrottler {
    pub fn new(clock: Arc<dyn Clock>, max_age: Duration) -> OnDemandThrottler {
        OnDemandThrottler {
            clock,
            max_age,
            last_checked_at: AtomicU64::new(NEVER),
        }
    }

    /// Clock reading of the last check, or `None` if the store has never been checked.
    pub fn last_checked_at(&self) -> Option<Duration> {
        match self.last_checked_at.load(Ordering::Acquire) {
            NEVER => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Returns `true` if the store is stale and this caller won the right to refresh it.
    pub fn try_claim(&self) -> bool {
        let observed = self.last_checked_at.load(Ordering::Acquire);
        let now = as_millis(self.clock.now());

        if observed != NEVER && now.saturating_sub(observed) < as_millis(self.max_age) {
            return false;
        }

        self.last_checked_at
            .compare_exchange(observed, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record a check that happened outside of [`OnDemandThrottler::try_claim`], such as the
    /// startup refresh. Never moves `last_checked_at` backwards.
    pub fn mark_checked(&self) {
        let now = as_millis(self.clock.now());
        let observed = self.last_checked_at.load(Ordering::Acquire);
        if observed != NEVER && observed >= now {
            return;
        }
        // Losing means a concurrent claim already moved the timestamp forward.
        let _ = self.last_checked_at.compare_exchange(
            observed,
            now,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Refresh through `coordinator` if the store is stale and this caller wins the claim.
    ///
    /// Returns `None` when no refresh was triggered.
    pub fn maybe_refresh(&self, coordinator: &RefreshCoordinator) -> Option<RefreshOutcome> {
        if !self.try_claim() {
            return None;
        }

        log::debug!(target: "featureboard",
                    max_age_ms = as_millis(self.max_age);
                    "feature definitions expired, refreshing");
        Some(coordinator.refresh())
    }
}

fn as_millis(duration: Duration) -> u64 {
    // Saturate one below NEVER so a reading can't collide with the sentinel.
    saturating_millis(duration).min(NEVER - 1)
}
