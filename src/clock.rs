//! Monotonic time source used for staleness checks.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// A monotonic clock.
///
/// `now()` returns the time elapsed since an arbitrary, fixed origin. Only differences between
/// two readings of the same clock are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A [`Clock`] that only moves when told to. Useful to test staleness deterministically.
///
/// ```
/// # use std::time::Duration;
/// # use featureboard::{Clock, ManualClock};
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now(), Duration::from_secs(5));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    /// Move the clock forward, saturating at `u64::MAX` milliseconds.
    pub fn advance(&self, by: Duration) {
        let by = saturating_millis(by);
        let _ = self
            .millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |millis| {
                Some(millis.saturating_add(by))
            });
    }

    pub fn set(&self, now: Duration) {
        self.millis.store(saturating_millis(now), Ordering::SeqCst);
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Clock, ManualClock};

    #[test]
    fn manual_clock_saturates_instead_of_truncating() {
        let clock = ManualClock::new();

        clock.set(Duration::MAX);
        assert_eq!(clock.now(), Duration::from_millis(u64::MAX));

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();

        clock.advance(Duration::from_millis(1500));
        clock.advance(Duration::from_millis(500));

        assert_eq!(clock.now(), Duration::from_secs(2));
    }
}
