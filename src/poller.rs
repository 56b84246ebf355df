//! A background poller thread that periodically refreshes the feature store.
use std::{
    sync::{mpsc::RecvTimeoutError, Arc, Condvar, Mutex},
    time::Duration,
};

use rand::{thread_rng, Rng};

use crate::{
    refresh::{RefreshCoordinator, RefreshOutcome},
    Error, Result,
};

/// Configuration for [`PollerThread`].
// Not implementing `Copy` as we may add non-copyable fields in the future.
#[derive(Debug, Clone)]
pub struct PollerThreadConfig {
    /// Interval to wait between refreshes. The client sets it to `max_age`.
    pub interval: Duration,
    /// Jitter applies a randomized duration to wait between refreshes. This helps to avoid
    /// multiple server instances synchronizing and producing spiky network load.
    ///
    /// Never more than half of `interval`. Defaults to zero.
    pub jitter: Duration,
}

impl PollerThreadConfig {
    pub fn new(interval: Duration) -> PollerThreadConfig {
        PollerThreadConfig {
            interval,
            jitter: Duration::ZERO,
        }
    }

    /// Update poll interval jitter with `jitter`, capped at half of the interval.
    pub fn with_jitter(mut self, jitter: Duration) -> PollerThreadConfig {
        self.jitter = jitter.min(self.interval / 2);
        self
    }
}

/// A feature store poller thread.
///
/// The thread refreshes once right away, then every `interval` through the
/// [`RefreshCoordinator`], so a poll never overlaps with an on-demand or manual refresh.
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::SyncSender<()>,

    /// Holds `None` until the first refresh attempt has finished, then the result of the latest
    /// attempt.
    result: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl PollerThread {
    /// Starts the poller thread.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the thread failed to start.
    pub fn start(
        coordinator: Arc<RefreshCoordinator>,
        config: PollerThreadConfig,
    ) -> std::io::Result<PollerThread> {
        // Using `sync_channel` here as it makes `stop_sender` `Sync` (shareable between
        // threads). Buffer size of 1 is enough: we only ever send a stop command and can ignore
        // a full buffer.
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let result = Arc::new((Mutex::new(None), Condvar::new()));

        let join_handle = {
            // Cloning Arc for move into thread
            let result = Arc::clone(&result);
            let update_result = move |value| {
                let (slot, condvar) = &*result;
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some(value);
                }
                condvar.notify_all();
            };

            std::thread::Builder::new()
                .name("featureboard-poller".to_owned())
                .spawn(move || {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| loop {
                        match coordinator.refresh() {
                            RefreshOutcome::Failed(err) => update_result(Err(err)),
                            // AlreadyInProgress: another refresh is loading the store right now.
                            _ => update_result(Ok(())),
                        }

                        let timeout = jitter(config.interval, config.jitter);
                        match stop_receiver.recv_timeout(timeout) {
                            Err(RecvTimeoutError::Timeout) => {
                                // Timed out. Loop back to refresh.
                            }
                            Ok(()) => {
                                log::debug!(target: "featureboard", "poller thread received stop command");
                                return;
                            }
                            Err(RecvTimeoutError::Disconnected) => {
                                // The `PollerThread` handle was dropped.
                                log::debug!(target: "featureboard", "poller thread received disconnected");
                                return;
                            }
                        }
                    }));

                    if result.is_err() {
                        log::error!(target: "featureboard", "poller thread panicked");
                        update_result(Err(Error::PollerThreadPanicked));
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            result,
        })
    }

    /// Block until the first refresh attempt has finished.
    ///
    /// # Errors
    ///
    /// Returns the error of the refresh attempt, or [`Error::PollerThreadPanicked`].
    pub fn wait_for_configuration(&self) -> Result<()> {
        let (slot, condvar) = &*self.result;
        let mut lock = slot.lock().map_err(|_| Error::PollerThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => return result.clone(),
                None => {
                    lock = condvar.wait(lock).map_err(|_| Error::PollerThreadPanicked)?;
                }
            }
        }
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop. A refresh that is already in
    /// flight runs to completion (or times out).
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited) or the buffer is full
        // (another stop command is pending). Either way the thread stops.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the thread has panicked.
    pub fn shutdown(self) -> Result<()> {
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}
