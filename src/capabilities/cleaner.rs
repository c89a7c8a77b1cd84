//! Periodic sweep for expired discovery entries.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::store::ExpirySource;
use crate::errors::RuntimeError;
use crate::types::{now_ms, DiscoveryEntry};

/// Callback receiving the expired entries of one sweep.
pub type CleanupAction = Arc<dyn Fn(HashSet<DiscoveryEntry>) + Send + Sync>;

/// Runs a cleanup action on a fixed interval.
///
/// Ticks never overlap: the action runs inline on the sweep task. A panicking
/// action is logged and the next tick still fires.
pub struct ExpiredEntryCleaner {
    interval: Duration,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExpiredEntryCleaner {
    /// Fails with `IllegalArgument` for a zero interval.
    pub fn new(interval: Duration) -> Result<Self, RuntimeError> {
        if interval.is_zero() {
            return Err(RuntimeError::IllegalArgument(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            interval,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        })
    }

    /// Start sweeping `stores`. Each tick calls `action` once with the union
    /// of entries whose expiry date has passed, even when that set is empty.
    pub fn schedule_cleanup(&self, action: CleanupAction, stores: Vec<Arc<dyn ExpirySource>>) {
        if self.cancel.is_cancelled() {
            log::warn!("[ExpiredEntryCleaner] cleanup not scheduled, cleaner was shut down");
            return;
        }
        let period = self.interval;
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => run_sweep(&action, &stores),
                }
            }
            log::debug!("[ExpiredEntryCleaner] sweep task stopped");
        });

        if let Some(previous) = self.handle.lock().replace(task) {
            log::warn!("[ExpiredEntryCleaner] replacing previously scheduled cleanup");
            previous.abort();
        }
    }

    /// Stop the sweep. Calling it again has no effect.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for ExpiredEntryCleaner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_sweep(action: &CleanupAction, stores: &[Arc<dyn ExpirySource>]) {
    let now = now_ms();
    let expired: HashSet<DiscoveryEntry> = stores
        .iter()
        .flat_map(|store| store.all_discovery_entries())
        .filter(|entry| entry.expiry_date_ms < now)
        .collect();
    log::debug!("[ExpiredEntryCleaner] {} expired entries found", expired.len());

    if catch_unwind(AssertUnwindSafe(|| action(expired))).is_err() {
        log::error!("[ExpiredEntryCleaner] cleanup action panicked, continuing with next tick");
    }
}
