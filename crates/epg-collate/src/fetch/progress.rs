//! Periodic progress reporting for the fetch batch.
//!
//! Workers bump shared atomic counters; a background task logs a snapshot
//! every `progressSec`. A cadence of zero disables the reporter entirely.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

/// Shared counters for one batch.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    pub total: AtomicUsize,
    pub done: AtomicUsize,
    pub failed: AtomicUsize,
    pub running: AtomicUsize,
}

impl ProgressCounters {
    pub fn new(total: usize) -> Arc<Self> {
        let counters = Self::default();
        counters.total.store(total, Ordering::Relaxed);
        Arc::new(counters)
    }

    /// Sites not yet picked up by any worker.
    pub fn queued(&self) -> usize {
        let total = self.total.load(Ordering::Relaxed);
        let accounted = self.done.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
            + self.running.load(Ordering::Relaxed);
        total.saturating_sub(accounted)
    }

    pub fn snapshot(&self) -> (usize, usize, usize, usize) {
        (
            self.done.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.running.load(Ordering::Relaxed),
            self.queued(),
        )
    }
}

/// Spawn the reporter task; returns `None` when disabled.
pub fn spawn_reporter(
    counters: Arc<ProgressCounters>,
    cadence_secs: u64,
) -> Option<JoinHandle<()>> {
    if cadence_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cadence_secs));
        // the immediate first tick would just report all-queued
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (done, failed, running, queued) = counters.snapshot();
            info!("progress: done={done} failed={failed} running={running} queued={queued}");
        }
    }))
}
