use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, trace, warn};

/// Receives progress notifications from the scorer.
///
/// Notifications are observational. Implementations are called from worker threads while a
/// parallel search runs and must not rely on being called in order.
pub trait ProgressObserver: Sync {
    /// Called every time `processed` reaches a multiple of the configured interval.
    fn on_progress(&self, processed: usize, total: usize);

    /// Called once after the last spectrum.
    fn on_finish(&self, _processed: usize) {}
}

/// Observer ignoring every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _processed: usize, _total: usize) {}
}

/// Logs the search rate.
#[derive(Debug, Clone)]
pub struct TracingProgress {
    start: Instant,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn rate(&self, processed: usize) -> usize {
        let duration = self.start.elapsed().as_millis() as usize;
        processed * 1000 / (duration + 1)
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TracingProgress {
    fn on_progress(&self, processed: usize, total: usize) {
        trace!(
            "- searched {}/{} spectra ({} spectra/s)",
            processed,
            total,
            self.rate(processed)
        );
    }

    fn on_finish(&self, processed: usize) {
        info!(
            "- search:  {:8} ms ({} spectra/s)",
            self.start.elapsed().as_millis(),
            self.rate(processed)
        );
    }
}

/// Terminal progress bar.
#[derive(Clone)]
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new(total: usize) -> Self {
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        Self {
            bar: ProgressBar::new(total as u64).with_style(style),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress(&self, processed: usize, _total: usize) {
        // Shards report out of order
        if processed as u64 > self.bar.position() {
            self.bar.set_position(processed as u64);
        }
    }

    fn on_finish(&self, processed: usize) {
        self.bar.set_position(processed as u64);
        self.bar.finish();
    }
}

/// Invokes `notify` on the observer, a panicking observer is logged and otherwise ignored.
pub(crate) fn notify_observer(
    observer: &dyn ProgressObserver,
    notify: impl FnOnce(&dyn ProgressObserver),
) {
    if catch_unwind(AssertUnwindSafe(|| notify(observer))).is_err() {
        warn!("progress observer panicked, notification dropped");
    }
}
