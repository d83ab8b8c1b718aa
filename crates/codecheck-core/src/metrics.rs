//! Global atomic counters for the compliance engine.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the CLI does so before exiting).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    evaluations: AtomicU64,
    pairs_judged: AtomicU64,
    judgment_failures: AtomicU64,
    timeouts: AtomicU64,
    records_skipped: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            evaluations: AtomicU64::new(0),
            pairs_judged: AtomicU64::new(0),
            judgment_failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
        }
    }

    pub fn inc_evaluations(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations", "counter incremented");
    }

    /// Count one finished (component, rule) or relationship judgment.
    pub fn inc_pairs_judged(&self) {
        self.pairs_judged.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "pairs_judged", "counter incremented");
    }

    pub fn inc_judgment_failures(&self) {
        self.judgment_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "judgment_failures", "counter incremented");
    }

    /// Pairs cut short by the per-pair timeout or the call budget.
    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "timeouts", "counter incremented");
    }

    pub fn inc_records_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "records_skipped", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            evaluations = self.evaluations(),
            pairs_judged = self.pairs_judged(),
            judgment_failures = self.judgment_failures(),
            timeouts = self.timeouts(),
            records_skipped = self.records_skipped(),
        );
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn pairs_judged(&self) -> u64 {
        self.pairs_judged.load(Ordering::Relaxed)
    }

    pub fn judgment_failures(&self) -> u64 {
        self.judgment_failures.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.evaluations.store(0, Ordering::Relaxed);
        self.pairs_judged.store(0, Ordering::Relaxed);
        self.judgment_failures.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.records_skipped.store(0, Ordering::Relaxed);
    }
}
