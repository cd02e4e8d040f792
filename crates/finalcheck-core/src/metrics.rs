//! Process-wide scoring counters.
//!
//! Drivers bump these as they work; the pure scoring, selection and gate
//! functions never touch them. [`Metrics::flush`] emits the totals as one
//! `info!` event at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free counters.
pub struct Metrics {
    completions_scored: AtomicU64,
    completions_passed: AtomicU64,
    selections_made: AtomicU64,
    gates_evaluated: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            completions_scored: AtomicU64::new(0),
            completions_passed: AtomicU64::new(0),
            selections_made: AtomicU64::new(0),
            gates_evaluated: AtomicU64::new(0),
        }
    }

    /// Count one scoring call and whether it was rewarded.
    pub fn record_score(&self, passed: bool) {
        self.completions_scored.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.completions_passed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(metric = "completions_scored", passed, "counter incremented");
    }

    pub fn inc_selections(&self) {
        self.selections_made.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "selections_made", "counter incremented");
    }

    pub fn inc_gates(&self) {
        self.gates_evaluated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "gates_evaluated", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            completions_scored = self.completions_scored(),
            completions_passed = self.completions_passed(),
            selections_made = self.selections_made(),
            gates_evaluated = self.gates_evaluated(),
        );
    }

    pub fn completions_scored(&self) -> u64 {
        self.completions_scored.load(Ordering::Relaxed)
    }

    pub fn completions_passed(&self) -> u64 {
        self.completions_passed.load(Ordering::Relaxed)
    }

    pub fn selections_made(&self) -> u64 {
        self.selections_made.load(Ordering::Relaxed)
    }

    pub fn gates_evaluated(&self) -> u64 {
        self.gates_evaluated.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.completions_scored.store(0, Ordering::Relaxed);
        self.completions_passed.store(0, Ordering::Relaxed);
        self.selections_made.store(0, Ordering::Relaxed);
        self.gates_evaluated.store(0, Ordering::Relaxed);
    }
}
