//! Structured lifecycle events for eval, selection and gate commands.
//!
//! Every helper emits one `info!` (or `debug!`) event with an `event` field
//! naming it, so JSON logs can be filtered by event name.

use tracing::{debug, info};

use crate::gate::GateVerdict;
use crate::scoring::{ScoreResult, ScorerIdentity};

/// RAII guard that keeps a run-scoped span entered.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str, mode: &str) -> Self {
        let span = tracing::info_span!("finalcheck.run", run_id = %run_id, mode = %mode);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_run_started(run_id: &str, mode: &str, scorer: &ScorerIdentity, n_examples: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        mode = %mode,
        scorer = %scorer,
        n_examples = n_examples,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, n_examples: usize, pass_rate: f64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        n_examples = n_examples,
        pass_rate = pass_rate,
    );
}

pub fn emit_example_scored(example_id: &str, scored: &ScoreResult, missing: bool) {
    debug!(
        event = "example.scored",
        example_id = %example_id,
        code = %scored.code(),
        reward = scored.reward,
        missing = missing,
    );
}

pub fn emit_selection_picked(example_id: &str, best_index: usize, n_samples: usize, rescued: bool) {
    debug!(
        event = "selection.picked",
        example_id = %example_id,
        best_index = best_index,
        n_samples = n_samples,
        rescued = rescued,
    );
}

pub fn emit_gate_evaluated(verdict: &GateVerdict) {
    info!(
        event = "gate.evaluated",
        decision = %verdict.decision,
        delta = verdict.delta,
        baseline = %verdict.baseline.run_dir.display(),
        candidate = %verdict.candidate.run_dir.display(),
        n_reasons = verdict.reasons.len(),
    );
}

/// Emit a warning for a non-fatal artifact problem.
pub fn emit_artifact_warning(path: &std::path::Path, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "artifact.warning", path = %path.display(), error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_enters_without_subscriber() {
        let _span = RunSpan::enter("eval_20260101T000000", "eval");
        emit_run_started("eval_20260101T000000", "eval", &ScorerIdentity::default(), 3);
    }
}
