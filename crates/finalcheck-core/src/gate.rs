//! Locked Room promotion gate.
//!
//! Compares a candidate run against a baseline run. Pass rates are only
//! comparable when both runs used the same scorer identity, the same dataset
//! and the same number of examples; every violated compatibility rule is
//! reported. With no violation the candidate is promoted iff its pass rate
//! beats the baseline by at least `min_delta` (inclusive).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scoring::ScorerIdentity;

// ---------------------------------------------------------------------------
// Gate input
// ---------------------------------------------------------------------------

/// What the gate needs to know about one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub run_dir: PathBuf,
    pub created_utc: String,
    /// Dataset identifier recorded by the run, if any.
    pub dataset: Option<String>,
    pub scorer: ScorerIdentity,
    pub n_examples: usize,
    /// Mean reward over the run's result records.
    pub pass_rate: f64,
    #[serde(default)]
    pub outcome_counts: BTreeMap<String, usize>,
}

/// Gate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum `candidate.pass_rate - baseline.pass_rate` required to promote.
    pub min_delta: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { min_delta: 0.0 }
    }
}

impl GateConfig {
    pub fn with_min_delta(min_delta: f64) -> Self {
        Self { min_delta }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A rule that can block promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateRule {
    /// Both runs were scored by the same name and version.
    ScorerMatch,
    /// Both runs used the same dataset (skipped when either side is unknown).
    DatasetMatch,
    /// Both runs scored the same number of examples.
    ExampleCountMatch,
    /// Candidate improves on baseline by at least `min_delta`.
    MinDelta,
}

impl GateRule {
    /// Compatibility rules, checked in this order before any comparison.
    pub const LOCKED_ROOM: [GateRule; 3] = [
        GateRule::ScorerMatch,
        GateRule::DatasetMatch,
        GateRule::ExampleCountMatch,
    ];

    pub fn is_locked_room(&self) -> bool {
        !matches!(self, GateRule::MinDelta)
    }
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: GateRule,
    /// Human-readable explanation, prefixed with the violation class.
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateDecision {
    Promote,
    Reject,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Promote => f.write_str("PROMOTE"),
            GateDecision::Reject => f.write_str("REJECT"),
        }
    }
}

/// Per-run summary echoed back in the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunBrief {
    pub run_dir: PathBuf,
    pub created_utc: String,
    pub pass_rate: f64,
    pub n: usize,
}

impl From<&RunStats> for RunBrief {
    fn from(stats: &RunStats) -> Self {
        Self {
            run_dir: stats.run_dir.clone(),
            created_utc: stats.created_utc.clone(),
            pass_rate: stats.pass_rate,
            n: stats.n_examples,
        }
    }
}

/// The gate's decision and everything needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub decision: GateDecision,
    /// Violations found (empty when promoted).
    pub reasons: Vec<Violation>,
    pub baseline: RunBrief,
    pub candidate: RunBrief,
    /// `candidate.pass_rate - baseline.pass_rate`, reported even on REJECT.
    pub delta: f64,
}

impl GateVerdict {
    pub fn promoted(&self) -> bool {
        self.decision == GateDecision::Promote
    }

    /// Whether any compatibility rule was violated.
    pub fn locked_room_violated(&self) -> bool {
        self.reasons.iter().any(|v| v.rule.is_locked_room())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate a candidate run against a baseline run.
///
/// Never fails: every problem becomes a REJECT reason.
pub fn evaluate_gate(
    baseline: &RunStats,
    candidate: &RunStats,
    config: &GateConfig,
) -> GateVerdict {
    let delta = candidate.pass_rate - baseline.pass_rate;

    let mut reasons: Vec<Violation> = GateRule::LOCKED_ROOM
        .iter()
        .filter_map(|rule| check_rule(*rule, baseline, candidate, config))
        .collect();

    if reasons.is_empty() {
        reasons.extend(check_rule(GateRule::MinDelta, baseline, candidate, config));
    }

    let decision = if reasons.is_empty() {
        GateDecision::Promote
    } else {
        GateDecision::Reject
    };

    GateVerdict {
        decision,
        reasons,
        baseline: RunBrief::from(baseline),
        candidate: RunBrief::from(candidate),
        delta,
    }
}

fn check_rule(
    rule: GateRule,
    baseline: &RunStats,
    candidate: &RunStats,
    config: &GateConfig,
) -> Option<Violation> {
    let reason = match rule {
        GateRule::ScorerMatch => {
            if baseline.scorer == candidate.scorer {
                return None;
            }
            format!(
                "LockedRoomViolation: scorer mismatch (baseline={}, candidate={})",
                baseline.scorer, candidate.scorer,
            )
        }
        GateRule::DatasetMatch => match (&baseline.dataset, &candidate.dataset) {
            (Some(b), Some(c)) if b != c => format!(
                "LockedRoomViolation: dataset_path mismatch (baseline={b}, candidate={c})"
            ),
            _ => return None,
        },
        GateRule::ExampleCountMatch => {
            if baseline.n_examples == candidate.n_examples {
                return None;
            }
            format!(
                "LockedRoomViolation: n_examples mismatch (baseline={}, candidate={})",
                baseline.n_examples, candidate.n_examples,
            )
        }
        GateRule::MinDelta => {
            let delta = candidate.pass_rate - baseline.pass_rate;
            if delta >= config.min_delta {
                return None;
            }
            format!(
                "DeltaTooSmall: delta={:.4} < min_delta={:.4}",
                delta, config.min_delta,
            )
        }
    };

    Some(Violation { rule, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pass_rate: f64) -> RunStats {
        RunStats {
            run_dir: PathBuf::from("runs/x"),
            created_utc: "2026-01-01T00:00:00Z".to_string(),
            dataset: Some("data/dev.jsonl".to_string()),
            scorer: ScorerIdentity::default(),
            n_examples: 4,
            pass_rate,
            outcome_counts: BTreeMap::new(),
        }
    }

    #[test]
    fn improvement_promotes() {
        let v = evaluate_gate(&stats(0.25), &stats(0.5), &GateConfig::default());
        assert!(v.promoted());
        assert!(v.reasons.is_empty());
        assert_eq!(v.delta, 0.25);
    }

    #[test]
    fn decision_serializes_uppercase() {
        let v = evaluate_gate(&stats(0.5), &stats(0.25), &GateConfig::default());
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["decision"], "REJECT");
        assert_eq!(json["reasons"][0]["rule"]["type"], "min_delta");
        assert_eq!(json["baseline"]["n"], 4);
    }

    #[test]
    fn delta_is_reported_alongside_violations() {
        let mut cand = stats(0.75);
        cand.n_examples = 5;
        let v = evaluate_gate(&stats(0.25), &cand, &GateConfig::default());
        assert!(!v.promoted());
        assert!(v.locked_room_violated());
        assert_eq!(v.delta, 0.5);
        assert_eq!(v.reasons.len(), 1);
    }
}
