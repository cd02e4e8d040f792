//! Best-of-N selection.
//!
//! Every sample is scored independently; the winner minimises
//! `(-reward, tie_break_key, index)`. Selection never changes what was
//! generated, only which output is kept.

use std::cmp::{Ordering, Reverse};

use crate::domain::{Example, RolloutSample};
use crate::scoring::{ScoreResult, Scorer};

/// Ordering among samples with equal reward. Smaller keys win.
pub trait TieBreak {
    type Key: Ord;

    fn key(&self, sample: &RolloutSample) -> Self::Key;
}

/// Default: completion text, ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicographicTieBreak;

impl TieBreak for LexicographicTieBreak {
    type Key = String;

    fn key(&self, sample: &RolloutSample) -> String {
        sample.completion.clone()
    }
}

/// Prefers higher `sum_logprob`, then shorter completions, then text.
///
/// Samples without a log-prob (or with NaN) rank below any sample that has one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogprobTieBreak;

/// `f64` under `total_cmp`, so it can sit in an `Ord` key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalF64(pub f64);

impl Eq for TotalF64 {}

impl PartialOrd for TotalF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TieBreak for LogprobTieBreak {
    type Key = (Reverse<TotalF64>, usize, String);

    fn key(&self, sample: &RolloutSample) -> Self::Key {
        let logprob = sample
            .sum_logprob
            .filter(|lp| !lp.is_nan())
            .unwrap_or(f64::NEG_INFINITY);
        (
            Reverse(TotalF64(logprob)),
            sample.completion.chars().count(),
            sample.completion.clone(),
        )
    }
}

/// The chosen sample, its index in the input, and its score.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub best_index: usize,
    pub best_sample: RolloutSample,
    pub scored: ScoreResult,
}

/// Pick the best sample with the lexicographic tie-break.
///
/// Empty input yields a synthetic empty completion at index 0, scored.
pub fn pick_best<S>(example: &Example, samples: &[RolloutSample], scorer: &S) -> SelectionResult
where
    S: Scorer + ?Sized,
{
    pick_best_with(example, samples, scorer, &LexicographicTieBreak)
}

pub fn pick_best_with<S, T>(
    example: &Example,
    samples: &[RolloutSample],
    scorer: &S,
    tie_break: &T,
) -> SelectionResult
where
    S: Scorer + ?Sized,
    T: TieBreak + ?Sized,
{
    let winner = samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let scored = scorer.score(example, sample.as_completion());
            let key = tie_break.key(sample);
            (index, scored, key)
        })
        .min_by(|(ia, sa, ka), (ib, sb, kb)| {
            sb.reward
                .total_cmp(&sa.reward)
                .then_with(|| ka.cmp(kb))
                .then_with(|| ia.cmp(ib))
        });

    match winner {
        Some((best_index, scored, _)) => SelectionResult {
            best_index,
            best_sample: samples[best_index].clone(),
            scored,
        },
        None => {
            let best_sample = RolloutSample::new("");
            let scored = scorer.score(example, best_sample.as_completion());
            SelectionResult {
                best_index: 0,
                best_sample,
                scored,
            }
        }
    }
}
