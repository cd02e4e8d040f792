//! Run-level metrics derived from per-example rewards.
//!
//! Rates are fractions of the example count and are 0.0 for an empty run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Baseline (first sample) vs best-of-N comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionMetrics {
    pub pass_at_1: f64,
    pub pass_at_n: f64,
    pub delta: f64,
    pub n_pass_at_1: usize,
    pub n_pass_at_n: usize,
    pub rescued: usize,
}

impl SelectionMetrics {
    /// Aggregate `(baseline_reward, best_of_n_reward)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut total = 0;
        let mut n_pass_at_1 = 0;
        let mut n_pass_at_n = 0;
        let mut rescued = 0;

        for (baseline, best) in pairs {
            total += 1;
            let base_ok = baseline == 1.0;
            let best_ok = best == 1.0;
            n_pass_at_1 += usize::from(base_ok);
            n_pass_at_n += usize::from(best_ok);
            rescued += usize::from(!base_ok && best_ok);
        }

        let pass_at_1 = rate(n_pass_at_1, total);
        let pass_at_n = rate(n_pass_at_n, total);
        Self {
            pass_at_1,
            pass_at_n,
            delta: pass_at_n - pass_at_1,
            n_pass_at_1,
            n_pass_at_n,
            rescued,
        }
    }
}

/// Single-pass evaluation metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub mean_reward: f64,
    pub pass_rate: f64,
    pub n_pass: usize,
    pub n_fail: usize,
    /// Number of examples that carried a KL estimate.
    #[serde(default)]
    pub n_with_kl: usize,
    /// Mean of the per-example KL estimates that were available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_kl_est: Option<f64>,
}

impl EvalMetrics {
    /// Aggregate `(reward, kl_estimate)` pairs.
    pub fn from_rewards<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (f64, Option<f64>)>,
    {
        let mut total = 0;
        let mut reward_sum = 0.0;
        let mut n_pass = 0;
        let mut kl_sum = 0.0;
        let mut kl_count = 0;

        for (reward, kl) in rows {
            total += 1;
            reward_sum += reward;
            n_pass += usize::from(reward == 1.0);
            if let Some(kl) = kl {
                kl_sum += kl;
                kl_count += 1;
            }
        }

        let mean_reward = if total == 0 {
            0.0
        } else {
            reward_sum / total as f64
        };
        Self {
            mean_reward,
            pass_rate: rate(n_pass, total),
            n_pass,
            n_fail: total - n_pass,
            n_with_kl: kl_count,
            mean_kl_est: (kl_count > 0).then(|| kl_sum / kl_count as f64),
        }
    }
}

/// Histogram of outcome labels plus the ids that did not pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub counts: BTreeMap<String, usize>,
    pub failures: BTreeMap<String, Vec<String>>,
}

impl OutcomeTally {
    pub fn record(&mut self, id: &str, label: &str) {
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
        if label != "ok" {
            self.failures
                .entry(label.to_string())
                .or_default()
                .push(id.to_string());
        }
    }

    /// Labels ordered for display: `ok` first, then by count descending,
    /// then by name.
    pub fn ordered(&self) -> Vec<(&str, usize)> {
        let mut rows: Vec<(&str, usize)> =
            self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        rows.sort_by(|a, b| {
            (a.0 != "ok")
                .cmp(&(b.0 != "ok"))
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.0.cmp(b.0))
        });
        rows
    }
}
