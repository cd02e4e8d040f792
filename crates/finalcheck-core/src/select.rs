//! Selection driver: best-of-N against a first-sample baseline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregate::SelectionMetrics;
use crate::dataset::load_examples;
use crate::domain::{Example, RolloutSample};
use crate::eval::run_id_of;
use crate::io::manifest::CommandInfo;
use crate::io::{utc_now_iso, write_json, write_jsonl, write_manifest, write_text, ManifestRequest};
use crate::metrics::METRICS;
use crate::obs;
use crate::reporting::render_selection_summary_md;
use crate::rollouts::load_selection_pack;
use crate::run_stats::{RESULTS_FILE, SUMMARY_FILE};
use crate::scoring::{FinalLineVerifier, OutcomeCode, RewardSpec, Scorer, ScorerIdentity};
use crate::selection::{pick_best_with, LexicographicTieBreak, LogprobTieBreak, TieBreak};

/// Which tie-break the driver applies among equal-reward samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakKind {
    #[default]
    Lexicographic,
    Logprob,
}

impl fmt::Display for TieBreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreakKind::Lexicographic => f.write_str("lexicographic"),
            TieBreakKind::Logprob => f.write_str("logprob"),
        }
    }
}

impl FromStr for TieBreakKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lexicographic" => Ok(TieBreakKind::Lexicographic),
            "logprob" => Ok(TieBreakKind::Logprob),
            other => Err(format!(
                "unknown tie-break {other:?} (expected lexicographic or logprob)"
            )),
        }
    }
}

/// One chosen sample as recorded in results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRecord {
    pub index: usize,
    pub completion: String,
    pub reward: f64,
    pub outcome_code: OutcomeCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBrief {
    pub completion: String,
    pub sum_logprob: Option<f64>,
    pub sum_ref_logprob: Option<f64>,
    pub kl_est: Option<f64>,
}

impl From<&RolloutSample> for SampleBrief {
    fn from(s: &RolloutSample) -> Self {
        Self {
            completion: s.completion.clone(),
            sum_logprob: s.sum_logprob,
            sum_ref_logprob: s.sum_ref_logprob,
            kl_est: s.kl_estimate(),
        }
    }
}

/// One line of a selection run's `results.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub id: String,
    pub prompt: String,
    pub expected_answer: i64,
    pub n_samples_used: usize,
    pub baseline: PickRecord,
    pub best_of_n: PickRecord,
    pub all_samples: Vec<SampleBrief>,
}

impl SelectionRecord {
    pub fn rescued(&self) -> bool {
        self.baseline.reward == 0.0 && self.best_of_n.reward == 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRunInfo {
    pub created_utc: String,
    pub scorer: ScorerIdentity,
    pub dataset_path: String,
    pub samples_path: String,
    pub n_examples: usize,
    pub n_missing_samples: usize,
    /// Sample cap per example, if any.
    pub n: Option<usize>,
    pub tie_break: TieBreakKind,
    pub reward_spec: RewardSpec,
}

/// `summary.json` of a selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub run: SelectionRunInfo,
    pub metrics: SelectionMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionReport {
    pub records: Vec<SelectionRecord>,
    pub summary: SelectionSummary,
}

/// Inputs to [`run_selection`].
#[derive(Debug, Clone, Default)]
pub struct SelectionConfig {
    pub dataset_path: PathBuf,
    pub samples_path: PathBuf,
    /// Use at most the first `n` samples of each example.
    pub n: Option<usize>,
    pub max_examples: Option<usize>,
    pub tie_break: TieBreakKind,
    pub verifier: FinalLineVerifier,
    pub command: CommandInfo,
}

/// Records for every example plus the number of examples with no samples.
///
/// The baseline is always the first (capped) sample. Examples absent from
/// the pack are scored against a single empty completion.
pub fn select_examples<T: TieBreak>(
    examples: &[Example],
    pack: &BTreeMap<String, Vec<RolloutSample>>,
    verifier: &FinalLineVerifier,
    n: Option<usize>,
    tie_break: &T,
) -> (Vec<SelectionRecord>, usize) {
    let mut records = Vec::with_capacity(examples.len());
    let mut n_missing = 0;
    let fallback = vec![RolloutSample::new("")];

    for example in examples {
        let mut samples: &[RolloutSample] = match pack.get(&example.id) {
            Some(s) if !s.is_empty() => s,
            _ => {
                n_missing += 1;
                &fallback
            }
        };
        if let Some(cap) = n {
            samples = &samples[..samples.len().min(cap)];
        }

        let baseline_sample = samples.first().cloned().unwrap_or_default();
        let baseline_scored = verifier.score(example, baseline_sample.as_completion());
        METRICS.record_score(baseline_scored.passed());

        let picked = pick_best_with(example, samples, verifier, tie_break);
        METRICS.record_score(picked.scored.passed());
        METRICS.inc_selections();

        let record = SelectionRecord {
            id: example.id.clone(),
            prompt: example.prompt.clone(),
            expected_answer: example.expected_answer,
            n_samples_used: samples.len(),
            baseline: PickRecord {
                index: 0,
                completion: baseline_sample.completion.clone(),
                reward: baseline_scored.reward,
                outcome_code: baseline_scored.code(),
            },
            best_of_n: PickRecord {
                index: picked.best_index,
                completion: picked.best_sample.completion.clone(),
                reward: picked.scored.reward,
                outcome_code: picked.scored.code(),
            },
            all_samples: samples.iter().map(SampleBrief::from).collect(),
        };
        obs::emit_selection_picked(&record.id, picked.best_index, samples.len(), record.rescued());
        records.push(record);
    }

    (records, n_missing)
}

/// Write `results.jsonl`, `summary.json` and `summary.md` into `out_dir`.
pub fn write_selection_artifacts(out_dir: &Path, report: &SelectionReport) -> Result<()> {
    write_jsonl(&out_dir.join(RESULTS_FILE), &report.records)
        .with_context(|| format!("write results into {}", out_dir.display()))?;
    write_json(&out_dir.join(SUMMARY_FILE), &report.summary)
        .with_context(|| format!("write summary into {}", out_dir.display()))?;
    write_text(
        &out_dir.join("summary.md"),
        &render_selection_summary_md(&report.summary),
    )
    .with_context(|| format!("write summary.md into {}", out_dir.display()))?;
    Ok(())
}

/// Load dataset and pack, select, and write all artifacts including the manifest.
pub fn run_selection(config: &SelectionConfig, out_dir: &Path) -> Result<SelectionReport> {
    let started = Instant::now();
    let created_utc = utc_now_iso();
    let run_id = run_id_of(out_dir);

    let mut examples = load_examples(&config.dataset_path)
        .with_context(|| format!("load dataset {}", config.dataset_path.display()))?;
    if let Some(max) = config.max_examples {
        examples.truncate(max);
    }
    let pack = load_selection_pack(&config.samples_path)
        .with_context(|| format!("load selection pack {}", config.samples_path.display()))?;

    let _span = obs::RunSpan::enter(&run_id, "selection");
    obs::emit_run_started(&run_id, "selection", config.verifier.identity(), examples.len());

    let (records, n_missing) = match config.tie_break {
        TieBreakKind::Lexicographic => select_examples(
            &examples,
            &pack,
            &config.verifier,
            config.n,
            &LexicographicTieBreak,
        ),
        TieBreakKind::Logprob => {
            select_examples(&examples, &pack, &config.verifier, config.n, &LogprobTieBreak)
        }
    };

    let metrics = SelectionMetrics::from_pairs(
        records
            .iter()
            .map(|r| (r.baseline.reward, r.best_of_n.reward)),
    );
    let report = SelectionReport {
        summary: SelectionSummary {
            run: SelectionRunInfo {
                created_utc: created_utc.clone(),
                scorer: config.verifier.identity().clone(),
                dataset_path: config.dataset_path.display().to_string(),
                samples_path: config.samples_path.display().to_string(),
                n_examples: examples.len(),
                n_missing_samples: n_missing,
                n: config.n,
                tie_break: config.tie_break,
                reward_spec: RewardSpec::current(),
            },
            metrics,
        },
        records,
    };
    write_selection_artifacts(out_dir, &report)?;

    let mut request = ManifestRequest::new("select", &created_utc, config.verifier.identity())
        .with_input(&config.dataset_path)
        .with_input(&config.samples_path)
        .with_extra("n", json!(config.n))
        .with_extra("n_missing_samples", json!(n_missing))
        .with_extra("tie_break", json!(config.tie_break));
    request.command = CommandInfo {
        script: "select".to_string(),
        ..config.command.clone()
    };
    write_manifest(out_dir, request)
        .with_context(|| format!("write manifest into {}", out_dir.display()))?;

    obs::emit_run_finished(
        &run_id,
        started.elapsed().as_millis() as u64,
        report.summary.run.n_examples,
        report.summary.metrics.pass_at_n,
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<RolloutSample>> {
        entries
            .iter()
            .map(|(id, texts)| {
                (
                    id.to_string(),
                    texts.iter().map(|t| RolloutSample::new(*t)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn baseline_is_first_sample_and_rescues_are_flagged() {
        let examples = vec![Example::new("a", "p", 5)];
        let pack = pack(&[("a", &["Final: 05", "Final: 5"])]);
        let (records, missing) = select_examples(
            &examples,
            &pack,
            &FinalLineVerifier::new(),
            None,
            &LexicographicTieBreak,
        );

        assert_eq!(missing, 0);
        let r = &records[0];
        assert_eq!(r.baseline.outcome_code, OutcomeCode::LeadingZeros);
        assert_eq!(r.best_of_n.index, 1);
        assert!(r.rescued());
        assert_eq!(r.all_samples.len(), 2);
    }

    #[test]
    fn cap_limits_samples_considered() {
        let examples = vec![Example::new("a", "p", 5)];
        let pack = pack(&[("a", &["Final: 05", "Final: 5"])]);
        let (records, _) = select_examples(
            &examples,
            &pack,
            &FinalLineVerifier::new(),
            Some(1),
            &LexicographicTieBreak,
        );
        assert_eq!(records[0].n_samples_used, 1);
        assert_eq!(records[0].best_of_n.reward, 0.0);
    }

    #[test]
    fn missing_examples_score_an_empty_sample() {
        let examples = vec![Example::new("a", "p", 5)];
        let (records, missing) = select_examples(
            &examples,
            &BTreeMap::new(),
            &FinalLineVerifier::new(),
            None,
            &LexicographicTieBreak,
        );
        assert_eq!(missing, 1);
        assert_eq!(records[0].n_samples_used, 1);
        assert_eq!(records[0].best_of_n.outcome_code, OutcomeCode::NotSingleLine);
    }

    #[test]
    fn tie_break_kind_parses() {
        assert_eq!("logprob".parse::<TieBreakKind>(), Ok(TieBreakKind::Logprob));
        assert!("random".parse::<TieBreakKind>().is_err());
        assert_eq!(TieBreakKind::default().to_string(), "lexicographic");
    }
}
