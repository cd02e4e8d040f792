//! Evaluation driver: score one completion per example and record the run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregate::{EvalMetrics, OutcomeTally};
use crate::dataset::load_examples;
use crate::domain::{Completion, Example};
use crate::io::manifest::CommandInfo;
use crate::io::{
    utc_now_iso, write_json, write_jsonl, write_manifest, write_text, ManifestRequest,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::reporting::render_eval_summary_md;
use crate::rollouts::{CompletionSource, SourceDescription};
use crate::run_stats::{RESULTS_FILE, SUMMARY_FILE};
use crate::scoring::{FinalLineVerifier, RewardSpec, ScoreDetails, Scorer, ScorerIdentity};

/// Outcome label for examples the completion source had nothing for.
pub const MISSING_COMPLETION: &str = "missing_completion";

/// One line of an eval run's `results.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub id: String,
    pub prompt: String,
    pub expected_answer: i64,
    pub completion: String,
    pub missing_completion: bool,
    pub reward: f64,
    /// The scorer's code, or `missing_completion`.
    pub outcome_code: String,
    pub sum_logprob: Option<f64>,
    pub sum_ref_logprob: Option<f64>,
    pub kl_est: Option<f64>,
    pub details: ScoreDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRunInfo {
    pub created_utc: String,
    pub scorer: ScorerIdentity,
    pub dataset_path: String,
    pub completion_source: SourceDescription,
    pub n_examples: usize,
    pub n_missing_completions: usize,
    pub reward_spec: RewardSpec,
}

/// `summary.json` of an eval run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub run: EvalRunInfo,
    pub metrics: EvalMetrics,
    pub outcomes: OutcomeTally,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub records: Vec<EvalRecord>,
    pub summary: EvalSummary,
}

/// Inputs to [`run_eval`].
#[derive(Debug, Clone, Default)]
pub struct EvalConfig {
    pub dataset_path: PathBuf,
    /// Evaluate only the first `max_examples` examples.
    pub max_examples: Option<usize>,
    pub verifier: FinalLineVerifier,
    /// Recorded in the manifest.
    pub command: CommandInfo,
    /// Extra files to fingerprint in the manifest (e.g. the completions file).
    pub extra_inputs: Vec<PathBuf>,
}

/// Score every example once against `source`.
///
/// Does no I/O beyond tracing and the global counters.
pub fn evaluate(
    examples: &[Example],
    source: &dyn CompletionSource,
    verifier: &FinalLineVerifier,
    dataset_label: &str,
    created_utc: &str,
) -> EvalReport {
    let mut records = Vec::with_capacity(examples.len());
    let mut outcomes = OutcomeTally::default();
    let mut n_missing = 0;

    for example in examples {
        let sample = source.get(&example.id);
        let completion = sample.map_or(Completion::Missing, |s| s.as_completion());
        let scored = verifier.score(example, completion);

        METRICS.record_score(scored.passed());
        obs::emit_example_scored(&example.id, &scored, sample.is_none());

        let outcome_code = if sample.is_none() {
            n_missing += 1;
            MISSING_COMPLETION.to_string()
        } else {
            scored.code().to_string()
        };
        outcomes.record(&example.id, &outcome_code);

        records.push(EvalRecord {
            id: example.id.clone(),
            prompt: example.prompt.clone(),
            expected_answer: example.expected_answer,
            completion: completion.as_text().to_string(),
            missing_completion: sample.is_none(),
            reward: scored.reward,
            outcome_code,
            sum_logprob: sample.and_then(|s| s.sum_logprob),
            sum_ref_logprob: sample.and_then(|s| s.sum_ref_logprob),
            kl_est: sample.and_then(|s| s.kl_estimate()),
            details: scored.details,
        });
    }

    let metrics = EvalMetrics::from_rewards(records.iter().map(|r| (r.reward, r.kl_est)));
    let summary = EvalSummary {
        run: EvalRunInfo {
            created_utc: created_utc.to_string(),
            scorer: verifier.identity().clone(),
            dataset_path: dataset_label.to_string(),
            completion_source: source.describe(),
            n_examples: examples.len(),
            n_missing_completions: n_missing,
            reward_spec: RewardSpec::current(),
        },
        metrics,
        outcomes,
    };

    EvalReport { records, summary }
}

/// Write `results.jsonl`, `summary.json` and `summary.md` into `out_dir`.
pub fn write_eval_artifacts(out_dir: &Path, report: &EvalReport) -> Result<()> {
    write_jsonl(&out_dir.join(RESULTS_FILE), &report.records)
        .with_context(|| format!("write results into {}", out_dir.display()))?;
    write_json(&out_dir.join(SUMMARY_FILE), &report.summary)
        .with_context(|| format!("write summary into {}", out_dir.display()))?;
    let md = render_eval_summary_md(&report.summary, &report.records);
    write_text(&out_dir.join("summary.md"), &md)
        .with_context(|| format!("write summary.md into {}", out_dir.display()))?;
    Ok(())
}

/// Load the dataset, evaluate, and write all artifacts including the manifest.
pub fn run_eval(
    config: &EvalConfig,
    source: &dyn CompletionSource,
    out_dir: &Path,
) -> Result<EvalReport> {
    let started = Instant::now();
    let created_utc = utc_now_iso();
    let run_id = run_id_of(out_dir);

    let mut examples = load_examples(&config.dataset_path)
        .with_context(|| format!("load dataset {}", config.dataset_path.display()))?;
    if let Some(max) = config.max_examples {
        examples.truncate(max);
    }

    let _span = obs::RunSpan::enter(&run_id, "eval");
    obs::emit_run_started(&run_id, "eval", config.verifier.identity(), examples.len());

    let dataset_label = config.dataset_path.display().to_string();
    let report = evaluate(&examples, source, &config.verifier, &dataset_label, &created_utc);
    write_eval_artifacts(out_dir, &report)?;

    let mut request = ManifestRequest::new("eval", &created_utc, config.verifier.identity())
        .with_input(&config.dataset_path)
        .with_extra("completion_source", json!(report.summary.run.completion_source))
        .with_extra(
            "n_missing_completions",
            json!(report.summary.run.n_missing_completions),
        );
    request.command = CommandInfo {
        script: "eval".to_string(),
        ..config.command.clone()
    };
    request.inputs.extend(config.extra_inputs.iter().cloned());
    write_manifest(out_dir, request)
        .with_context(|| format!("write manifest into {}", out_dir.display()))?;

    obs::emit_run_finished(
        &run_id,
        started.elapsed().as_millis() as u64,
        report.summary.run.n_examples,
        report.summary.metrics.pass_rate,
    );
    Ok(report)
}

pub(crate) fn run_id_of(out_dir: &Path) -> String {
    out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| out_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RolloutSample;
    use crate::rollouts::MapCompletionSource;

    fn examples() -> Vec<Example> {
        vec![
            Example::new("a", "1+1", 2),
            Example::new("b", "2+2", 4),
            Example::new("c", "3+3", 6),
        ]
    }

    #[test]
    fn missing_completion_is_labelled_and_counted() {
        let source = MapCompletionSource::default()
            .with("a", RolloutSample::new("Final: 2"))
            .with("b", RolloutSample::new("Final: 04"));

        let report = evaluate(
            &examples(),
            &source,
            &FinalLineVerifier::new(),
            "dev.jsonl",
            "2026-01-01T00:00:00+00:00",
        );

        let codes: Vec<_> = report.records.iter().map(|r| r.outcome_code.as_str()).collect();
        assert_eq!(codes, ["ok", "leading_zeros", MISSING_COMPLETION]);
        assert!(report.records[2].missing_completion);
        assert_eq!(report.records[2].completion, "");
        assert_eq!(report.summary.run.n_missing_completions, 1);
        assert_eq!(report.summary.metrics.n_pass, 1);
        assert_eq!(report.summary.outcomes.counts[MISSING_COMPLETION], 1);
        assert_eq!(report.summary.outcomes.failures["leading_zeros"], vec!["b"]);
    }

    #[test]
    fn kl_estimates_flow_into_records_and_metrics() {
        let source = MapCompletionSource::default().with(
            "a",
            RolloutSample::new("Final: 2").with_logprobs(Some(-1.0), Some(-3.0)),
        );
        let report = evaluate(
            &examples()[..1],
            &source,
            &FinalLineVerifier::new(),
            "dev.jsonl",
            "t",
        );
        assert_eq!(report.records[0].kl_est, Some(2.0));
        assert_eq!(report.summary.metrics.mean_kl_est, Some(2.0));
    }
}
