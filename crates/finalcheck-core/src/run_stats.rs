//! Reading finished run directories back into [`RunStats`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::domain::error::{HarnessError, Result};
use crate::gate::RunStats;
use crate::io::read_jsonl;
use crate::scoring::ScorerIdentity;

pub const SUMMARY_FILE: &str = "summary.json";
pub const RESULTS_FILE: &str = "results.jsonl";

/// Load a run's identity and pass rate from `summary.json` + `results.jsonl`.
///
/// Pass rate is the mean reward over the result records: `reward` for eval
/// records, `best_of_n.reward` for selection records, 0 otherwise.
pub fn load_run_stats(run_dir: &Path) -> Result<RunStats> {
    let run_dir = run_dir.canonicalize().unwrap_or_else(|_| run_dir.to_path_buf());
    let summary_path = run_dir.join(SUMMARY_FILE);
    let results_path = run_dir.join(RESULTS_FILE);
    for path in [&summary_path, &results_path] {
        if !path.is_file() {
            return Err(HarnessError::MissingArtifact(path.clone()));
        }
    }

    let summary: Value = serde_json::from_str(&fs::read_to_string(&summary_path)?)?;
    let run = summary.get("run").cloned().unwrap_or(Value::Null);
    let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();

    let created_utc = text(run.get("created_utc"));
    let dataset = Some(text(run.get("dataset_path"))).filter(|d| !d.is_empty());
    let scorer = ScorerIdentity::new(
        text(run.pointer("/scorer/name")),
        text(run.pointer("/scorer/version")),
    );

    let records = read_jsonl(&results_path)?;
    let n_examples = records.len();
    let reward_sum: f64 = records.iter().map(record_reward).sum();
    let pass_rate = if n_examples == 0 {
        0.0
    } else {
        reward_sum / n_examples as f64
    };

    let mut outcome_counts = BTreeMap::new();
    for record in &records {
        *outcome_counts.entry(record_outcome_code(record)).or_insert(0) += 1;
    }

    Ok(RunStats {
        run_dir,
        created_utc,
        dataset,
        scorer,
        n_examples,
        pass_rate,
        outcome_counts,
    })
}

fn as_reward(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Reward of one result record, eval or selection shaped.
pub fn record_reward(record: &Map<String, Value>) -> f64 {
    as_reward(record.get("reward"))
        .or_else(|| as_reward(record.get("best_of_n").and_then(|b| b.get("reward"))))
        .unwrap_or(0.0)
}

/// Outcome label of one result record.
///
/// A top-level `outcome_code` decides on its own, with an empty value read as
/// `unknown`. Without one, the first non-empty of `best_of_n.outcome_code`,
/// `details.result.code` and `details.parse.error_code` wins.
pub fn record_outcome_code(record: &Map<String, Value>) -> String {
    if let Some(code) = record.get("outcome_code") {
        return code_text(code).unwrap_or("unknown").to_string();
    }
    let details = record.get("details");
    [
        record.get("best_of_n").and_then(|b| b.get("outcome_code")),
        details
            .and_then(|d| d.get("result"))
            .and_then(|r| r.get("code")),
        details
            .and_then(|d| d.get("parse"))
            .and_then(|p| p.get("error_code")),
    ]
    .into_iter()
    .flatten()
    .find_map(code_text)
    .unwrap_or("unknown")
    .to_string()
}

fn code_text(value: &Value) -> Option<&str> {
    value.as_str().filter(|code| !code.is_empty())
}
