//! End to end: dataset + frozen completions -> run directory -> gate.

use std::fs;
use std::path::Path;

use finalcheck_core::{
    evaluate_gate, load_run_stats, make_run_dir, run_eval, EvalConfig, GateConfig, GateDecision,
    JsonlCompletionSource, ScorerIdentity,
};
use serde_json::Value;

const DATASET: &str = r#"{"id": "q1", "prompt": "2+2", "expected_answer": 4}
{"id": "q2", "prompt": "10-3", "expected_answer": "7"}
{"id": "q3", "prompt": "0-5", "expected_answer": -5}
{"id": "q4", "prompt": "6*7", "expected_answer": 42.0}
"#;

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn eval_run(root: &Path, dataset: &Path, completions: &str, tag: &str) -> std::path::PathBuf {
    let completions = write(root, &format!("{tag}.jsonl"), completions);
    let source = JsonlCompletionSource::open(&completions).unwrap();
    let out = make_run_dir(&root.join("runs"), "eval").unwrap();
    let config = EvalConfig {
        dataset_path: dataset.to_path_buf(),
        extra_inputs: vec![completions],
        ..EvalConfig::default()
    };
    run_eval(&config, &source, &out).unwrap();
    out
}

#[test]
fn eval_writes_complete_run_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = write(tmp.path(), "dev.jsonl", DATASET);
    let out = eval_run(
        tmp.path(),
        &dataset,
        concat!(
            r#"{"id": "q1", "completion": "Final: 4", "sum_logprob": -2.0, "sum_ref_logprob": -2.5}"#,
            "\n",
            r#"{"id": "q2", "completion": "Final: 07"}"#,
            "\n",
            r#"{"id": "q3", "completion": "Final: -5\n"}"#,
            "\n",
        ),
        "completions",
    );

    for file in ["results.jsonl", "summary.json", "summary.md", "manifest.json"] {
        assert!(out.join(file).is_file(), "missing {file}");
    }

    let results = fs::read_to_string(out.join("results.jsonl")).unwrap();
    let records: Vec<Value> = results
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 4);
    let codes: Vec<&str> = records
        .iter()
        .map(|r| r["outcome_code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, ["ok", "leading_zeros", "ok", "missing_completion"]);
    assert_eq!(records[0]["kl_est"], 0.5);
    assert_eq!(records[3]["missing_completion"], true);

    let summary: Value =
        serde_json::from_str(&fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["run"]["scorer"]["name"], "math_final_line_verifier");
    assert_eq!(summary["run"]["n_missing_completions"], 1);
    assert_eq!(summary["metrics"]["pass_rate"], 0.5);
    assert_eq!(summary["metrics"]["n_with_kl"], 1);

    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["command"]["script"], "eval");
    assert_eq!(manifest["inputs"].as_array().unwrap().len(), 2);
    assert_eq!(manifest["inputs"][0]["sha256"].as_str().unwrap().len(), 64);

    let md = fs::read_to_string(out.join("summary.md")).unwrap();
    assert!(md.contains("pass_rate: **0.500**"));
    assert!(md.contains("`q2` [leading_zeros]"));
}

#[test]
fn run_stats_feed_the_gate() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = write(tmp.path(), "dev.jsonl", DATASET);

    let baseline = eval_run(
        tmp.path(),
        &dataset,
        "{\"id\": \"q1\", \"completion\": \"Final: 4\"}\n",
        "base",
    );
    let candidate = eval_run(
        tmp.path(),
        &dataset,
        concat!(
            "{\"id\": \"q1\", \"completion\": \"Final: 4\"}\n",
            "{\"id\": \"q2\", \"completion\": \"Final: 7\"}\n",
            "{\"id\": \"q4\", \"completion\": \"Final: 42\"}\n",
        ),
        "cand",
    );
    assert_ne!(baseline, candidate);

    let base = load_run_stats(&baseline).unwrap();
    let cand = load_run_stats(&candidate).unwrap();
    assert_eq!(base.scorer, ScorerIdentity::default());
    assert_eq!(base.n_examples, 4);
    assert_eq!(base.pass_rate, 0.25);
    assert_eq!(cand.pass_rate, 0.75);
    assert_eq!(cand.outcome_counts.get("ok"), Some(&3));

    let promote = evaluate_gate(&base, &cand, &GateConfig::with_min_delta(0.5));
    assert_eq!(promote.decision, GateDecision::Promote);

    let reject = evaluate_gate(&cand, &base, &GateConfig::default());
    assert_eq!(reject.decision, GateDecision::Reject);
}

#[test]
fn missing_artifacts_are_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let err = load_run_stats(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("summary.json"));
}
