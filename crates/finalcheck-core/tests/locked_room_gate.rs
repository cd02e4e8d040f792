use std::collections::BTreeMap;

use finalcheck_core::{
    evaluate_gate, GateConfig, GateDecision, GateRule, GateVerdict, RunStats, ScorerIdentity,
};

fn run(version: &str, dataset: Option<&str>, n_examples: usize, pass_rate: f64) -> RunStats {
    RunStats {
        run_dir: format!("runs/{version}").into(),
        created_utc: "2026-01-01T00:00:00+00:00".to_string(),
        dataset: dataset.map(str::to_string),
        scorer: ScorerIdentity::new("math_final_line_verifier", version),
        n_examples,
        pass_rate,
        outcome_counts: BTreeMap::new(),
    }
}

fn matching(pass_rate: f64) -> RunStats {
    run("1.0.0", Some("data/dev.jsonl"), 10, pass_rate)
}

fn has_rule(verdict: &GateVerdict, rule: GateRule) -> bool {
    verdict.reasons.iter().any(|v| v.rule == rule)
}

// ---- ScorerMatch rule ----

#[test]
fn scorer_version_mismatch_rejects_regardless_of_delta() {
    let baseline = run("1.0.0", Some("data/dev.jsonl"), 10, 0.1);
    for candidate_rate in [0.0, 0.1, 0.9, 1.0] {
        let candidate = run("1.1.0", Some("data/dev.jsonl"), 10, candidate_rate);
        let verdict = evaluate_gate(&baseline, &candidate, &GateConfig::default());
        assert_eq!(verdict.decision, GateDecision::Reject);
        assert!(has_rule(&verdict, GateRule::ScorerMatch));
        assert!(verdict.reasons[0].reason.contains("scorer mismatch"));
        assert!(verdict.locked_room_violated());
    }
}

#[test]
fn scorer_name_mismatch_rejects() {
    let baseline = matching(0.5);
    let mut candidate = matching(0.9);
    candidate.scorer = ScorerIdentity::new("other_verifier", "1.0.0");
    let verdict = evaluate_gate(&baseline, &candidate, &GateConfig::default());
    assert!(!verdict.promoted());
    assert_eq!(
        verdict.reasons[0].reason,
        "LockedRoomViolation: scorer mismatch \
         (baseline=math_final_line_verifier v1.0.0, candidate=other_verifier v1.0.0)"
    );
}

// ---- DatasetMatch rule ----

#[test]
fn dataset_mismatch_rejects() {
    let baseline = run("1.0.0", Some("data/dev.jsonl"), 10, 0.5);
    let candidate = run("1.0.0", Some("data/test.jsonl"), 10, 0.9);
    let verdict = evaluate_gate(&baseline, &candidate, &GateConfig::default());
    assert!(!verdict.promoted());
    assert!(has_rule(&verdict, GateRule::DatasetMatch));
    assert!(!has_rule(&verdict, GateRule::ScorerMatch));
}

#[test]
fn unknown_dataset_on_either_side_skips_the_check() {
    let baseline = run("1.0.0", None, 10, 0.5);
    let candidate = run("1.0.0", Some("data/dev.jsonl"), 10, 0.9);
    let verdict = evaluate_gate(&baseline, &candidate, &GateConfig::default());
    assert!(verdict.promoted());
}

// ---- ExampleCountMatch rule ----

#[test]
fn example_count_mismatch_rejects() {
    let baseline = run("1.0.0", Some("data/dev.jsonl"), 10, 0.5);
    let candidate = run("1.0.0", Some("data/dev.jsonl"), 8, 0.9);
    let verdict = evaluate_gate(&baseline, &candidate, &GateConfig::default());
    assert!(has_rule(&verdict, GateRule::ExampleCountMatch));
    assert!(verdict.reasons[0].reason.contains("n_examples mismatch"));
}

#[test]
fn all_locked_room_violations_are_reported_together() {
    let baseline = run("1.0.0", Some("data/dev.jsonl"), 10, 0.5);
    let candidate = run("2.0.0", Some("data/test.jsonl"), 3, 0.1);
    let verdict = evaluate_gate(&baseline, &candidate, &GateConfig::with_min_delta(0.5));
    let rules: Vec<GateRule> = verdict.reasons.iter().map(|v| v.rule).collect();
    assert_eq!(rules, GateRule::LOCKED_ROOM.to_vec());
    assert!(!has_rule(&verdict, GateRule::MinDelta));
}

// ---- MinDelta rule ----

#[test]
fn delta_exactly_at_min_delta_promotes() {
    let verdict = evaluate_gate(&matching(0.5), &matching(0.75), &GateConfig::with_min_delta(0.25));
    assert_eq!(verdict.decision, GateDecision::Promote);
    assert!(verdict.reasons.is_empty());
    assert_eq!(verdict.delta, 0.25);
}

#[test]
fn equal_pass_rates_promote_with_default_threshold() {
    let verdict = evaluate_gate(&matching(0.6), &matching(0.6), &GateConfig::default());
    assert!(verdict.promoted());
}

#[test]
fn regression_rejects_as_delta_too_small() {
    let verdict = evaluate_gate(&matching(0.6), &matching(0.5), &GateConfig::default());
    assert!(!verdict.promoted());
    assert!(!verdict.locked_room_violated());
    assert!(has_rule(&verdict, GateRule::MinDelta));
    assert!(verdict.reasons[0].reason.starts_with("DeltaTooSmall:"));
}

#[test]
fn improvement_below_min_delta_rejects() {
    let verdict = evaluate_gate(&matching(0.5), &matching(0.6), &GateConfig::with_min_delta(0.2));
    assert!(!verdict.promoted());
    assert!(has_rule(&verdict, GateRule::MinDelta));
}

// ---- Verdict shape ----

#[test]
fn verdict_serializes_uppercase_decision_and_briefs() {
    let verdict = evaluate_gate(&matching(0.5), &matching(1.0), &GateConfig::default());
    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(json["decision"], "PROMOTE");
    assert_eq!(json["baseline"]["n"], 10);
    assert_eq!(json["candidate"]["pass_rate"], 1.0);
    assert_eq!(json["delta"], 0.5);
}
