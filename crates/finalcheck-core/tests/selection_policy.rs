use finalcheck_core::{
    pick_best, pick_best_with, score, Completion, Example, FinalLineVerifier,
    LexicographicTieBreak, LogprobTieBreak, OutcomeCode, RolloutSample, ScoreResult,
    SelectionMetrics,
};

fn samples(texts: &[&str]) -> Vec<RolloutSample> {
    texts.iter().map(|t| RolloutSample::new(*t)).collect()
}

fn example(expected: i64) -> Example {
    Example::new("ex", "prompt", expected)
}

// ---- Reward first ----

#[test]
fn passing_sample_beats_failing_ones() {
    let pack = samples(&["Final: 1", "Final: 01", "Final: 4", "nope"]);
    let picked = pick_best(&example(4), &pack, &FinalLineVerifier::new());
    assert_eq!(picked.best_index, 2);
    assert_eq!(picked.scored.reward, 1.0);
    assert_eq!(picked.best_sample.completion, "Final: 4");
}

// ---- Tie-break ----

#[test]
fn equal_reward_prefers_lexicographically_smaller_text() {
    // All wrong: the smallest string wins regardless of position.
    let forward = samples(&["Final: 9", "Final: 10", "Final: 11"]);
    let mut reversed = forward.clone();
    reversed.reverse();

    let verifier = FinalLineVerifier::new();
    let a = pick_best(&example(0), &forward, &verifier);
    let b = pick_best(&example(0), &reversed, &verifier);
    assert_eq!(a.best_sample.completion, "Final: 10");
    assert_eq!(b.best_sample.completion, "Final: 10");
    assert_eq!(a.best_index, 1);
    assert_eq!(b.best_index, 1);
}

#[test]
fn identical_keys_fall_back_to_earliest_index() {
    let pack = samples(&["Final: 3", "Final: 3", "Final: 3"]);
    let picked = pick_best(&example(3), &pack, &FinalLineVerifier::new());
    assert_eq!(picked.best_index, 0);
}

#[test]
fn logprob_tie_break_prefers_higher_logprob_then_shorter() {
    let pack = vec![
        RolloutSample::new("Final: 5").with_logprobs(Some(-3.0), None),
        RolloutSample::new("Final: 5").with_logprobs(Some(-1.0), None),
        RolloutSample::new(" Final: 5").with_logprobs(Some(-1.0), None),
        RolloutSample::new("Final: 5").with_logprobs(None, None),
    ];
    let picked = pick_best_with(&example(5), &pack, &FinalLineVerifier::new(), &LogprobTieBreak);
    assert_eq!(picked.best_index, 1);
}

#[test]
fn logprob_tie_break_never_outranks_reward() {
    let pack = vec![
        RolloutSample::new("Final: 6").with_logprobs(Some(-0.1), None),
        RolloutSample::new("Final: 7").with_logprobs(Some(-50.0), None),
    ];
    let picked = pick_best_with(&example(7), &pack, &FinalLineVerifier::new(), &LogprobTieBreak);
    assert_eq!(picked.best_index, 1);
}

// ---- Empty input ----

#[test]
fn empty_input_scores_a_synthetic_empty_sample() {
    let picked = pick_best(&example(1), &[], &FinalLineVerifier::new());
    assert_eq!(picked.best_index, 0);
    assert_eq!(picked.best_sample.completion, "");
    assert_eq!(picked.scored.reward, 0.0);
    assert_eq!(picked.scored.code(), OutcomeCode::NotSingleLine);
}

// ---- Pluggable scorer ----

#[test]
fn any_scorer_closure_can_drive_selection() {
    // Rewards the longest completion, so the tie-break never decides.
    let longest = |example: &Example, completion: Completion<'_>| -> ScoreResult {
        let long = completion.as_text().len() > 10;
        let mut result = score(example, completion);
        result.reward = if long { 1.0 } else { 0.0 };
        result
    };
    let pack = samples(&["Final: 1", "Final: 12345", "Final: 2"]);
    let picked = pick_best_with(&example(1), &pack, &longest, &LexicographicTieBreak);
    assert_eq!(picked.best_index, 1);
}

// ---- Monotonicity ----

#[test]
fn best_of_n_never_loses_to_first_sample() {
    let packs: Vec<(i64, Vec<RolloutSample>)> = vec![
        (1, samples(&["Final: 1", "Final: 2"])),
        (2, samples(&["Final: 1", "Final: 2"])),
        (3, samples(&["Final: 03", "Final: +3", "Final: 3"])),
        (4, samples(&["x", "y"])),
        (5, samples(&["Final: 5"])),
    ];
    let verifier = FinalLineVerifier::new();
    let pairs: Vec<(f64, f64)> = packs
        .iter()
        .map(|(expected, pack)| {
            let ex = example(*expected);
            let first = score(&ex, pack[0].as_completion()).reward;
            let best = pick_best(&ex, pack, &verifier).scored.reward;
            assert!(best >= first);
            (first, best)
        })
        .collect();

    let metrics = SelectionMetrics::from_pairs(pairs);
    assert!(metrics.pass_at_n >= metrics.pass_at_1);
    assert_eq!(metrics.n_pass_at_1, 2);
    assert_eq!(metrics.n_pass_at_n, 4);
    assert_eq!(metrics.rescued, 2);
}
