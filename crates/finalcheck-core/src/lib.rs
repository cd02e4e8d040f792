//! finalcheck core library
//!
//! The strict `Final: <int>` verifier, best-of-N selection over sampled
//! completions, and the Locked Room gate, plus the drivers that turn them
//! into run artifacts.

pub mod aggregate;
pub mod dataset;
pub mod domain;
pub mod eval;
pub mod gate;
pub mod git;
pub mod inspect;
pub mod io;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod rollouts;
pub mod run_stats;
pub mod scoring;
pub mod select;
pub mod selection;
pub mod telemetry;
pub mod tokens;
pub mod validate;

pub use domain::{coerce_expected_answer, Completion, Example, HarnessError, Result, RolloutSample};

pub use scoring::{
    parse_final_line, score, FinalLineVerifier, OutcomeCode, ParseDetails, RewardSpec,
    ScoreDetails, ScoreResult, Scorer, ScorerIdentity, SCORER_NAME, SCORER_VERSION,
};

pub use selection::{
    pick_best, pick_best_with, LexicographicTieBreak, LogprobTieBreak, SelectionResult, TieBreak,
};

pub use aggregate::{EvalMetrics, OutcomeTally, SelectionMetrics};
pub use gate::{
    evaluate_gate, GateConfig, GateDecision, GateRule, GateVerdict, RunBrief, RunStats, Violation,
};

pub use dataset::{index_by_id, load_examples};
pub use rollouts::{
    load_frozen_rollouts, load_selection_pack, CompletionSource, JsonlCompletionSource,
    MapCompletionSource, SourceDescription,
};
pub use run_stats::{load_run_stats, record_outcome_code};

pub use eval::{evaluate, run_eval, EvalConfig, EvalRecord, EvalReport, EvalSummary};
pub use select::{
    run_selection, select_examples, SelectionConfig, SelectionRecord, SelectionReport,
    SelectionSummary, TieBreakKind,
};

pub use inspect::{inspect_run, render_inspection, InspectOptions, Inspection, RunMode};
pub use tokens::{byte_tokens, render_tokens, tokenize, Token, Tokenization};
pub use validate::{validate_golden, GoldenFailure, ValidationReport};

pub use git::{capture_head_sha, is_git_repo, try_git_info, GitInfo};
pub use io::{make_run_dir, write_manifest, Manifest, ManifestRequest};
pub use reporting::{
    render_eval_summary_md, render_gate_md, render_selection_summary_md, write_gate_md,
};

pub use metrics::METRICS;
pub use obs::RunSpan;
pub use telemetry::init_tracing;

/// finalcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
