//! Markdown renderings of run summaries and gate verdicts.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::eval::{EvalRecord, EvalSummary};
use crate::gate::GateVerdict;
use crate::io::write_text;
use crate::select::SelectionSummary;

/// Failures listed in an eval `summary.md`.
const FAILURE_SAMPLE: usize = 10;
/// Characters of completion shown per listed failure.
const FAILURE_PREVIEW_CHARS: usize = 80;

/// Render `summary.md` for an eval run.
pub fn render_eval_summary_md(summary: &EvalSummary, records: &[EvalRecord]) -> String {
    let run = &summary.run;
    let metrics = &summary.metrics;
    let mut out = String::new();

    out.push_str("# Eval run\n\n");
    let _ = writeln!(out, "- Created (UTC): `{}`", run.created_utc);
    let _ = writeln!(out, "- Scorer: `{}` v`{}`", run.scorer.name, run.scorer.version);
    let _ = writeln!(out, "- Dataset: `{}`", run.dataset_path);
    let _ = writeln!(out, "- Completion source: `{}`", run.completion_source);
    let _ = writeln!(
        out,
        "- Examples: `{}` (missing completions: `{}`)",
        run.n_examples, run.n_missing_completions
    );

    out.push_str("\n## Metrics\n");
    let _ = writeln!(out, "- pass_rate: **{:.3}**", metrics.pass_rate);
    let _ = writeln!(out, "- n_pass: `{}`", metrics.n_pass);
    let _ = writeln!(out, "- n_fail: `{}`", metrics.n_fail);
    if let Some(kl) = metrics.mean_kl_est {
        let _ = writeln!(out, "- mean_kl_est: **{kl:.3}** (n={})", metrics.n_with_kl);
    }

    out.push_str("\n## Outcome codes\n");
    for (code, count) in summary.outcomes.ordered() {
        let _ = writeln!(out, "- `{code}`: {count}");
    }

    let failures: Vec<&EvalRecord> = records
        .iter()
        .filter(|r| r.reward == 0.0)
        .take(FAILURE_SAMPLE)
        .collect();
    if !failures.is_empty() {
        let _ = writeln!(
            out,
            "\n## First {} failures (details in results.jsonl)",
            failures.len()
        );
        for r in failures {
            let preview: String = r
                .completion
                .chars()
                .take(FAILURE_PREVIEW_CHARS)
                .map(|c| if c == '\n' { ' ' } else { c })
                .collect();
            let _ = writeln!(out, "- `{}` [{}] completion: `{preview}`", r.id, r.outcome_code);
        }
    }

    out
}

/// Render `summary.md` for a selection run.
pub fn render_selection_summary_md(summary: &SelectionSummary) -> String {
    let run = &summary.run;
    let m = &summary.metrics;
    let mut out = String::new();

    out.push_str("# Selection run (best-of-N)\n\n");
    let _ = writeln!(out, "- Created (UTC): `{}`", run.created_utc);
    let _ = writeln!(out, "- Scorer: `{}` v`{}`", run.scorer.name, run.scorer.version);
    let _ = writeln!(out, "- Dataset: `{}`", run.dataset_path);
    let _ = writeln!(out, "- Samples: `{}`", run.samples_path);
    let cap = run.n.map_or_else(|| "all".to_string(), |n| n.to_string());
    let _ = writeln!(out, "- Sample cap: `{cap}`");
    let _ = writeln!(out, "- Tie-break: `{}`", run.tie_break);
    let _ = writeln!(
        out,
        "- Examples: `{}` (missing samples: `{}`)",
        run.n_examples, run.n_missing_samples
    );

    out.push_str("\n## Metrics\n");
    let _ = writeln!(out, "- pass@1: **{:.3}**", m.pass_at_1);
    let _ = writeln!(out, "- pass@N: **{:.3}**", m.pass_at_n);
    let _ = writeln!(out, "- delta: **{:.3}**", m.delta);
    let _ = writeln!(out, "- rescued: `{}`", m.rescued);

    out.push_str("\n## Interpretation\n");
    out.push_str(
        "Best-of-N improves the *chosen output* by spending more sampling compute.\n\
         It does **not** change the underlying model distribution.\n",
    );
    out
}

/// Render a gate verdict for terminals and PR comments.
pub fn render_gate_md(verdict: &GateVerdict) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Gate: {}\n", verdict.decision);
    let _ = writeln!(
        out,
        "- baseline: `{}` pass_rate={:.4} n={}",
        verdict.baseline.run_dir.display(),
        verdict.baseline.pass_rate,
        verdict.baseline.n
    );
    let _ = writeln!(
        out,
        "- candidate: `{}` pass_rate={:.4} n={}",
        verdict.candidate.run_dir.display(),
        verdict.candidate.pass_rate,
        verdict.candidate.n
    );
    let _ = writeln!(out, "- delta: {:.4}", verdict.delta);

    if !verdict.reasons.is_empty() {
        out.push_str("\n## Reasons\n");
        for v in &verdict.reasons {
            let _ = writeln!(out, "- {v}");
        }
    }
    out
}

/// Write a gate verdict as Markdown.
pub fn write_gate_md(path: &Path, verdict: &GateVerdict) -> Result<()> {
    write_text(path, &render_gate_md(verdict)).with_context(|| format!("write {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::SelectionMetrics;
    use crate::gate::{evaluate_gate, GateConfig, RunStats};
    use crate::scoring::{RewardSpec, ScorerIdentity};
    use crate::select::{SelectionRunInfo, TieBreakKind};
    use std::collections::BTreeMap;

    #[test]
    fn selection_md_carries_reminder_and_metrics() {
        let summary = SelectionSummary {
            run: SelectionRunInfo {
                created_utc: "2026-01-01T00:00:00+00:00".to_string(),
                scorer: ScorerIdentity::default(),
                dataset_path: "dev.jsonl".to_string(),
                samples_path: "pack.jsonl".to_string(),
                n_examples: 4,
                n_missing_samples: 0,
                n: Some(4),
                tie_break: TieBreakKind::Lexicographic,
                reward_spec: RewardSpec::current(),
            },
            metrics: SelectionMetrics::from_pairs(vec![(0.0, 1.0), (1.0, 1.0)]),
        };
        let md = render_selection_summary_md(&summary);
        assert!(md.contains("- pass@1: **0.500**"));
        assert!(md.contains("- pass@N: **1.000**"));
        assert!(md.contains("- rescued: `1`"));
        assert!(md.contains("does **not** change the underlying model distribution"));
    }

    #[test]
    fn gate_md_lists_reasons() {
        let stats = |version: &str, pass_rate: f64| RunStats {
            run_dir: "runs/a".into(),
            created_utc: String::new(),
            dataset: None,
            scorer: ScorerIdentity::new("math_final_line_verifier", version),
            n_examples: 2,
            pass_rate,
            outcome_counts: BTreeMap::new(),
        };
        let verdict = evaluate_gate(
            &stats("1.0.0", 0.5),
            &stats("1.1.0", 1.0),
            &GateConfig::default(),
        );
        let md = render_gate_md(&verdict);
        assert!(md.starts_with("# Gate: REJECT"));
        assert!(md.contains("LockedRoomViolation: scorer mismatch"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.md");
        write_gate_md(&path, &verdict).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), md);
    }
}
