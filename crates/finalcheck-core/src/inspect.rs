//! Read a finished run back and explain it: outcome groups, example
//! failures, rescues and scorer drift.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::domain::error::{HarnessError, Result};
use crate::io::read_jsonl;
use crate::run_stats::{record_reward, RESULTS_FILE, SUMMARY_FILE};
use crate::scoring::ScorerIdentity;

type Record = Map<String, Value>;

/// The artifacts of one run on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRun {
    pub run_dir: PathBuf,
    pub results_path: PathBuf,
    pub summary_path: Option<PathBuf>,
}

/// Accept a run directory or a path to its `results.jsonl`.
pub fn resolve_run(path: &Path) -> Result<ResolvedRun> {
    let path = path
        .canonicalize()
        .map_err(|_| HarnessError::MissingArtifact(path.to_path_buf()))?;

    let (run_dir, results_path) = if path.is_dir() {
        let results = path.join(RESULTS_FILE);
        if !results.is_file() {
            return Err(HarnessError::MissingArtifact(results));
        }
        (path, results)
    } else if path.file_name().is_some_and(|n| n == RESULTS_FILE) {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (dir, path)
    } else {
        return Err(HarnessError::InvalidRecord {
            path,
            message: format!("expected a run directory or a {RESULTS_FILE} file"),
        });
    };

    let summary = run_dir.join(SUMMARY_FILE);
    Ok(ResolvedRun {
        summary_path: summary.is_file().then_some(summary),
        run_dir,
        results_path,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Eval,
    Selection,
    Empty,
    Unknown,
}

/// Which driver wrote a results file, judged from its first record.
pub fn infer_mode(records: &[Record]) -> RunMode {
    match records.first() {
        None => RunMode::Empty,
        Some(r) if r.contains_key("reward") && r.contains_key("details") => RunMode::Eval,
        Some(r) if r.contains_key("baseline") && r.contains_key("best_of_n") => RunMode::Selection,
        Some(_) => RunMode::Unknown,
    }
}

/// Eval outcome label for inspection.
///
/// Uses `outcome_code` when present; otherwise passing records are `ok` and
/// failing records fall back through `details.result.code` and
/// `details.parse.error_code`.
pub fn eval_outcome_code(record: &Record) -> String {
    if let Some(code) = record.get("outcome_code").and_then(Value::as_str) {
        return code.to_string();
    }
    if record_reward(record) == 1.0 {
        return "ok".to_string();
    }
    let record = Value::Object(record.clone());
    ["/details/result/code", "/details/parse/error_code"]
        .iter()
        .filter_map(|p| record.pointer(p).and_then(Value::as_str))
        .find(|c| !c.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Records sharing one outcome label, as indices into the record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeGroup {
    pub code: String,
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalAnalysis {
    pub n: usize,
    pub n_pass: usize,
    pub n_fail: usize,
    pub pass_rate: f64,
    /// `ok` first, then by size descending, then by name.
    pub groups: Vec<CodeGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionAnalysis {
    pub n: usize,
    pub pass_at_1: f64,
    pub pass_at_n: f64,
    pub rescued: usize,
    /// Indices of records where the baseline failed and best-of-N passed.
    pub rescues: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunAnalysis {
    Eval(EvalAnalysis),
    Selection(SelectionAnalysis),
    Empty,
    Unknown { n: usize },
}

pub fn analyze_eval(records: &[Record]) -> EvalAnalysis {
    let n = records.len();
    let n_pass = records.iter().filter(|r| record_reward(r) == 1.0).count();

    let mut by_code: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, r) in records.iter().enumerate() {
        by_code.entry(eval_outcome_code(r)).or_default().push(i);
    }
    let mut groups: Vec<CodeGroup> = by_code
        .into_iter()
        .map(|(code, indices)| CodeGroup { code, indices })
        .collect();
    groups.sort_by(|a, b| {
        (a.code != "ok")
            .cmp(&(b.code != "ok"))
            .then_with(|| b.indices.len().cmp(&a.indices.len()))
            .then_with(|| a.code.cmp(&b.code))
    });

    EvalAnalysis {
        n,
        n_pass,
        n_fail: n - n_pass,
        pass_rate: if n == 0 { 0.0 } else { n_pass as f64 / n as f64 },
        groups,
    }
}

pub fn analyze_selection(records: &[Record]) -> SelectionAnalysis {
    let reward = |r: &Record, key: &str| {
        r.get(key)
            .and_then(|v| v.get("reward"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };

    let n = records.len();
    let mut n_base = 0;
    let mut n_best = 0;
    let mut rescues = Vec::new();
    for (i, r) in records.iter().enumerate() {
        let base = reward(r, "baseline");
        let best = reward(r, "best_of_n");
        n_base += usize::from(base == 1.0);
        n_best += usize::from(best == 1.0);
        if base == 0.0 && best == 1.0 {
            rescues.push(i);
        }
    }

    let rate = |k: usize| if n == 0 { 0.0 } else { k as f64 / n as f64 };
    SelectionAnalysis {
        n,
        pass_at_1: rate(n_base),
        pass_at_n: rate(n_best),
        rescued: rescues.len(),
        rescues,
    }
}

/// Everything `inspect` reports about one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub run: ResolvedRun,
    /// Parsed `summary.json`, if present and readable.
    pub summary: Option<Value>,
    pub records: Vec<Record>,
    pub analysis: RunAnalysis,
    /// The identity the run recorded, when it differs from the current one.
    pub scorer_drift: Option<ScorerIdentity>,
}

impl Inspection {
    pub fn mode(&self) -> RunMode {
        match self.analysis {
            RunAnalysis::Eval(_) => RunMode::Eval,
            RunAnalysis::Selection(_) => RunMode::Selection,
            RunAnalysis::Empty => RunMode::Empty,
            RunAnalysis::Unknown { .. } => RunMode::Unknown,
        }
    }

    /// The record whose `id` renders as `id`.
    pub fn find(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| match r.get("id") {
            Some(Value::String(s)) => s == id,
            Some(other) => other.to_string() == id,
            None => false,
        })
    }
}

/// Resolve and analyse a run, comparing its scorer against `current`.
pub fn inspect_run(path: &Path, current: &ScorerIdentity) -> Result<Inspection> {
    let run = resolve_run(path)?;
    let summary = run
        .summary_path
        .as_deref()
        .and_then(|p| fs::read_to_string(p).ok())
        .and_then(|text| serde_json::from_str::<Value>(&text).ok());
    let records = read_jsonl(&run.results_path)?;

    let analysis = match infer_mode(&records) {
        RunMode::Eval => RunAnalysis::Eval(analyze_eval(&records)),
        RunMode::Selection => RunAnalysis::Selection(analyze_selection(&records)),
        RunMode::Empty => RunAnalysis::Empty,
        RunMode::Unknown => RunAnalysis::Unknown { n: records.len() },
    };

    let scorer_drift = summary
        .as_ref()
        .and_then(|s| s.pointer("/run/scorer"))
        .and_then(|v| serde_json::from_value::<ScorerIdentity>(v.clone()).ok())
        .filter(|recorded| recorded != current);

    Ok(Inspection {
        run,
        summary,
        records,
        analysis,
        scorer_drift,
    })
}

// ---------------------------------------------------------------------------
// Text report
// ---------------------------------------------------------------------------

/// Display knobs for [`render_inspection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectOptions {
    /// Outcome groups to list.
    pub top_k: usize,
    /// Records shown per group (or rescues shown).
    pub show: usize,
    /// Hide the `ok` group.
    pub only_fails: bool,
    /// Print one record in full instead of the grouped view.
    pub id: Option<String>,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            show: 3,
            only_fails: false,
            id: None,
        }
    }
}

/// One-line rendering with escaped newlines, bounded to `limit` characters.
pub fn truncate_inline(text: &str, limit: usize) -> String {
    let escaped = text.replace('\n', "\\n");
    let total = escaped.chars().count();
    if total <= limit {
        return escaped;
    }
    let head: String = escaped.chars().take(limit).collect();
    format!("{head}... <truncated {} chars>", total - limit)
}

fn field<'a>(record: &'a Record, pointer: &str) -> Option<&'a Value> {
    let mut parts = pointer.trim_start_matches('/').split('/');
    let first = record.get(parts.next()?)?;
    parts.try_fold(first, |v, key| v.get(key))
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn render_inspection(
    inspection: &Inspection,
    current: &ScorerIdentity,
    opts: &InspectOptions,
) -> String {
    let mut out = String::new();
    render_header(&mut out, inspection, current);

    match &inspection.analysis {
        RunAnalysis::Eval(analysis) => match &opts.id {
            Some(id) => render_single(&mut out, inspection, id),
            None => render_eval(&mut out, inspection, analysis, opts),
        },
        RunAnalysis::Selection(analysis) => {
            if let Some(id) = &opts.id {
                render_single(&mut out, inspection, id);
            } else {
                render_selection(&mut out, inspection, analysis, opts);
            }
        }
        RunAnalysis::Empty => out.push_str("\nRun contained no records.\n"),
        RunAnalysis::Unknown { n } => {
            let _ = writeln!(
                out,
                "\nUnknown results format. Found {n} records, but couldn't infer mode."
            );
        }
    }
    out
}

fn render_header(out: &mut String, inspection: &Inspection, current: &ScorerIdentity) {
    let run = &inspection.run;
    let _ = writeln!(out, "Run directory: {}", run.run_dir.display());
    let _ = writeln!(out, "Results file:  {}", run.results_path.display());
    if let Some(p) = &run.summary_path {
        let _ = writeln!(out, "Summary file:  {}", p.display());
    }

    let Some(meta) = inspection.summary.as_ref().and_then(|s| s.get("run")) else {
        out.push_str("\n(No readable summary.json found.)\n");
        return;
    };

    out.push_str("\nRun metadata:\n");
    if let Some(created) = meta.get("created_utc").and_then(Value::as_str) {
        let _ = writeln!(out, "- created_utc: {created}");
    }
    if let Some(scorer) = meta.get("scorer") {
        let _ = writeln!(
            out,
            "- scorer: {} v{}",
            text_of(scorer.get("name")),
            text_of(scorer.get("version"))
        );
    }
    if inspection.scorer_drift.is_some() {
        out.push_str("  WARNING: this run used a different scorer than the current build.\n");
        let _ = writeln!(out, "  current scorer: {current}");
        out.push_str("  Locked Room Rule: don't compare metrics across scorer versions.\n");
    }
    for key in ["dataset_path", "samples_path", "n_examples"] {
        if let Some(v) = meta.get(key) {
            let _ = writeln!(out, "- {key}: {}", text_of(Some(v)));
        }
    }
}

fn render_single(out: &mut String, inspection: &Inspection, id: &str) {
    let Some(record) = inspection.find(id) else {
        let _ = writeln!(out, "\nNo record found with id={id:?}");
        return;
    };

    let mut shown = record.clone();
    if let Some(Value::String(c)) = shown.get_mut("completion") {
        *c = truncate_inline(c, 800);
    }
    if let Some(view) = shown
        .get_mut("details")
        .and_then(|d| d.get_mut("completion"))
        .and_then(Value::as_object_mut)
    {
        for key in ["raw_preview", "normalized_preview"] {
            if let Some(Value::String(p)) = view.get_mut(key) {
                *p = truncate_inline(p, 400);
            }
        }
    }

    let code = match inspection.mode() {
        RunMode::Eval => eval_outcome_code(record),
        _ => text_of(field(record, "/best_of_n/outcome_code")),
    };
    let _ = writeln!(out, "\n=== Inspect id={id} (outcome_code={code}) ===\n");
    let pretty = serde_json::to_string_pretty(&Value::Object(shown)).unwrap_or_default();
    out.push_str(&pretty);
    out.push('\n');
}

fn render_eval(
    out: &mut String,
    inspection: &Inspection,
    a: &EvalAnalysis,
    opts: &InspectOptions,
) {
    out.push_str("\nMetrics (from results.jsonl):\n");
    let _ = writeln!(out, "- n: {}", a.n);
    let _ = writeln!(
        out,
        "- pass_rate: {:.3}  (pass={}, fail={})",
        a.pass_rate, a.n_pass, a.n_fail
    );

    let groups: Vec<&CodeGroup> = a
        .groups
        .iter()
        .filter(|g| !(opts.only_fails && g.code == "ok"))
        .take(opts.top_k)
        .collect();

    out.push_str("\nTop outcome codes:\n");
    for g in &groups {
        let _ = writeln!(out, "- {}: {}", g.code, g.indices.len());
    }

    let mut printed = 0;
    for g in groups.iter().filter(|g| g.code != "ok") {
        let _ = writeln!(out, "\n=== {} (showing up to {}) ===", g.code, opts.show);
        for &i in g.indices.iter().take(opts.show) {
            let r = &inspection.records[i];
            let parsed = field(r, "/details/parse/answer_str")
                .and_then(Value::as_str)
                .map_or_else(|| "None".to_string(), |s| format!("{s:?}"));
            let _ = writeln!(
                out,
                "- id={} expected={} parsed={parsed}",
                text_of(r.get("id")),
                text_of(r.get("expected_answer"))
            );
            let _ = writeln!(
                out,
                "  completion: {}",
                truncate_inline(&text_of(r.get("completion")), 160)
            );
            let why = text_of(field(r, "/details/parse/error_message"));
            if !why.is_empty() {
                let _ = writeln!(out, "  why: {why}");
            }
        }
        printed += 1;
    }

    if printed == 0 && opts.only_fails {
        out.push_str("\nNo failures found (all ok).\n");
    }
}

fn render_selection(
    out: &mut String,
    inspection: &Inspection,
    a: &SelectionAnalysis,
    opts: &InspectOptions,
) {
    out.push_str("\nMetrics (from results.jsonl):\n");
    let _ = writeln!(out, "- n: {}", a.n);
    let _ = writeln!(out, "- pass@1: {:.3}", a.pass_at_1);
    let _ = writeln!(out, "- pass@N: {:.3}", a.pass_at_n);
    let _ = writeln!(out, "- rescued (baseline fail -> best success): {}", a.rescued);

    if a.rescues.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n=== Rescue examples (showing up to {}) ===", opts.show);
    for &i in a.rescues.iter().take(opts.show) {
        let r = &inspection.records[i];
        let _ = writeln!(
            out,
            "- id={} expected={}",
            text_of(r.get("id")),
            text_of(r.get("expected_answer"))
        );
        let _ = writeln!(
            out,
            "  baseline: {}",
            truncate_inline(&text_of(field(r, "/baseline/completion")), 160)
        );
        let _ = writeln!(
            out,
            "  best:     {}",
            truncate_inline(&text_of(field(r, "/best_of_n/completion")), 160)
        );
    }
}
