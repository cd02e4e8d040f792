//! finalcheck CLI
//!
//! Score completions against the strict `Final: <int>` contract, run
//! best-of-N selection over frozen sample packs, and gate candidate runs
//! against a baseline under the Locked Room rule.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, Level};

use finalcheck_core::io::manifest::CommandInfo;
use finalcheck_core::{
    byte_tokens, evaluate_gate, inspect_run, load_run_stats, make_run_dir, obs, render_gate_md,
    render_inspection, render_tokens, run_eval, run_selection, tokenize, validate_golden,
    write_gate_md, Completion, EvalConfig, FinalLineVerifier, GateConfig, InspectOptions,
    JsonlCompletionSource, SelectionConfig, TieBreakKind, METRICS,
};

/// finalcheck - deterministic verifier and run gate for `Final: <int>` answers
#[derive(Parser)]
#[command(name = "finalcheck")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verify, select and gate Final-line math completions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true, env = "FINALCHECK_LOG_JSON")]
    json: bool,

    /// Root directory for new run directories
    #[arg(long, global = true, env = "FINALCHECK_RUNS_DIR", default_value = "runs")]
    runs_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one frozen completion per dataset example
    Eval {
        /// Dataset JSONL (id, prompt, expected_answer)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Frozen completions JSONL (id, completion, optional logprobs)
        #[arg(short, long)]
        completions: PathBuf,

        /// Write artifacts here instead of a fresh run directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Only evaluate the first N examples
        #[arg(long)]
        max_examples: Option<usize>,
    },

    /// Best-of-N selection over a frozen sample pack
    Select {
        /// Dataset JSONL (id, prompt, expected_answer)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Selection pack JSONL (id, samples: [...])
        #[arg(short, long)]
        samples: PathBuf,

        /// Consider at most the first N samples per example
        #[arg(short, long)]
        n: Option<usize>,

        /// Only select over the first N examples
        #[arg(long)]
        max_examples: Option<usize>,

        /// Tie-break among equal-reward samples (lexicographic, logprob)
        #[arg(long, default_value_t = TieBreakKind::Lexicographic)]
        tie_break: TieBreakKind,

        /// Write artifacts here instead of a fresh run directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compare a candidate run against a baseline (exit 1 on REJECT)
    Gate {
        /// Baseline run directory
        #[arg(long)]
        baseline: PathBuf,

        /// Candidate run directory
        #[arg(long)]
        candidate: PathBuf,

        /// Minimum pass-rate improvement required to promote
        #[arg(long, default_value_t = 0.0)]
        min_delta: f64,

        /// Print the verdict as JSON
        #[arg(long = "format-json")]
        format_json: bool,

        /// Also write the verdict as Markdown
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Summarize a run directory or results.jsonl
    Inspect {
        /// Run directory or results.jsonl path
        run: PathBuf,

        /// Outcome-code groups to show
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Examples per group (or rescues) to show
        #[arg(long, default_value_t = 3)]
        show: usize,

        /// Hide the `ok` group for eval runs
        #[arg(long)]
        only_fails: bool,

        /// Print a single record by id
        #[arg(long)]
        id: Option<String>,
    },

    /// Check the verifier against golden cases (exit 1 on any failure)
    Validate {
        /// Dataset JSONL the golden ids refer to
        #[arg(short, long)]
        dataset: PathBuf,

        /// Golden JSONL (id, completion, expected_reward, expected_code)
        #[arg(short, long)]
        golden: PathBuf,
    },

    /// Score a single completion and print the full result as JSON
    Score {
        /// Expected answer as JSON (`42`, `"42"`, `42.0`)
        #[arg(short, long, allow_hyphen_values = true)]
        expected: String,

        /// Completion text (read from stdin when omitted)
        #[arg(short, long, allow_hyphen_values = true)]
        completion: Option<String>,

        /// Score as a missing completion
        #[arg(long, conflicts_with = "completion")]
        missing: bool,
    },

    /// Show how a string splits into tokens
    Tokens {
        /// Text to tokenize (read from stdin when omitted)
        #[arg(allow_hyphen_values = true)]
        text: Option<String>,

        /// Always list raw UTF-8 bytes
        #[arg(long)]
        bytes: bool,

        /// Print the tokenization as JSON
        #[arg(long = "format-json")]
        format_json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    finalcheck_core::init_tracing(cli.json, level);

    let succeeded = match cli.command {
        Commands::Eval {
            dataset,
            completions,
            out,
            max_examples,
        } => cmd_eval(
            &cli.runs_dir,
            &dataset,
            &completions,
            out.as_deref(),
            max_examples,
        ),
        Commands::Select {
            dataset,
            samples,
            n,
            max_examples,
            tie_break,
            out,
        } => cmd_select(
            &cli.runs_dir,
            &dataset,
            &samples,
            n,
            max_examples,
            tie_break,
            out.as_deref(),
        ),
        Commands::Gate {
            baseline,
            candidate,
            min_delta,
            format_json,
            report,
        } => cmd_gate(&baseline, &candidate, min_delta, format_json, report.as_deref()),
        Commands::Inspect {
            run,
            top_k,
            show,
            only_fails,
            id,
        } => cmd_inspect(
            &run,
            InspectOptions {
                top_k,
                show,
                only_fails,
                id,
            },
        ),
        Commands::Validate { dataset, golden } => cmd_validate(&dataset, &golden),
        Commands::Score {
            expected,
            completion,
            missing,
        } => cmd_score(&expected, completion, missing),
        Commands::Tokens {
            text,
            bytes,
            format_json,
        } => cmd_tokens(text, bytes, format_json),
    };

    METRICS.flush();
    Ok(if succeeded? {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Argv and parsed arguments as recorded in `manifest.json`.
fn command_info(script: &str, args: Map<String, Value>) -> CommandInfo {
    CommandInfo {
        script: script.to_string(),
        argv: std::env::args().collect(),
        args,
    }
}

/// Use `out` as given, or allocate a fresh `<runs_dir>/<prefix>_<timestamp>`.
fn prepare_out_dir(runs_dir: &Path, prefix: &str, out: Option<&Path>) -> Result<PathBuf> {
    match out {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {:?}", dir))?;
            Ok(dir.to_path_buf())
        }
        None => make_run_dir(runs_dir, prefix)
            .with_context(|| format!("Failed to create run directory under {:?}", runs_dir)),
    }
}

/// Score frozen completions and write an eval run.
fn cmd_eval(
    runs_dir: &Path,
    dataset: &Path,
    completions: &Path,
    out: Option<&Path>,
    max_examples: Option<usize>,
) -> Result<bool> {
    let source = JsonlCompletionSource::open(completions)
        .with_context(|| format!("Failed to load completions {:?}", completions))?;
    let out_dir = prepare_out_dir(runs_dir, "eval", out)?;

    let mut args = Map::new();
    args.insert("dataset".into(), Value::String(dataset.display().to_string()));
    args.insert(
        "completions".into(),
        Value::String(completions.display().to_string()),
    );
    args.insert("max_examples".into(), serde_json::json!(max_examples));

    let config = EvalConfig {
        dataset_path: dataset.to_path_buf(),
        max_examples,
        verifier: FinalLineVerifier::new(),
        command: command_info("eval", args),
        extra_inputs: vec![completions.to_path_buf()],
    };
    let report = run_eval(&config, &source, &out_dir)?;

    let metrics = &report.summary.metrics;
    println!("Eval run: {}", out_dir.display());
    println!(
        "  pass_rate: {:.3} ({} / {})",
        metrics.pass_rate,
        metrics.n_pass,
        metrics.n_pass + metrics.n_fail
    );
    if report.summary.run.n_missing_completions > 0 {
        println!(
            "  missing completions: {}",
            report.summary.run.n_missing_completions
        );
    }
    if let Some(kl) = metrics.mean_kl_est {
        println!("  mean_kl_est: {kl:.3} (n={})", metrics.n_with_kl);
    }
    Ok(true)
}

/// Run best-of-N selection and write a selection run.
fn cmd_select(
    runs_dir: &Path,
    dataset: &Path,
    samples: &Path,
    n: Option<usize>,
    max_examples: Option<usize>,
    tie_break: TieBreakKind,
    out: Option<&Path>,
) -> Result<bool> {
    if n == Some(0) {
        bail!("--n must be at least 1");
    }
    let out_dir = prepare_out_dir(runs_dir, "select", out)?;

    let mut args = Map::new();
    args.insert("dataset".into(), Value::String(dataset.display().to_string()));
    args.insert("samples".into(), Value::String(samples.display().to_string()));
    args.insert("n".into(), serde_json::json!(n));
    args.insert("max_examples".into(), serde_json::json!(max_examples));
    args.insert("tie_break".into(), Value::String(tie_break.to_string()));

    let config = SelectionConfig {
        dataset_path: dataset.to_path_buf(),
        samples_path: samples.to_path_buf(),
        n,
        max_examples,
        tie_break,
        verifier: FinalLineVerifier::new(),
        command: command_info("select", args),
    };
    let report = run_selection(&config, &out_dir)?;

    let m = &report.summary.metrics;
    println!("Selection run: {}", out_dir.display());
    println!("  pass@1: {:.3}", m.pass_at_1);
    println!("  pass@N: {:.3}", m.pass_at_n);
    println!("  delta:  {:.3}", m.delta);
    println!("  rescued: {}", m.rescued);
    Ok(true)
}

/// Gate a candidate run against a baseline.
fn cmd_gate(
    baseline: &Path,
    candidate: &Path,
    min_delta: f64,
    format_json: bool,
    report: Option<&Path>,
) -> Result<bool> {
    let base = load_run_stats(baseline)
        .with_context(|| format!("Failed to load baseline run {:?}", baseline))?;
    let cand = load_run_stats(candidate)
        .with_context(|| format!("Failed to load candidate run {:?}", candidate))?;

    let verdict = evaluate_gate(&base, &cand, &GateConfig::with_min_delta(min_delta));
    METRICS.inc_gates();
    obs::emit_gate_evaluated(&verdict);

    if format_json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print!("{}", render_gate_md(&verdict));
    }
    if let Some(path) = report {
        write_gate_md(path, &verdict)?;
        info!(path = %path.display(), "gate report written");
    }

    Ok(verdict.promoted())
}

/// Print a human summary of a finished run.
fn cmd_inspect(run: &Path, opts: InspectOptions) -> Result<bool> {
    let current = FinalLineVerifier::new().identity().clone();
    let inspection =
        inspect_run(run, &current).with_context(|| format!("Failed to inspect run {:?}", run))?;

    if let Some(id) = &opts.id {
        if inspection.find(id).is_none() {
            bail!("id not found in run: {id}");
        }
    }
    print!("{}", render_inspection(&inspection, &current, &opts));
    Ok(true)
}

/// Validate the verifier against a golden file.
fn cmd_validate(dataset: &Path, golden: &Path) -> Result<bool> {
    let verifier = FinalLineVerifier::new();
    let report = validate_golden(dataset, golden, &verifier)
        .with_context(|| format!("Failed to validate golden file {:?}", golden))?;

    for failure in &report.failures {
        println!("{failure}");
    }
    println!("{}", report.headline(golden));

    Ok(report.passed())
}

/// Score one completion against one expected answer.
fn cmd_score(expected: &str, completion: Option<String>, missing: bool) -> Result<bool> {
    // Bare words that are not JSON are treated as strings.
    let expected_answer = serde_json::from_str::<Value>(expected)
        .unwrap_or_else(|_| Value::String(expected.to_string()));

    let mut record = Map::new();
    record.insert("id".into(), Value::String("cli".into()));
    record.insert("expected_answer".into(), expected_answer);

    let text = match (completion, missing) {
        (_, true) => None,
        (Some(text), false) => Some(text),
        (None, false) => Some(read_stdin().context("Failed to read completion from stdin")?),
    };

    let verifier = FinalLineVerifier::new();
    let result = verifier.score_record(&record, Completion::from(text.as_deref()));
    METRICS.record_score(result.passed());
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(true)
}

/// Print the token pieces of a string.
fn cmd_tokens(text: Option<String>, bytes: bool, format_json: bool) -> Result<bool> {
    let text = match text {
        Some(text) => text,
        None => read_stdin().context("Failed to read text from stdin")?,
    };
    let tokenization = if bytes {
        byte_tokens(&text)
    } else {
        tokenize(&text)
    };

    if format_json {
        println!("{}", serde_json::to_string_pretty(&tokenization)?);
    } else {
        print!("{}", render_tokens(&text, &tokenization));
    }
    Ok(true)
}

fn read_stdin() -> std::io::Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
