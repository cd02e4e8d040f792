//! Golden-file validation of the verifier.
//!
//! A golden record pins the reward (and optionally the outcome code) the
//! current scorer must produce for a completion of a dataset example.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{index_by_id, load_examples};
use crate::domain::error::Result;
use crate::domain::example::value_to_text;
use crate::io::read_jsonl;
use crate::scoring::{FinalLineVerifier, OutcomeCode, Scorer, ScorerIdentity};

/// Why a golden case did not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoldenFailure {
    UnknownId {
        id: String,
    },
    RewardMismatch {
        id: String,
        expected_reward: f64,
        got: f64,
        code: OutcomeCode,
        completion: String,
    },
    CodeMismatch {
        id: String,
        expected_code: String,
        got: OutcomeCode,
        completion: String,
    },
}

impl std::fmt::Display for GoldenFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoldenFailure::UnknownId { id } => {
                write!(f, "[FAIL] golden id not found in dataset: {id}")
            }
            GoldenFailure::RewardMismatch {
                id,
                expected_reward,
                got,
                code,
                completion,
            } => write!(
                f,
                "[FAIL] id={id} expected_reward={expected_reward:?} got={got:?} \
                 error_code={code} completion={completion:?}"
            ),
            GoldenFailure::CodeMismatch {
                id,
                expected_code,
                got,
                completion,
            } => write!(
                f,
                "[FAIL] id={id} expected_code={expected_code} got={got} completion={completion:?}"
            ),
        }
    }
}

/// Outcome of validating one golden file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub scorer: ScorerIdentity,
    pub n_cases: usize,
    pub failures: Vec<GoldenFailure>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Closing line for terminal output.
    pub fn headline(&self, golden_path: &Path) -> String {
        if self.passed() {
            format!(
                "OK: {} ({} cases) under scorer {}",
                golden_path.display(),
                self.n_cases,
                self.scorer
            )
        } else {
            format!(
                "FAIL: {} / {} golden cases failed under scorer {}",
                self.failures.len(),
                self.n_cases,
                self.scorer
            )
        }
    }
}

/// Score every golden case against its dataset example.
///
/// `completion` may be absent or null (scored as empty text);
/// `expected_reward` defaults to 0.0; `expected_code` is optional.
pub fn validate_golden(
    dataset_path: &Path,
    golden_path: &Path,
    verifier: &FinalLineVerifier,
) -> Result<ValidationReport> {
    let examples = load_examples(dataset_path)?;
    let by_id = index_by_id(&examples)?;
    let golden = read_jsonl(golden_path)?;

    let mut failures = Vec::new();
    for record in &golden {
        let id = record.get("id").map(value_to_text).unwrap_or_default();
        let Some(example) = by_id.get(id.as_str()) else {
            failures.push(GoldenFailure::UnknownId { id });
            continue;
        };

        let completion = match record.get("completion") {
            None | Some(Value::Null) => String::new(),
            Some(v) => value_to_text(v),
        };
        let expected_reward = record
            .get("expected_reward")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let scored = verifier.score(example, completion.as_str().into());
        if scored.reward != expected_reward {
            failures.push(GoldenFailure::RewardMismatch {
                id,
                expected_reward,
                got: scored.reward,
                code: scored.code(),
                completion,
            });
            continue;
        }

        if let Some(expected_code) = record.get("expected_code").and_then(Value::as_str) {
            if expected_code != scored.code().as_str() {
                failures.push(GoldenFailure::CodeMismatch {
                    id,
                    expected_code: expected_code.to_string(),
                    got: scored.code(),
                    completion,
                });
            }
        }
    }

    Ok(ValidationReport {
        scorer: verifier.identity().clone(),
        n_cases: golden.len(),
        failures,
    })
}
