//! The `Final: <int>` verifier.
//!
//! `score` is total and deterministic: grammar rejections and malformed
//! examples come back as zero-reward results with an outcome code, never as
//! errors. Every result carries the scorer identity so downstream artifacts
//! can refuse to compare runs scored by different rules.

pub mod details;
pub mod grammar;
pub mod outcome;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::example::value_to_text;
use crate::domain::{coerce_expected_answer, Completion, Example};

pub use details::{
    CompletionView, ExampleRef, ParseDetails, ResultRecord, ScoreDetails, ScoreWarning,
};
pub use grammar::{parse_final_line, ParsedAnswer, Rejection, FINAL_PREFIX};
pub use outcome::{OutcomeCode, UnknownOutcomeCode};

use details::{line_format, SINGLE_LINE_FORMAT};
use grammar::{preview, split_lines, strip};

pub const SCORER_NAME: &str = "math_final_line_verifier";
pub const SCORER_VERSION: &str = "1.0.0";

/// Longest preview kept in `details.completion`, in characters.
pub const PREVIEW_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Identity and reward contract
// ---------------------------------------------------------------------------

/// Name and version of the rule set that produced a reward.
///
/// Changing reward behaviour requires a version bump; the gate refuses to
/// compare runs whose identities differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScorerIdentity {
    pub name: String,
    pub version: String,
}

impl ScorerIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ScorerIdentity {
    fn default() -> Self {
        Self::new(SCORER_NAME, SCORER_VERSION)
    }
}

impl fmt::Display for ScorerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Integer rules of the reward contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntFormat {
    pub base: u32,
    pub sign: String,
    pub no_commas: bool,
    pub no_units: bool,
    pub no_words: bool,
    pub no_leading_zeros: bool,
    pub no_negative_zero: bool,
}

/// Human-readable description of the reward contract, written into run
/// summaries for auditing and diffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSpec {
    pub task: String,
    pub format: String,
    pub int_format: IntFormat,
    pub normalization: Vec<String>,
    pub reward: String,
    pub no_partial_credit: bool,
}

impl RewardSpec {
    /// The contract enforced by `FinalLineVerifier` at `SCORER_VERSION`.
    pub fn current() -> Self {
        Self {
            task: "single_turn_math_answer_verification".to_string(),
            format: SINGLE_LINE_FORMAT.to_string(),
            int_format: IntFormat {
                base: 10,
                sign: "optional leading '-'".to_string(),
                no_commas: true,
                no_units: true,
                no_words: true,
                no_leading_zeros: true,
                no_negative_zero: true,
            },
            normalization: vec!["strip surrounding whitespace".to_string()],
            reward: "1.0 if parsed int == expected_answer else 0.0".to_string(),
            no_partial_credit: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Reward plus its explanation. Reward is always exactly 0.0 or 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub reward: f64,
    pub details: ScoreDetails,
}

impl ScoreResult {
    pub fn code(&self) -> OutcomeCode {
        self.details.result.code
    }

    pub fn passed(&self) -> bool {
        self.code().is_ok()
    }
}

/// Anything that can turn an example and a completion into a reward.
pub trait Scorer {
    fn score(&self, example: &Example, completion: Completion<'_>) -> ScoreResult;
}

impl<F> Scorer for F
where
    F: Fn(&Example, Completion<'_>) -> ScoreResult,
{
    fn score(&self, example: &Example, completion: Completion<'_>) -> ScoreResult {
        self(example, completion)
    }
}

/// The strict single-line verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalLineVerifier {
    identity: ScorerIdentity,
}

impl FinalLineVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A verifier that reports a different identity. Reward rules are
    /// unchanged; this exists for version-drift tests and dry runs.
    pub fn with_identity(identity: ScorerIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &ScorerIdentity {
        &self.identity
    }

    /// Score against a raw dataset record instead of a validated `Example`.
    ///
    /// A record whose `expected_answer` is absent or not integer-coercible
    /// yields `invalid_example` rather than an error.
    pub fn score_record(
        &self,
        record: &Map<String, Value>,
        completion: Completion<'_>,
    ) -> ScoreResult {
        let id = record
            .get("id")
            .map(value_to_text)
            .unwrap_or_else(|| "<missing-id>".to_string());
        let expected =
            coerce_expected_answer(record.get("expected_answer").unwrap_or(&Value::Null));
        self.verify(id, expected, completion)
    }

    fn verify(
        &self,
        id: String,
        expected: Result<i64, String>,
        completion: Completion<'_>,
    ) -> ScoreResult {
        let mut warnings = Vec::new();
        if let Err(reason) = &expected {
            warnings.push(ScoreWarning::new("expected_answer_not_int", reason.clone()));
        }
        if completion.is_missing() {
            warnings.push(ScoreWarning::new(
                "completion_missing",
                "no completion was supplied; scored as empty text",
            ));
        }

        let raw = completion.as_text();
        let normalized = strip(raw);
        let lines = if normalized.is_empty() {
            Vec::new()
        } else {
            split_lines(normalized)
        };

        let mut details = ScoreDetails {
            scorer: self.identity.clone(),
            example: ExampleRef {
                id,
                expected_answer: expected.as_ref().ok().copied(),
            },
            completion: CompletionView {
                raw_preview: preview(raw, PREVIEW_LIMIT),
                normalized_preview: preview(normalized, PREVIEW_LIMIT),
                line_count: lines.len(),
                missing: completion.is_missing(),
            },
            parse: None,
            matched: false,
            result: ResultRecord {
                code: OutcomeCode::InvalidExample,
                message: None,
            },
            notes: Vec::new(),
            warnings,
        };

        let Ok(expected) = expected else {
            details
                .notes
                .push("Example expected_answer is invalid; reward forced to 0.".to_string());
            details.result.message = Some("expected_answer missing or not int".to_string());
            return zero(details);
        };

        if lines.len() != 1 {
            let message = format!("Expected 1 line after stripping; got {}", lines.len());
            details.parse = Some(ParseDetails::rejected(
                SINGLE_LINE_FORMAT.to_string(),
                OutcomeCode::NotSingleLine,
                message.clone(),
            ));
            details.result = ResultRecord {
                code: OutcomeCode::NotSingleLine,
                message: Some(message),
            };
            return zero(details);
        }

        let parsed = match parse_final_line(lines[0]) {
            Ok(parsed) => parsed,
            Err(rejection) => {
                details.parse = Some(ParseDetails::rejected(
                    line_format(),
                    rejection.code,
                    rejection.message.clone(),
                ));
                details.result = ResultRecord {
                    code: rejection.code,
                    message: Some(rejection.message),
                };
                return zero(details);
            }
        };

        details.parse = Some(ParseDetails::accepted(parsed.text, parsed.value));
        details.matched = parsed.value == Some(expected);
        if details.matched {
            details.result = ResultRecord {
                code: OutcomeCode::Ok,
                message: None,
            };
            return ScoreResult {
                reward: 1.0,
                details,
            };
        }

        if parsed.value.is_none() {
            details
                .notes
                .push("Integer is outside the 64-bit range; it cannot match.".to_string());
        }
        details
            .notes
            .push("Parsed successfully but did not match expected_answer.".to_string());
        details.result = ResultRecord {
            code: OutcomeCode::WrongAnswer,
            message: Some("parsed int != expected_answer".to_string()),
        };
        zero(details)
    }
}

impl Scorer for FinalLineVerifier {
    fn score(&self, example: &Example, completion: Completion<'_>) -> ScoreResult {
        self.verify(example.id.clone(), Ok(example.expected_answer), completion)
    }
}

fn zero(details: ScoreDetails) -> ScoreResult {
    ScoreResult {
        reward: 0.0,
        details,
    }
}

/// Score with the default verifier.
pub fn score(example: &Example, completion: Completion<'_>) -> ScoreResult {
    FinalLineVerifier::new().score(example, completion)
}
