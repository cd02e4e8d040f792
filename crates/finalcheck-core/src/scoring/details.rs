//! Explanation record attached to every `ScoreResult`.

use serde::{Deserialize, Serialize};

use super::grammar::FINAL_PREFIX;
use super::outcome::OutcomeCode;
use super::ScorerIdentity;

/// Shape a parse sub-record advertises for the single-line check.
pub const SINGLE_LINE_FORMAT: &str = "exactly one line: 'Final: <int>'";

/// Which example was scored. `expected_answer` is `None` when invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRef {
    pub id: String,
    pub expected_answer: Option<i64>,
}

/// What the verifier saw, bounded for logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionView {
    pub raw_preview: String,
    pub normalized_preview: String,
    pub line_count: usize,
    #[serde(default)]
    pub missing: bool,
}

/// Outcome of the line grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDetails {
    pub format_expected: String,
    pub format_ok: bool,
    pub int_ok: bool,
    pub answer_str: Option<String>,
    pub answer_int: Option<i64>,
    pub error_code: Option<OutcomeCode>,
    pub error_message: Option<String>,
}

impl ParseDetails {
    pub(crate) fn accepted(text: &str, value: Option<i64>) -> Self {
        Self {
            format_expected: line_format(),
            format_ok: true,
            int_ok: true,
            answer_str: Some(text.to_string()),
            answer_int: value,
            error_code: None,
            error_message: None,
        }
    }

    pub(crate) fn rejected(
        format_expected: String,
        code: OutcomeCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            format_expected,
            format_ok: false,
            int_ok: false,
            answer_str: None,
            answer_int: None,
            error_code: Some(code),
            error_message: Some(message.into()),
        }
    }
}

pub(crate) fn line_format() -> String {
    format!("{FINAL_PREFIX}<int>")
}

/// Final code plus an optional explanation (`None` on success).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub code: OutcomeCode,
    pub message: Option<String>,
}

/// A non-fatal observation about the inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWarning {
    pub code: String,
    pub message: String,
}

impl ScoreWarning {
    pub(crate) fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Everything needed to explain a reward after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub scorer: ScorerIdentity,
    pub example: ExampleRef,
    pub completion: CompletionView,
    pub parse: Option<ParseDetails>,
    #[serde(rename = "match")]
    pub matched: bool,
    pub result: ResultRecord,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(
        rename = "example_warnings",
        alias = "warnings",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub warnings: Vec<ScoreWarning>,
}
