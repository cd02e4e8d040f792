//! The closed outcome vocabulary.
//!
//! Downstream tooling (inspection, gating, golden files) matches on these
//! strings. Renaming a variant is a breaking change and requires a scorer
//! version bump.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a scoring call produced its reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCode {
    /// Parsed and equal to the expected answer. The only rewarded outcome.
    Ok,
    /// Parsed but not equal to the expected answer.
    WrongAnswer,
    /// The example's expected answer is missing or not an integer.
    InvalidExample,
    NotSingleLine,
    MissingPrefix,
    ExtraWhitespace,
    MissingInteger,
    PlusSignDisallowed,
    MissingDigits,
    NonDigitCharacters,
    NegativeZeroDisallowed,
    LeadingZeros,
    /// Part of the wire vocabulary; the grammar never produces it.
    IntParseFailed,
}

impl OutcomeCode {
    /// Every code, outcomes first, then parse errors in grammar order.
    pub const ALL: [OutcomeCode; 13] = [
        OutcomeCode::Ok,
        OutcomeCode::WrongAnswer,
        OutcomeCode::InvalidExample,
        OutcomeCode::NotSingleLine,
        OutcomeCode::MissingPrefix,
        OutcomeCode::ExtraWhitespace,
        OutcomeCode::MissingInteger,
        OutcomeCode::PlusSignDisallowed,
        OutcomeCode::MissingDigits,
        OutcomeCode::NonDigitCharacters,
        OutcomeCode::NegativeZeroDisallowed,
        OutcomeCode::LeadingZeros,
        OutcomeCode::IntParseFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::Ok => "ok",
            OutcomeCode::WrongAnswer => "wrong_answer",
            OutcomeCode::InvalidExample => "invalid_example",
            OutcomeCode::NotSingleLine => "not_single_line",
            OutcomeCode::MissingPrefix => "missing_prefix",
            OutcomeCode::ExtraWhitespace => "extra_whitespace",
            OutcomeCode::MissingInteger => "missing_integer",
            OutcomeCode::PlusSignDisallowed => "plus_sign_disallowed",
            OutcomeCode::MissingDigits => "missing_digits",
            OutcomeCode::NonDigitCharacters => "non_digit_characters",
            OutcomeCode::NegativeZeroDisallowed => "negative_zero_disallowed",
            OutcomeCode::LeadingZeros => "leading_zeros",
            OutcomeCode::IntParseFailed => "int_parse_failed",
        }
    }

    /// True for the format/grammar rejections (everything except `ok`,
    /// `wrong_answer` and `invalid_example`).
    pub fn is_parse_error(&self) -> bool {
        !matches!(
            self,
            OutcomeCode::Ok | OutcomeCode::WrongAnswer | OutcomeCode::InvalidExample
        )
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, OutcomeCode::Ok)
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not part of the outcome vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outcome code: {0}")]
pub struct UnknownOutcomeCode(pub String);

impl FromStr for OutcomeCode {
    type Err = UnknownOutcomeCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutcomeCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownOutcomeCode(s.to_string()))
    }
}
