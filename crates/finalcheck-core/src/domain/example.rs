//! Dataset items.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{HarnessError, Result};

/// One evaluation item: a prompt whose answer is a base-10 integer.
///
/// The verifier checks completions against `expected_answer`; it never solves
/// the prompt itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Example {
    /// Unique within a dataset.
    pub id: String,
    pub prompt: String,
    pub expected_answer: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Example {
    /// Create an example with empty metadata.
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, expected_answer: i64) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            expected_answer,
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Parse an example from a dataset record.
    ///
    /// Requires `id`, `prompt` and an integer-coercible `expected_answer`.
    /// `metadata`, when present and not null, must be an object.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self> {
        let missing: Vec<String> = ["id", "prompt", "expected_answer"]
            .iter()
            .filter(|k| !record.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(HarnessError::MissingField {
                fields: missing,
                record: Value::Object(record.clone()).to_string(),
            });
        }

        let id = value_to_text(&record["id"]);
        let prompt = value_to_text(&record["prompt"]);
        let expected_answer =
            coerce_expected_answer(&record["expected_answer"]).map_err(|reason| {
                HarnessError::InvalidExample(format!("example {id:?}: {reason}"))
            })?;

        let metadata = match record.get("metadata") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(other) => {
                return Err(HarnessError::InvalidExample(format!(
                    "example {id:?}: metadata must be an object, got {other}"
                )))
            }
        };

        Ok(Self {
            id,
            prompt,
            expected_answer,
            metadata,
        })
    }
}

/// Render a JSON scalar as plain text (strings unquoted).
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a JSON value into an expected answer.
///
/// Accepts JSON integers in `i64` range, integral finite floats, and strings
/// that parse as a base-10 integer after trimming. Everything else (null,
/// booleans, fractional numbers, arrays, objects) is rejected with a reason.
pub fn coerce_expected_answer(value: &Value) -> std::result::Result<i64, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if n.is_u64() {
                return Err(format!("expected_answer {n} is out of i64 range"));
            }
            match n.as_f64() {
                Some(f)
                    if f.is_finite()
                        && f.fract() == 0.0
                        && f >= i64::MIN as f64
                        && f < i64::MAX as f64 =>
                {
                    Ok(f as i64)
                }
                _ => Err(format!("expected_answer must be an integer; got {n}")),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected_answer must be int-coercible; got {s:?}")),
        Value::Null => Err("expected_answer missing".to_string()),
        other => Err(format!("expected_answer must be int-coercible; got {other}")),
    }
}
