//! Sampled completions and the completion handle the verifier consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::example::value_to_text;

/// Accepted field names for the policy log-probability sum, in priority order.
const LOGPROB_KEYS: [&str; 3] = ["sum_logprob", "logprob", "total_logprob"];
/// Accepted field names for the reference log-probability sum, in priority order.
const REF_LOGPROB_KEYS: [&str; 3] = ["sum_ref_logprob", "ref_logprob", "total_ref_logprob"];

/// What the verifier is asked to score: some text, or an explicit gap.
///
/// Collaborators resolve raw input into this before calling the core, so the
/// verifier never has to guess how to stringify an arbitrary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion<'a> {
    Text(&'a str),
    Missing,
}

impl<'a> Completion<'a> {
    /// Text to score. `Missing` scores as empty text.
    pub fn as_text(&self) -> &'a str {
        match self {
            Completion::Text(s) => s,
            Completion::Missing => "",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Completion::Missing)
    }
}

impl<'a> From<&'a str> for Completion<'a> {
    fn from(s: &'a str) -> Self {
        Completion::Text(s)
    }
}

impl<'a> From<Option<&'a str>> for Completion<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(Completion::Missing, Completion::Text)
    }
}

/// One sampled completion plus optional log-probability bookkeeping.
///
/// `sum_logprob` and `sum_ref_logprob` are descriptive only; they never feed
/// into reward.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RolloutSample {
    pub completion: String,
    #[serde(default)]
    pub sum_logprob: Option<f64>,
    #[serde(default)]
    pub sum_ref_logprob: Option<f64>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl RolloutSample {
    /// A sample carrying only completion text.
    pub fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
            ..Self::default()
        }
    }

    pub fn with_logprobs(
        mut self,
        sum_logprob: Option<f64>,
        sum_ref_logprob: Option<f64>,
    ) -> Self {
        self.sum_logprob = sum_logprob;
        self.sum_ref_logprob = sum_ref_logprob;
        self
    }

    /// Per-sample KL estimate: `sum_logprob - sum_ref_logprob`.
    pub fn kl_estimate(&self) -> Option<f64> {
        match (self.sum_logprob, self.sum_ref_logprob) {
            (Some(lp), Some(ref_lp)) => Some(lp - ref_lp),
            _ => None,
        }
    }

    pub fn as_completion(&self) -> Completion<'_> {
        Completion::Text(&self.completion)
    }

    /// Build a sample from a completion record or a bare string.
    ///
    /// Objects contribute `completion` (null becomes empty), the log-prob
    /// sums under any of their accepted names, and every other key as `meta`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Object(obj) => {
                let completion = obj
                    .get("completion")
                    .map(value_to_text)
                    .unwrap_or_default();
                let sum_logprob = first_present(obj, &LOGPROB_KEYS).and_then(coerce_float);
                let sum_ref_logprob =
                    first_present(obj, &REF_LOGPROB_KEYS).and_then(coerce_float);
                let meta = obj
                    .iter()
                    .filter(|(k, _)| {
                        k.as_str() != "completion"
                            && !LOGPROB_KEYS.contains(&k.as_str())
                            && !REF_LOGPROB_KEYS.contains(&k.as_str())
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Self {
                    completion,
                    sum_logprob,
                    sum_ref_logprob,
                    meta,
                }
            }
            other => Self::new(value_to_text(other)),
        }
    }
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kl_estimate_requires_both_sums() {
        let s = RolloutSample::new("Final: 1").with_logprobs(Some(-3.0), Some(-5.5));
        assert_eq!(s.kl_estimate(), Some(2.5));

        let s = RolloutSample::new("Final: 1").with_logprobs(Some(-3.0), None);
        assert_eq!(s.kl_estimate(), None);
    }

    #[test]
    fn bare_string_is_completion_shorthand() {
        let s = RolloutSample::from_value(&json!("Final: 9"));
        assert_eq!(s.completion, "Final: 9");
        assert!(s.meta.is_empty());
    }

    #[test]
    fn object_accepts_logprob_aliases_and_keeps_meta() {
        let s = RolloutSample::from_value(&json!({
            "completion": "Final: 4",
            "logprob": -1.25,
            "total_ref_logprob": "-2.0",
            "model": "toy",
            "finish_reason": "stop"
        }));
        assert_eq!(s.completion, "Final: 4");
        assert_eq!(s.sum_logprob, Some(-1.25));
        assert_eq!(s.sum_ref_logprob, Some(-2.0));
        assert_eq!(s.meta.len(), 2);
        assert_eq!(s.meta["model"], json!("toy"));
    }

    #[test]
    fn canonical_logprob_name_wins_over_alias() {
        let s = RolloutSample::from_value(&json!({
            "completion": "x",
            "sum_logprob": -1.0,
            "logprob": -9.0
        }));
        assert_eq!(s.sum_logprob, Some(-1.0));
    }

    #[test]
    fn null_completion_becomes_empty() {
        let s = RolloutSample::from_value(&json!({"completion": null}));
        assert_eq!(s.completion, "");
        assert_eq!(RolloutSample::from_value(&Value::Null).completion, "");
    }

    #[test]
    fn completion_from_option() {
        assert_eq!(Completion::from(None), Completion::Missing);
        assert_eq!(Completion::from(Some("a")).as_text(), "a");
        assert_eq!(Completion::Missing.as_text(), "");
    }
}
