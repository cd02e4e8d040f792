//! Completion inputs: frozen rollouts, selection packs and the
//! `CompletionSource` seam the evaluation driver reads through.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{HarnessError, Result};
use crate::domain::example::value_to_text;
use crate::domain::RolloutSample;
use crate::io::read_jsonl;

fn record_id(path: &Path, record: &Map<String, Value>, kind: &str) -> Result<String> {
    match record.get("id") {
        Some(id) => Ok(value_to_text(id)),
        None => Err(HarnessError::InvalidRecord {
            path: path.to_path_buf(),
            message: format!("{kind} record missing 'id': {}", Value::Object(record.clone())),
        }),
    }
}

/// Load `id -> sample` from a completions JSONL file.
///
/// The `id` key is consumed; every other key feeds `RolloutSample::from_value`.
pub fn load_frozen_rollouts(path: &Path) -> Result<BTreeMap<String, RolloutSample>> {
    let mut out = BTreeMap::new();

    for mut record in read_jsonl(path)? {
        let id = record_id(path, &record, "completion")?;
        if out.contains_key(&id) {
            return Err(HarnessError::DuplicateId {
                path: path.to_path_buf(),
                id,
            });
        }
        record.remove("id");
        let sample = RolloutSample::from_value(&Value::Object(record));
        out.insert(id, sample);
    }

    Ok(out)
}

/// Load `id -> samples` from a selection pack (`{"id", "samples": [...]}`).
pub fn load_selection_pack(path: &Path) -> Result<BTreeMap<String, Vec<RolloutSample>>> {
    let mut out = BTreeMap::new();

    for record in read_jsonl(path)? {
        let id = record_id(path, &record, "selection-pack")?;
        if out.contains_key(&id) {
            return Err(HarnessError::DuplicateId {
                path: path.to_path_buf(),
                id,
            });
        }
        let Some(Value::Array(samples)) = record.get("samples") else {
            return Err(HarnessError::InvalidRecord {
                path: path.to_path_buf(),
                message: format!("selection-pack record {id:?} must include a list 'samples'"),
            });
        };
        let samples = samples.iter().map(RolloutSample::from_value).collect();
        out.insert(id, samples);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Completion sources
// ---------------------------------------------------------------------------

/// Where the evaluation driver gets one completion per example.
pub trait CompletionSource {
    /// Identifying description written into run summaries.
    fn describe(&self) -> SourceDescription;

    /// The sample for `example_id`, or `None` when the source has none.
    fn get(&self, example_id: &str) -> Option<&RolloutSample>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescription {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub n: usize,
}

impl std::fmt::Display for SourceDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {} (n={})", self.kind, path.display(), self.n),
            None => write!(f, "{} (n={})", self.kind, self.n),
        }
    }
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapCompletionSource {
    samples: BTreeMap<String, RolloutSample>,
}

impl MapCompletionSource {
    pub fn new(samples: BTreeMap<String, RolloutSample>) -> Self {
        Self { samples }
    }

    pub fn with(mut self, id: impl Into<String>, sample: RolloutSample) -> Self {
        self.samples.insert(id.into(), sample);
        self
    }
}

impl CompletionSource for MapCompletionSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription {
            kind: "map".to_string(),
            path: None,
            n: self.samples.len(),
        }
    }

    fn get(&self, example_id: &str) -> Option<&RolloutSample> {
        self.samples.get(example_id)
    }
}

/// Source backed by a completions JSONL file, loaded eagerly.
#[derive(Debug, Clone)]
pub struct JsonlCompletionSource {
    path: PathBuf,
    samples: BTreeMap<String, RolloutSample>,
}

impl JsonlCompletionSource {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let samples = load_frozen_rollouts(&path)?;
        Ok(Self { path, samples })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompletionSource for JsonlCompletionSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription {
            kind: "jsonl".to_string(),
            path: Some(self.path.clone()),
            n: self.samples.len(),
        }
    }

    fn get(&self, example_id: &str) -> Option<&RolloutSample> {
        self.samples.get(example_id)
    }
}
