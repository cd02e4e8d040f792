//! Dataset loading.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::domain::error::{HarnessError, Result};
use crate::domain::Example;
use crate::io::read_jsonl;

/// Load and validate a dataset JSONL file, preserving file order.
///
/// Fails on the first malformed record or repeated id.
pub fn load_examples(path: &Path) -> Result<Vec<Example>> {
    let mut seen = HashSet::new();
    let mut examples = Vec::new();

    for record in read_jsonl(path)? {
        let example = Example::from_record(&record)?;
        if !seen.insert(example.id.clone()) {
            return Err(HarnessError::DuplicateId {
                path: path.to_path_buf(),
                id: example.id,
            });
        }
        examples.push(example);
    }

    Ok(examples)
}

/// Index examples by id.
pub fn index_by_id(examples: &[Example]) -> Result<BTreeMap<&str, &Example>> {
    let mut out = BTreeMap::new();
    for example in examples {
        if out.insert(example.id.as_str(), example).is_some() {
            return Err(HarnessError::DuplicateId {
                path: Default::default(),
                id: example.id.clone(),
            });
        }
    }
    Ok(out)
}
