//! `manifest.json`: the minimum evidence needed to reproduce a run.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::jsonl::write_json;
use crate::domain::error::Result;
use crate::git::{try_git_info, GitInfo};
use crate::scoring::ScorerIdentity;

/// Size, hash and mtime of an input file, or a marker that it was absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileFingerprint {
    Present {
        path: PathBuf,
        size_bytes: u64,
        sha256: String,
        modified_utc: Option<String>,
    },
    Missing {
        path: PathBuf,
        missing: bool,
    },
}

impl FileFingerprint {
    pub fn of(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(FileFingerprint::Missing {
                path: path.to_path_buf(),
                missing: true,
            });
        }
        let meta = fs::metadata(path)?;
        let modified_utc = meta.modified().ok().map(|t| {
            DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, false)
        });
        Ok(FileFingerprint::Present {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
            sha256: sha256_file(path)?,
            modified_utc,
        })
    }
}

/// Streamed SHA-256 of a file, lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Host facts recorded next to every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub crate_version: String,
    pub os: String,
    pub arch: String,
    pub family: String,
    pub cwd: Option<PathBuf>,
}

impl Environment {
    pub fn capture() -> Self {
        Self {
            crate_version: crate::VERSION.to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            cwd: std::env::current_dir().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub script: String,
    pub argv: Vec<String>,
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub created_utc: String,
    pub command: CommandInfo,
    pub inputs: Vec<FileFingerprint>,
    pub scorer: ScorerIdentity,
    pub environment: Environment,
    pub git: Option<GitInfo>,
    pub extra: Map<String, Value>,
}

/// What a driver knows when it writes its manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestRequest {
    pub created_utc: String,
    pub command: CommandInfo,
    pub inputs: Vec<PathBuf>,
    pub scorer: ScorerIdentity,
    pub extra: Map<String, Value>,
    /// Where to look for git metadata; the current directory when `None`.
    pub repo_root: Option<PathBuf>,
}

impl ManifestRequest {
    pub fn new(script: &str, created_utc: &str, scorer: &ScorerIdentity) -> Self {
        Self {
            created_utc: created_utc.to_string(),
            command: CommandInfo {
                script: script.to_string(),
                ..CommandInfo::default()
            },
            scorer: scorer.clone(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Fingerprint the inputs and write `<run_dir>/manifest.json`.
pub fn write_manifest(run_dir: &Path, request: ManifestRequest) -> Result<Manifest> {
    let inputs = request
        .inputs
        .iter()
        .map(|p| FileFingerprint::of(p))
        .collect::<Result<Vec<_>>>()?;

    let repo_root = match request.repo_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let manifest = Manifest {
        run_id: run_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        created_utc: request.created_utc,
        command: request.command,
        inputs,
        scorer: request.scorer,
        environment: Environment::capture(),
        git: try_git_info(&repo_root),
        extra: request.extra,
    };

    write_json(&run_dir.join("manifest.json"), &manifest)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprints_present_and_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.jsonl");
        fs::write(&input, "abc").unwrap();

        match FileFingerprint::of(&input).unwrap() {
            FileFingerprint::Present {
                size_bytes, sha256, ..
            } => {
                assert_eq!(size_bytes, 3);
                assert_eq!(
                    sha256,
                    "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
                );
            }
            other => panic!("expected present, got {other:?}"),
        }

        let missing = FileFingerprint::of(&dir.path().join("nope.jsonl")).unwrap();
        let v = serde_json::to_value(&missing).unwrap();
        assert_eq!(v["missing"], json!(true));
    }

    #[test]
    fn manifest_is_written_under_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("eval_20260101T000000");
        fs::create_dir(&run_dir).unwrap();

        let mut request =
            ManifestRequest::new("eval", "2026-01-01T00:00:00+00:00", &ScorerIdentity::default())
                .with_input(dir.path().join("missing.jsonl"))
                .with_extra("n_missing_completions", json!(0));
        request.repo_root = Some(dir.path().to_path_buf());

        let manifest = write_manifest(&run_dir, request).unwrap();
        assert_eq!(manifest.run_id, "eval_20260101T000000");
        assert!(manifest.git.is_none());

        let text = fs::read_to_string(run_dir.join("manifest.json")).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["command"]["script"], json!("eval"));
        assert_eq!(v["scorer"]["version"], json!("1.0.0"));
        assert_eq!(v["extra"]["n_missing_completions"], json!(0));
    }
}
