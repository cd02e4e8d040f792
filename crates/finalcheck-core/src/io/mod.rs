//! Filesystem plumbing for drivers: JSONL records, run directories and
//! manifests.

pub mod jsonl;
pub mod manifest;
pub mod run_dir;

pub use jsonl::{read_jsonl, write_json, write_jsonl, write_text};
pub use manifest::{write_manifest, Environment, FileFingerprint, Manifest, ManifestRequest};
pub use run_dir::{make_run_dir, make_run_dir_at, utc_now_iso};
