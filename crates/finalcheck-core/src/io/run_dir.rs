use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::error::Result;

/// Current UTC time, second precision, RFC 3339 (`2026-01-02T03:04:05+00:00`).
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Create a fresh `<root>/<prefix>_<YYYYMMDDTHHMMSS>` directory.
pub fn make_run_dir(root: &Path, prefix: &str) -> Result<PathBuf> {
    make_run_dir_at(root, prefix, Utc::now())
}

/// Like [`make_run_dir`] with an explicit timestamp. A name already taken
/// gets a `_2`, `_3`, ... suffix.
pub fn make_run_dir_at(root: &Path, prefix: &str, now: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(root)?;
    let base = format!("{prefix}_{}", now.format("%Y%m%dT%H%M%S"));

    let mut run_dir = root.join(&base);
    let mut k = 1;
    while run_dir.exists() {
        k += 1;
        run_dir = root.join(format!("{base}_{k}"));
    }
    fs::create_dir(&run_dir)?;
    Ok(run_dir)
}
