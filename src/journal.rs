use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::{ScanError, ScanResult};
use crate::paths::ensure_parent_dir;
use crate::types::Verdict;

/// One journal line per scanned log.
#[derive(Debug, Serialize)]
pub struct JournalRow<'a> {
    pub scanned_at: DateTime<Utc>,
    #[serde(flatten)]
    pub verdict: &'a Verdict,
}

pub fn append_verdict(
    path: &Path,
    scanned_at: DateTime<Utc>,
    verdict: &Verdict,
) -> Result<(), String> {
    append_jsonl(path, &JournalRow { scanned_at, verdict }).map_err(|e| e.to_string())
}

fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> ScanResult<()> {
    ensure_parent_dir(path).map_err(ScanError::invalid)?;
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ScanError::io(format!("failed opening {}", path.display()), e))?;
    f.lock_exclusive()
        .map_err(|e| ScanError::io(format!("failed locking {}", path.display()), e))?;
    let mut line =
        serde_json::to_string(value).map_err(|e| ScanError::json("journal row serialize", e))?;
    line.push('\n');
    let write_res = f
        .write_all(line.as_bytes())
        .map_err(|e| ScanError::io(format!("failed writing {}", path.display()), e));
    let _ = f.unlock();
    write_res?;
    Ok(())
}
