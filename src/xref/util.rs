use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Fixed-width `YYYY-MM-DD_HH-mm-ss` stamp (UTC) for generated file names.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `<base>_Found_YV_Codes_<stamp><ext>` inside `dir`, with a `-<n>` counter
/// appended when a file of that name already exists.
pub fn result_file_path(dir: &Path, original_name: &str, stamp: &str) -> PathBuf {
    let original = Path::new(original_name);
    let base = original
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("result");
    let ext = original
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let first = dir.join(format!("{base}_Found_YV_Codes_{stamp}{ext}"));
    if !first.exists() {
        return first;
    }
    let mut n = 1usize;
    loop {
        let candidate = dir.join(format!("{base}_Found_YV_Codes_{stamp}-{n}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
