//! Keep-newest-N retention for upload and output working directories.
//!
//! One janitor run per directory at a time; callers serialize concurrent runs.

use crate::error::{XrefError, XrefResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
pub struct RetentionOutcome {
    pub dir: PathBuf,
    pub keep: usize,
    pub scanned: usize,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl RetentionOutcome {
    pub fn summary(&self) -> String {
        format!(
            "dir={} keep={} scanned={} removed={} failed={}",
            self.dir.display(),
            self.keep,
            self.scanned,
            self.deleted.len(),
            self.failed.len()
        )
    }
}

fn list_files(dir: &Path) -> XrefResult<Vec<(SystemTime, PathBuf)>> {
    if !dir.is_dir() {
        return Err(XrefError::DirectoryNotFound(dir.display().to_string()));
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        out.push((modified, entry.path()));
    }
    Ok(out)
}

/// Delete the oldest files in `dir` until at most `keep` remain. Every
/// deletion is attempted; failures are collected in the outcome.
pub fn sweep(dir: &Path, keep: usize) -> XrefResult<RetentionOutcome> {
    let mut files = list_files(dir)?;
    let mut outcome = RetentionOutcome {
        dir: dir.to_path_buf(),
        keep,
        scanned: files.len(),
        ..RetentionOutcome::default()
    };
    if files.len() <= keep {
        tracing::debug!(dir = %dir.display(), files = files.len(), keep, "retention: nothing to remove");
        return Ok(outcome);
    }

    files.sort();
    let excess = files.len() - keep;
    remove_all(files.into_iter().take(excess).map(|(_, path)| path), &mut outcome);
    Ok(outcome)
}

/// Delete each path, recording it as removed or failed. A file that is
/// already gone counts as removed.
fn remove_all(paths: impl IntoIterator<Item = PathBuf>, outcome: &mut RetentionOutcome) {
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "retention: removed old file");
                outcome.deleted.push(path);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "retention: file already gone");
                outcome.deleted.push(path);
            }
            Err(err) => outcome.failed.push((path, err.to_string())),
        }
    }
}

/// `sweep`, failing with `RetentionPartialFailure` if any deletion failed.
pub fn retain(dir: &Path, keep: usize) -> XrefResult<RetentionOutcome> {
    let outcome = sweep(dir, keep)?;
    if outcome.failed.is_empty() {
        return Ok(outcome);
    }
    Err(XrefError::RetentionPartialFailure {
        dir: dir.display().to_string(),
        failed: outcome.failed.len(),
        attempted: outcome.failed.len() + outcome.deleted.len(),
    })
}

/// Cleanup hook for pipelines: a retention failure is logged and turned into
/// a summary line instead of failing the caller.
pub fn retain_quietly(dir: &Path, keep: usize) -> String {
    match retain(dir, keep) {
        Ok(outcome) => outcome.summary(),
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "retention cleanup failed");
            format!("dir={} keep={} error={err}", dir.display(), keep)
        }
    }
}
