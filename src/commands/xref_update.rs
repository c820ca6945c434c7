use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, record_audit};
use crate::xref::config::load_config;
use crate::xref::paths::{XrefPaths, resolve_paths};
use crate::xref::pipeline::{UpdateOutcome, XrefEngine};

fn run_update(paths: &XrefPaths, file: &Path) -> Result<UpdateOutcome> {
    let engine = XrefEngine::new(paths.clone(), load_config(paths)?);
    let staged = engine.stage_upload(file)?;
    engine.update_from_sheet(&staged)
}

pub fn run(file: &Path) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("update");
    report.detail(format!("file={}", file.display()));

    match run_update(&paths, file) {
        Ok(out) => {
            report.detail(format!("cache_file={}", out.snapshot.path.display()));
            report.detail(format!("rows={}", out.rows));
            report.detail(format!("skipped_rows={}", out.skipped_rows));
            report.detail(format!("entries={}", out.snapshot.entries));
            report.detail(format!("bytes={}", out.snapshot.bytes));
            report.detail(format!("retention {}", out.retention));
        }
        Err(err) => report.fail(&err),
    }

    record_audit(&paths, &report);
    Ok(report)
}
