use anyhow::Result;
use clap::ValueEnum;
use std::path::{Path, PathBuf};

use crate::commands::{CommandReport, record_audit};
use crate::xref::config::load_config;
use crate::xref::paths::resolve_paths;
use crate::xref::retention;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetainTarget {
    Outputs,
    Uploads,
    All,
}

/// Negative keep counts behave as zero.
pub fn clamp_keep(keep: i64) -> usize {
    usize::try_from(keep.max(0)).unwrap_or(usize::MAX)
}

fn sweep_into(report: &mut CommandReport, dir: &Path, keep: usize) {
    match retention::retain(dir, keep) {
        Ok(outcome) => report.detail(outcome.summary()),
        Err(err) => report.fail(&anyhow::Error::from(err)),
    }
}

pub fn run(target: RetainTarget, keep: Option<i64>, dir: Option<PathBuf>) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("retain");

    if let Some(dir) = dir {
        sweep_into(&mut report, &dir, clamp_keep(keep.unwrap_or(0)));
        record_audit(&paths, &report);
        return Ok(report);
    }

    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            report.fail(&err);
            record_audit(&paths, &report);
            return Ok(report);
        }
    };
    let outputs_keep = keep.map_or(cfg.retention.outputs_keep, clamp_keep);
    let uploads_keep = keep.map_or(cfg.retention.uploads_keep, clamp_keep);

    if matches!(target, RetainTarget::Outputs | RetainTarget::All) {
        sweep_into(&mut report, &paths.outputs_dir, outputs_keep);
    }
    if matches!(target, RetainTarget::Uploads | RetainTarget::All) {
        sweep_into(&mut report, &paths.uploads_dir, uploads_keep);
    }

    record_audit(&paths, &report);
    Ok(report)
}
