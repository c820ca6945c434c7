use anyhow::Result;

use crate::commands::{CommandReport, record_audit, report_source};
use crate::xref::config::load_config;
use crate::xref::paths::resolve_paths;
use crate::xref::pipeline::XrefEngine;

pub fn run(query: &str) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("search");

    let outcome = load_config(&paths).and_then(|cfg| XrefEngine::new(paths.clone(), cfg).search(query));
    match outcome {
        Ok(found) => {
            report.detail(format!("query={}", found.query));
            report_source(&mut report, found.source, &found.fallbacks);
            report.detail(format!("found={}", found.yv_codes.len()));
            for code in &found.yv_codes {
                report.detail(format!("yv={code}"));
            }
        }
        Err(err) => {
            report.detail(format!("query={}", query.trim()));
            report.fail(&err);
        }
    }

    record_audit(&paths, &report);
    Ok(report)
}
