use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::xref::config::{XrefConfig, load_config};
use crate::xref::paths::{XrefPaths, resolve_paths};
use crate::xref::source::SourceAdapter;
use crate::xref::source::cache::CacheSource;

include!(concat!(env!("OUT_DIR"), "/xref_env_allowlist.rs"));

fn describe_cache(report: &mut CommandReport, paths: &XrefPaths, cfg: &XrefConfig) {
    if !paths.cache_file.exists() {
        report.detail("cache=missing");
        return;
    }
    let source = CacheSource::new(paths.cache_file.clone(), cfg.cache_mapping());
    match source.load() {
        Ok(rows) => {
            let index = crate::xref::index::build(&rows, source.mapping());
            report.detail(format!("cache.entries={}", index.len()));
        }
        Err(err) => report.detail(format!("cache=unusable ({err})")),
    }
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("xref_home={}", paths.xref_home.display()));
    report.detail(format!("uploads_dir={}", paths.uploads_dir.display()));
    report.detail(format!("outputs_dir={}", paths.outputs_dir.display()));
    report.detail(format!("data_dir={}", paths.data_dir.display()));
    report.detail(format!("cache_file={}", paths.cache_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    for key in GENERATED_XREF_ENV_ALLOWLIST {
        if env::var_os(key).is_some() {
            report.detail(format!("env.{key}=set"));
        }
    }

    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            report.fail(&err);
            return Ok(report);
        }
    };
    report.detail(format!("sources={}", cfg.sources.order.join(",")));
    let endpoint = cfg.remote.endpoint();
    if endpoint.is_empty() {
        report.detail("remote=unconfigured");
    } else {
        report.detail(format!("remote={endpoint}"));
    }
    if !cfg.local_sheet.path.trim().is_empty() {
        report.detail(format!("local_sheet={}", cfg.local_sheet.path));
    }
    report.detail(format!(
        "mappings remote={} cache={} local_sheet={} update={}",
        cfg.remote_mapping().describe(),
        cfg.cache_mapping().describe(),
        cfg.local_sheet_mapping().describe(),
        cfg.update_mapping().describe()
    ));
    report.detail(format!(
        "retention.outputs_keep={} retention.uploads_keep={}",
        cfg.retention.outputs_keep, cfg.retention.uploads_keep
    ));
    describe_cache(&mut report, &paths, &cfg);

    Ok(report)
}
